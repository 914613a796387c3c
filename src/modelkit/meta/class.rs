use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::OnceCell;

use super::attribute::{Attribute, AttributeKind};
use crate::object::Object;

static NEXT_KEY: AtomicU32 = AtomicU32::new(1);

/// Identifies the class that declared an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClassKey(u32);

impl ClassKey {
    pub(crate) const UNASSIGNED: ClassKey = ClassKey(0);
}

/// A model type: name, optional superclass, and its attributes.
///
/// Classes are meant to live in statics (`once_cell::sync::Lazy<Class>`) and
/// are compared by identity.
pub struct Class {
    key: ClassKey,
    name: &'static str,
    superclass: Option<&'static Class>,
    own: Vec<Attribute>,
    all: OnceCell<Vec<&'static Attribute>>,
    properties: OnceCell<Vec<&'static Attribute>>,
    references: OnceCell<Vec<&'static Attribute>>,
    children: OnceCell<Vec<&'static Attribute>>,
}

impl Class {
    pub fn builder(name: &'static str) -> ClassBuilder {
        ClassBuilder {
            name,
            superclass: None,
            own: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn superclass(&self) -> Option<&'static Class> {
        self.superclass
    }

    pub(crate) fn key(&self) -> ClassKey {
        self.key
    }

    /// Attributes declared by this class itself, in declaration order.
    pub fn own_attributes(&'static self) -> &'static [Attribute] {
        &self.own
    }

    /// Inherited attributes followed by own attributes.
    pub fn all_attributes(&'static self) -> &'static [&'static Attribute] {
        self.all.get_or_init(|| {
            let inherited = self.superclass.map(|s| s.all_attributes()).unwrap_or(&[]);
            inherited.iter().copied().chain(self.own.iter()).collect()
        })
    }

    pub fn all_properties(&'static self) -> &'static [&'static Attribute] {
        self.properties
            .get_or_init(|| self.of_kind(AttributeKind::Property))
    }

    pub fn all_references(&'static self) -> &'static [&'static Attribute] {
        self.references
            .get_or_init(|| self.of_kind(AttributeKind::Reference))
    }

    pub fn all_children(&'static self) -> &'static [&'static Attribute] {
        self.children.get_or_init(|| self.of_kind(AttributeKind::Child))
    }

    fn of_kind(&'static self, kind: AttributeKind) -> Vec<&'static Attribute> {
        self.all_attributes()
            .iter()
            .copied()
            .filter(|a| a.kind() == kind)
            .collect()
    }

    /// First attribute with the given name, inherited ones first.
    pub fn attribute(&'static self, name: &str) -> Option<&'static Attribute> {
        self.all_attributes().iter().copied().find(|a| a.name() == name)
    }

    pub fn child_attribute(&'static self, name: &str) -> Option<&'static Attribute> {
        self.all_children().iter().copied().find(|a| a.name() == name)
    }

    pub fn id_attribute(&'static self) -> Option<&'static Attribute> {
        self.all_attributes().iter().copied().find(|a| a.is_id())
    }

    /// This class followed by its superclasses.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static Class> {
        std::iter::successors(Some(self), |c| c.superclass)
    }

    pub fn is_subclass_of(&'static self, other: &Class) -> bool {
        self.lineage().any(|c| std::ptr::eq(c, other))
    }

    /// Creates a default instance.
    pub fn instantiate(&'static self) -> Object {
        Object::new(self)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub struct ClassBuilder {
    name: &'static str,
    superclass: Option<&'static Class>,
    own: Vec<Attribute>,
}

impl ClassBuilder {
    pub fn extends(mut self, superclass: &'static Class) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.own.push(attribute);
        self
    }

    pub fn build(self) -> Class {
        let key = ClassKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed));
        let base = self
            .superclass
            .map(|s| s.all_attributes().len())
            .unwrap_or(0);
        let mut own = self.own;
        for (index, attribute) in own.iter_mut().enumerate() {
            attribute.assign(base + index, key, self.name);
        }
        Class {
            key,
            name: self.name,
            superclass: self.superclass,
            own,
            all: OnceCell::new(),
            properties: OnceCell::new(),
            references: OnceCell::new(),
            children: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_extended_root, test_root, TEST_EXTENDED_ROOT, TEST_NODE, TEST_ROOT};

    #[test]
    fn test_all_attributes_inherited_first() {
        let all = TEST_EXTENDED_ROOT.all_attributes();
        let root_len = TEST_ROOT.all_attributes().len();
        assert_eq!(all.len(), root_len + 1);
        assert_eq!(&all[..root_len], TEST_ROOT.all_attributes());
        assert_eq!(all[root_len], test_extended_root::extra());
    }

    #[test]
    fn test_kind_views_partition_attributes() {
        let class: &'static Class = &TEST_ROOT;
        let total = class.all_properties().len()
            + class.all_references().len()
            + class.all_children().len();
        assert_eq!(total, class.all_attributes().len());
        assert!(class.all_children().contains(&test_root::children()));
        assert!(class.all_references().contains(&test_root::multi_ref()));
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(TEST_EXTENDED_ROOT.attribute("name"), Some(test_root::name()));
        assert_eq!(TEST_ROOT.child_attribute("name"), None);
        assert_eq!(TEST_ROOT.id_attribute(), Some(test_root::id()));
    }

    #[test]
    fn test_subclass_relation() {
        assert!(TEST_EXTENDED_ROOT.is_subclass_of(&TEST_ROOT));
        assert!(TEST_ROOT.is_subclass_of(&TEST_ROOT));
        assert!(!TEST_ROOT.is_subclass_of(&TEST_EXTENDED_ROOT));
        assert!(!TEST_NODE.is_subclass_of(&TEST_ROOT));
    }

    #[test]
    fn test_identity_equality() {
        assert_eq!(*TEST_ROOT, *TEST_ROOT);
        assert_ne!(*TEST_ROOT, *TEST_NODE);
    }
}
