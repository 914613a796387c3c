//! Format-independent deserialization.
//!
//! A format decoder drives a [`Deserializer`] with a stream of calls that
//! mirrors the serializer callbacks:
//!
//! ```text
//! start_object(class)
//!   start_attribute(name)  add_simple_value(..) / add_reference_value(..)  end_attribute()
//!   start_attribute(name)  start_object(..) ... end_object()  end_attribute()
//! end_object()  -> root
//! ```
//!
//! References are resolved in two phases. A reference path is first offered
//! to the external resolver, if any. Paths it cannot resolve are recorded
//! together with the index they must end up at, and resolved against the
//! finished tree once the root object ends. This makes forward references
//! work regardless of document order.

use tracing::{debug, trace, warn};

use crate::error::{ModelError, Result};
use crate::meta::{Attribute, AttributeKind, Class, Value};
use crate::object::Object;
use crate::path::{ReferenceResolver, Resolver};

struct Frame {
    object: Object,
    attribute: Option<&'static Attribute>,
    missing_refs: usize,
}

struct DeferredReference {
    object: Object,
    attribute: &'static Attribute,
    index: usize,
    path: String,
}

pub struct Deserializer<'r> {
    resolver: Option<&'r dyn ReferenceResolver>,
    strict: bool,
    stack: Vec<Frame>,
    deferred: Vec<DeferredReference>,
}

impl Default for Deserializer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Deserializer<'r> {
    pub fn new() -> Self {
        Self {
            resolver: None,
            strict: true,
            stack: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Resolver consulted first for every reference, typically covering
    /// trees outside the one being read.
    pub fn with_resolver(mut self, resolver: &'r dyn ReferenceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// When `false`, references that still can't be resolved once the root
    /// ends are dropped with a warning instead of failing.
    pub fn strict_references(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Number of objects currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn active_attribute(&self) -> Option<&'static Attribute> {
        self.stack.last().and_then(|frame| frame.attribute)
    }

    /// Forgets all open objects and pending references.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.deferred.clear();
    }

    /// Creates a default instance of `class`, adds it to the active attribute
    /// of the enclosing object (if any) and makes it the current object.
    pub fn start_object(&mut self, class: &'static Class) -> Result<Object> {
        let instance = class.instantiate();
        if !self.stack.is_empty() {
            let (head, attribute) = self.current()?;
            if attribute.kind() != AttributeKind::Child {
                return Err(ModelError::Protocol(format!(
                    "start_object inside {}, which is not a child attribute",
                    attribute
                )));
            }
            attribute.add_or_set(&head, Value::Object(instance.clone()))?;
        }
        self.stack.push(Frame {
            object: instance.clone(),
            attribute: None,
            missing_refs: 0,
        });
        Ok(instance)
    }

    /// Closes the current object. Closing the root resolves the deferred
    /// references and resets the deserializer.
    pub fn end_object(&mut self) -> Result<Object> {
        let frame = self.stack.pop().ok_or_else(|| {
            ModelError::Protocol("end_object called without a matching start_object".into())
        })?;
        if self.stack.is_empty() {
            let deferred = std::mem::take(&mut self.deferred);
            self.resolve_deferred(&frame.object, deferred)?;
        }
        Ok(frame.object)
    }

    pub fn start_attribute(&mut self, name: &str) -> Result<&'static Attribute> {
        let head = self.stack.last_mut().ok_or_else(|| {
            ModelError::Protocol("start_attribute called without an active object".into())
        })?;
        if let Some(active) = head.attribute {
            return Err(ModelError::Protocol(format!(
                "start_attribute({}) called while {} is still active",
                name, active
            )));
        }
        let attribute = head.object.class().attribute(name).ok_or_else(|| {
            ModelError::UnknownAttribute {
                object: head.object.debug_path_default(),
                class: head.object.class().name().to_string(),
                name: name.to_string(),
            }
        })?;
        head.attribute = Some(attribute);
        head.missing_refs = 0;
        Ok(attribute)
    }

    pub fn end_attribute(&mut self) -> Result<()> {
        let head = self.stack.last_mut().ok_or_else(|| {
            ModelError::Protocol("end_attribute called without an active object".into())
        })?;
        match head.attribute.take() {
            Some(_) => Ok(()),
            None => Err(ModelError::Protocol(
                "end_attribute called without an active attribute".into(),
            )),
        }
    }

    /// Sets (unary) or appends (list) `value` on the active attribute.
    pub fn add_simple_value(&mut self, value: impl Into<Value>) -> Result<()> {
        let (head, attribute) = self.current()?;
        attribute.add_or_set(&head, value)
    }

    /// Adds the object at `path` to the active reference attribute, now or
    /// once the root object ends.
    pub fn add_reference_value(&mut self, path: &str) -> Result<()> {
        let (head, attribute) = self.current()?;
        if attribute.kind() != AttributeKind::Reference {
            return Err(ModelError::Protocol(format!(
                "add_reference_value on {}, which is not a reference attribute",
                attribute
            )));
        }

        let resolved = match self.resolver {
            Some(resolver) => resolver.resolve(path)?,
            None => None,
        };
        if let Some(target) = resolved {
            return attribute.add_or_set(&head, Value::Object(target));
        }

        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| ModelError::Protocol("no active object".into()))?;
        let index = if attribute.is_list() {
            head.list(attribute)?.len() + frame.missing_refs
        } else {
            0
        };
        frame.missing_refs += 1;
        trace!(path, index, attribute = %attribute, "deferring reference");
        self.deferred.push(DeferredReference {
            object: head,
            attribute,
            index,
            path: path.to_string(),
        });
        Ok(())
    }

    fn current(&self) -> Result<(Object, &'static Attribute)> {
        let head = self.stack.last().ok_or_else(|| {
            ModelError::Protocol("no active object to add a value to".into())
        })?;
        let attribute = head.attribute.ok_or_else(|| {
            ModelError::Protocol("start_attribute must be called before adding values".into())
        })?;
        Ok((head.object.clone(), attribute))
    }

    fn resolve_deferred(&self, root: &Object, deferred: Vec<DeferredReference>) -> Result<()> {
        if deferred.is_empty() {
            return Ok(());
        }
        let resolver = Resolver::new([root])?;
        let total = deferred.len();
        let mut dropped = 0;
        for reference in deferred {
            let Some(target) = resolver.resolve(&reference.path)? else {
                let object = reference.object.debug_path_default();
                if self.strict {
                    return Err(ModelError::UnresolvedReference {
                        object,
                        attribute: reference.attribute.name().to_string(),
                        path: reference.path,
                    });
                }
                warn!(
                    object = %object,
                    attribute = reference.attribute.name(),
                    path = %reference.path,
                    "dropping unresolved reference"
                );
                dropped += 1;
                continue;
            };
            if reference.attribute.is_list() {
                let list = reference.object.list(reference.attribute)?;
                let index = reference.index.min(list.len());
                list.insert(index, Value::Object(target))?;
            } else {
                reference.object.set(reference.attribute, Value::Object(target))?;
            }
        }
        debug!(resolved = total - dropped, dropped, "resolved deferred references");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_root, TestNode, TestRoot, TEST_NODE, TEST_ROOT};
    use crate::tree::deep_equals;
    use crate::ModelType;

    #[test]
    fn test_builds_tree_with_forward_references() {
        let outsider = TestNode::create();
        outsider.set_id(Some("outsider")).unwrap();
        outsider.children().push(TestNode::create().object()).unwrap();
        outsider.children().push(TestNode::create().object()).unwrap();
        let external = Resolver::new([outsider.object()]).unwrap();

        let mut de = Deserializer::new().with_resolver(&external);
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("name").unwrap();
        de.add_simple_value("simpleFoo").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("single_ref").unwrap();
        de.add_reference_value("<id:inner>.children[0]").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("multi_ref").unwrap();
        de.add_reference_value("<id:outsider>").unwrap();
        de.add_reference_value("<id:inner>.children[0]").unwrap();
        de.add_reference_value("<id:outsider>.children[1]").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("children").unwrap();
        de.start_object(&TEST_NODE).unwrap();
        de.start_attribute("id").unwrap();
        de.add_simple_value("inner").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("children").unwrap();
        de.start_object(&TEST_NODE).unwrap();
        de.start_attribute("name").unwrap();
        de.add_simple_value("innerFoo").unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();
        let actual = de.end_object().unwrap();

        let expected = TestRoot::create();
        expected.set_name("simpleFoo").unwrap();
        let inner = TestNode::create();
        inner.set_id(Some("inner")).unwrap();
        let leaf = TestNode::create();
        leaf.set_name("innerFoo").unwrap();
        inner.children().push(leaf.object()).unwrap();
        expected.children().push(inner.object()).unwrap();
        expected.set_single_ref(Some(&leaf)).unwrap();
        expected.multi_ref().push(outsider.object()).unwrap();
        expected.multi_ref().push(leaf.object()).unwrap();
        expected
            .multi_ref()
            .push(outsider.children().objects()[1].clone())
            .unwrap();

        assert!(deep_equals(expected.object(), &actual));
        assert_eq!(de.depth(), 0);
    }

    #[test]
    fn test_deferred_order_independent_of_document_order() {
        // references to objects that appear later land at their recorded index
        let mut de = Deserializer::new();
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("id").unwrap();
        de.add_simple_value("r").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("multi_ref").unwrap();
        de.add_reference_value("<id:r>.children[1]").unwrap();
        de.add_reference_value("<id:r>.children[0]").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("children").unwrap();
        for _ in 0..2 {
            de.start_object(&TEST_NODE).unwrap();
            de.end_object().unwrap();
        }
        de.end_attribute().unwrap();
        let root = TestRoot::cast(&de.end_object().unwrap()).unwrap();

        let children = root.children().objects();
        assert_eq!(root.multi_ref().objects(), vec![children[1].clone(), children[0].clone()]);
    }

    #[test]
    fn test_nested_object_references_subtrees_read_later() {
        let mut de = Deserializer::new();
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("id").unwrap();
        de.add_simple_value("r").unwrap();
        de.end_attribute().unwrap();

        de.start_attribute("friend").unwrap();
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("multi_ref").unwrap();
        de.add_reference_value("<id:r>.children[0]").unwrap();
        de.add_reference_value("<id:r>.friend.children[0]").unwrap();
        de.add_reference_value("<id:r>.child").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("single_ref").unwrap();
        de.add_reference_value("<id:r>.friend.children[0]").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("children").unwrap();
        de.start_object(&TEST_NODE).unwrap();
        de.start_attribute("name").unwrap();
        de.add_simple_value("fc").unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();

        de.start_attribute("child").unwrap();
        de.start_object(&TEST_NODE).unwrap();
        de.start_attribute("name").unwrap();
        de.add_simple_value("rc").unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("children").unwrap();
        de.start_object(&TEST_NODE).unwrap();
        de.start_attribute("name").unwrap();
        de.add_simple_value("c0").unwrap();
        de.end_attribute().unwrap();
        de.end_object().unwrap();
        de.end_attribute().unwrap();
        let root = TestRoot::cast(&de.end_object().unwrap()).unwrap();

        let friend = root.friend().unwrap();
        let names: Vec<String> = friend
            .multi_ref()
            .objects()
            .iter()
            .map(|o| TestNode::cast(o).unwrap().name())
            .collect();
        assert_eq!(names, vec!["c0", "fc", "rc"]);
        assert_eq!(friend.single_ref().unwrap().name(), "fc");
        assert_eq!(
            friend.single_ref().unwrap().object().parent().as_ref(),
            Some(friend.object())
        );
    }

    #[test]
    fn test_unresolved_reference_is_hard_error() {
        let mut de = Deserializer::new();
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("id").unwrap();
        de.add_simple_value("r").unwrap();
        de.end_attribute().unwrap();
        de.start_attribute("single_ref").unwrap();
        de.add_reference_value("<id:r>.children[3]").unwrap();
        de.end_attribute().unwrap();
        let err = de.end_object().unwrap_err();
        assert!(matches!(err, ModelError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_lenient_drops_unresolved() {
        let mut de = Deserializer::new().strict_references(false);
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("single_ref").unwrap();
        de.add_reference_value("<id:nobody>").unwrap();
        de.end_attribute().unwrap();
        let root = TestRoot::cast(&de.end_object().unwrap()).unwrap();
        assert!(root.single_ref().is_none());
    }

    #[test]
    fn test_protocol_errors() {
        let mut de = Deserializer::new();
        assert!(matches!(de.start_attribute("name"), Err(ModelError::Protocol(_))));
        assert!(matches!(de.end_object(), Err(ModelError::Protocol(_))));

        de.start_object(&TEST_ROOT).unwrap();
        assert!(matches!(de.add_simple_value("x"), Err(ModelError::Protocol(_))));
        assert!(matches!(
            de.start_attribute("nope"),
            Err(ModelError::UnknownAttribute { .. })
        ));
        de.start_attribute("name").unwrap();
        assert_eq!(de.active_attribute(), Some(test_root::name()));
        assert!(matches!(de.start_attribute("id"), Err(ModelError::Protocol(_))));
        assert!(matches!(de.add_reference_value("<id:x>"), Err(ModelError::Protocol(_))));
        assert!(matches!(de.start_object(&TEST_NODE), Err(ModelError::Protocol(_))));

        de.reset();
        assert_eq!(de.depth(), 0);
    }

    #[test]
    fn test_type_mismatch_surfaces() {
        let mut de = Deserializer::new();
        de.start_object(&TEST_ROOT).unwrap();
        de.start_attribute("count").unwrap();
        assert!(matches!(
            de.add_simple_value("not a number"),
            Err(ModelError::TypeMismatch { .. })
        ));
    }
}
