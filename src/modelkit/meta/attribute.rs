//! Attribute descriptors.
//!
//! An [`Attribute`] is declared once, moved into its class by
//! [`ClassBuilder::attribute`](super::ClassBuilder::attribute), and from then on
//! referenced as `&'static Attribute`. Building the class assigns the slot: the
//! position of the attribute in the class's `all_attributes()` view, which is
//! also the index of its storage in every instance. Slots are stable across
//! subclasses because inherited attributes always come first.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::class::ClassKey;
use super::value::{Literal, Value, ValueType};
use super::Class;
use crate::error::{ModelError, Result};
use crate::list::ModelList;
use crate::object::{AttrValue, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Plain data.
    Property,
    /// A cross-tree link that never affects the parent of its target.
    Reference,
    /// A containment link; the target's parent is the owner.
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    List,
}

impl Arity {
    pub fn label(&self) -> &'static str {
        match self {
            Arity::Unary => "unary",
            Arity::List => "list",
        }
    }
}

pub struct Attribute {
    name: &'static str,
    kind: AttributeKind,
    arity: Arity,
    value_type: ValueType,
    nullable: bool,
    default: Option<Literal>,
    is_id: bool,
    slot: usize,
    owner: ClassKey,
    owner_name: &'static str,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeKind, value_type: ValueType) -> Self {
        Self {
            name,
            kind,
            arity: Arity::Unary,
            value_type,
            nullable: value_type.is_object(),
            default: None,
            is_id: false,
            slot: 0,
            owner: ClassKey::UNASSIGNED,
            owner_name: "",
        }
    }

    /// A non-nullable unary data attribute.
    pub fn property(name: &'static str, value_type: ValueType) -> Self {
        debug_assert!(!value_type.is_object(), "property {name} can't hold objects");
        Self::new(name, AttributeKind::Property, value_type)
    }

    /// The designated id attribute: a nullable string property.
    pub fn id(name: &'static str) -> Self {
        let mut attr = Self::property(name, ValueType::String).nullable();
        attr.is_id = true;
        attr
    }

    pub fn reference(name: &'static str, target: fn() -> &'static Class) -> Self {
        Self::new(name, AttributeKind::Reference, ValueType::Object(target))
    }

    pub fn child(name: &'static str, target: fn() -> &'static Class) -> Self {
        Self::new(name, AttributeKind::Child, ValueType::Object(target))
    }

    pub fn list(mut self) -> Self {
        self.arity = Arity::List;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }

    pub(crate) fn assign(&mut self, slot: usize, owner: ClassKey, owner_name: &'static str) {
        self.slot = slot;
        self.owner = owner;
        self.owner_name = owner_name;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn is_list(&self) -> bool {
        self.arity == Arity::List
    }

    pub fn is_unary(&self) -> bool {
        self.arity == Arity::Unary
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_id(&self) -> bool {
        self.is_id
    }

    /// Storage index of this attribute in every instance of its class.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Name of the class that declares this attribute.
    pub fn declaring_class_name(&self) -> &'static str {
        self.owner_name
    }

    /// Initial value of a unary attribute; lists always start empty.
    pub fn default_value(&self) -> Value {
        match self.default {
            Some(literal) => literal.to_value(),
            None if self.nullable || self.is_list() => Value::Null,
            None => self.value_type.zero(),
        }
    }

    /// Whether `value` may be stored in this attribute (as the unary value or
    /// as a list element).
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_unary() && self.nullable,
            v => self.value_type.accepts(v),
        }
    }

    pub(crate) fn check_value(&self, value: &Value) -> Result<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                attribute: self.to_string(),
                expected: self.expected_label(),
                found: value.type_name(),
            })
        }
    }

    fn expected_label(&self) -> String {
        match (self.arity, self.nullable) {
            (Arity::List, _) => format!("list of {}", self.value_type),
            (Arity::Unary, true) => format!("{}?", self.value_type),
            (Arity::Unary, false) => self.value_type.to_string(),
        }
    }

    pub(crate) fn require_arity(&self, arity: Arity) -> Result<()> {
        if self.arity == arity {
            Ok(())
        } else {
            Err(ModelError::WrongArity {
                attribute: self.to_string(),
                arity: self.arity.label(),
            })
        }
    }

    /// Whether `class` declares or inherits this attribute.
    pub fn is_member_of(&self, class: &'static Class) -> bool {
        class.lineage().any(|c| c.key() == self.owner)
    }

    pub(crate) fn check_member(&self, object: &Object) -> Result<()> {
        if self.is_member_of(object.class()) {
            Ok(())
        } else {
            Err(ModelError::NotAMember {
                attribute: self.to_string(),
                class: object.class().name().to_string(),
            })
        }
    }

    /// Reads the attribute: the value for unary attributes, a live list view
    /// for list attributes.
    pub fn get(&'static self, object: &Object) -> Result<AttrValue> {
        self.check_member(object)?;
        Ok(match self.arity {
            Arity::Unary => AttrValue::Single(object.read_unary(self)),
            Arity::List => AttrValue::List(ModelList::new(object.clone(), self)),
        })
    }

    /// Replaces a unary value or appends to a list.
    pub fn add_or_set(&'static self, object: &Object, value: impl Into<Value>) -> Result<()> {
        match self.arity {
            Arity::Unary => object.set(self, value),
            Arity::List => object.list(self)?.push(value),
        }
    }

    /// Resets a unary value to its default, or clears a list.
    pub fn unset(&'static self, object: &Object) -> Result<()> {
        match self.arity {
            Arity::Unary => object.set(self, self.default_value()),
            Arity::List => object.list(self)?.clear(),
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_name, self.name)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({}.{})", self.owner_name, self.name)
    }
}
