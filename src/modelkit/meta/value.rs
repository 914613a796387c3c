//! Attribute values and their declared types.
//!
//! [`Value`] is the dynamic representation every attribute read and write goes
//! through. [`ValueType`] is what an attribute declares, and [`Literal`] is the
//! `Sync` form of a default value that can live inside a static descriptor.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use super::Class;
use crate::object::Object;

/// The declared type of an attribute.
///
/// Object types hold a function returning the class rather than the class
/// itself, so descriptors can refer to themselves or to classes declared later.
#[derive(Clone, Copy)]
pub enum ValueType {
    Bool,
    Int,
    Long,
    Double,
    String,
    /// Enumeration with its variant names in declaration order.
    Enum(&'static [&'static str]),
    Date,
    DateTime,
    OffsetDateTime,
    Object(fn() -> &'static Class),
}

impl ValueType {
    /// The target class for object types.
    pub fn class(&self) -> Option<&'static Class> {
        match self {
            ValueType::Object(class) => Some(class()),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ValueType::Object(_))
    }

    /// Whether a non-null value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Long, Value::Long(_))
            | (ValueType::Double, Value::Double(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Date, Value::Date(_))
            | (ValueType::DateTime, Value::DateTime(_))
            | (ValueType::OffsetDateTime, Value::OffsetDateTime(_)) => true,
            (ValueType::Enum(variants), Value::Enum(variant)) => {
                variants.contains(&variant.as_str())
            }
            (ValueType::Object(class), Value::Object(object)) => {
                object.class().is_subclass_of(class())
            }
            _ => false,
        }
    }

    /// Value of a non-nullable attribute that declares no default.
    pub(crate) fn zero(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Long => Value::Long(0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Enum(variants) => variants
                .first()
                .map(|v| Value::Enum(v.to_string()))
                .unwrap_or(Value::Null),
            ValueType::Date => Value::Date(NaiveDate::default()),
            ValueType::DateTime => Value::DateTime(NaiveDateTime::default()),
            ValueType::OffsetDateTime => Value::OffsetDateTime(DateTime::default()),
            ValueType::Object(_) => Value::Null,
        }
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueType::Enum(a), ValueType::Enum(b)) => a == b,
            (ValueType::Object(a), ValueType::Object(b)) => std::ptr::eq(a(), b()),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Long => write!(f, "Long"),
            ValueType::Double => write!(f, "Double"),
            ValueType::String => write!(f, "String"),
            ValueType::Enum(variants) => write!(f, "Enum({})", variants.join("|")),
            ValueType::Date => write!(f, "Date"),
            ValueType::DateTime => write!(f, "DateTime"),
            ValueType::OffsetDateTime => write!(f, "OffsetDateTime"),
            ValueType::Object(class) => write!(f, "{}", class().name()),
        }
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A dynamically typed attribute value.
///
/// Objects compare by identity, everything else by value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    /// Name of an enumeration variant.
    Enum(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    OffsetDateTime(DateTime<FixedOffset>),
    Object(Object),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// String content of `String` and `Enum` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Long(_) => "Long".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Enum(v) => format!("Enum({})", v),
            Value::Date(_) => "Date".to_string(),
            Value::DateTime(_) => "DateTime".to_string(),
            Value::OffsetDateTime(_) => "OffsetDateTime".to_string(),
            Value::Object(o) => o.class().name().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Enum(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(d) => write!(f, "{}", d),
            Value::OffsetDateTime(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::OffsetDateTime(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<&Object> for Value {
    fn from(v: &Object) -> Self {
        Value::Object(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A default value that can be stored in a static attribute descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(&'static str),
    Enum(&'static str),
}

impl Literal {
    pub fn to_value(self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Int(i),
            Literal::Long(l) => Value::Long(l),
            Literal::Double(d) => Value::Double(d),
            Literal::Str(s) => Value::String(s.to_string()),
            Literal::Enum(e) => Value::Enum(e.to_string()),
        }
    }
}
