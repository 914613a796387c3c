//! Change notifications and the adapter protocol.
//!
//! Every state change of an [`Object`] produces exactly one [`Notification`],
//! delivered synchronously after the change to each attached [`Adapter`] in
//! attachment order. A failing adapter does not stop delivery to the others;
//! all failures of one dispatch are reported together afterwards as
//! [`ModelError::Adapter`](crate::ModelError::Adapter).

use std::fmt;

use crate::meta::{Attribute, Value};
use crate::object::Object;

pub type AdapterResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Observer attached to a single object.
pub trait Adapter: 'static {
    fn notify(&self, notification: &Notification) -> AdapterResult;

    /// Called once the adapter has been attached to `object`.
    fn on_attach(&self, _object: &Object) -> AdapterResult {
        Ok(())
    }

    /// Called once the adapter has been removed from `object`.
    fn on_detach(&self, _object: &Object) -> AdapterResult {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A unary attribute changed.
    Set {
        object: Object,
        attribute: &'static Attribute,
        old: Value,
        new: Value,
    },
    /// A list element was replaced in place.
    ListSet {
        object: Object,
        attribute: &'static Attribute,
        index: usize,
        old: Value,
        new: Value,
    },
    ListInsert {
        object: Object,
        attribute: &'static Attribute,
        index: usize,
        value: Value,
    },
    ListRemove {
        object: Object,
        attribute: &'static Attribute,
        index: usize,
        value: Value,
    },
    /// An element changed position; `to` is its final index.
    ListMove {
        object: Object,
        attribute: &'static Attribute,
        from: usize,
        to: usize,
        value: Value,
    },
    /// The object's parent changed.
    Parent {
        object: Object,
        old: Option<Object>,
        new: Option<Object>,
    },
}

impl Notification {
    /// The object whose state changed.
    pub fn object(&self) -> &Object {
        match self {
            Notification::Set { object, .. }
            | Notification::ListSet { object, .. }
            | Notification::ListInsert { object, .. }
            | Notification::ListRemove { object, .. }
            | Notification::ListMove { object, .. }
            | Notification::Parent { object, .. } => object,
        }
    }

    /// The changed attribute; `None` for parent changes.
    pub fn attribute(&self) -> Option<&'static Attribute> {
        match self {
            Notification::Set { attribute, .. }
            | Notification::ListSet { attribute, .. }
            | Notification::ListInsert { attribute, .. }
            | Notification::ListRemove { attribute, .. }
            | Notification::ListMove { attribute, .. } => Some(*attribute),
            Notification::Parent { .. } => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Set {
                object,
                attribute,
                old,
                new,
            } => write!(f, "Set({:?}.{}: {} -> {})", object, attribute.name(), old, new),
            Notification::ListSet {
                object,
                attribute,
                index,
                old,
                new,
            } => write!(
                f,
                "ListSet({:?}.{}[{}]: {} -> {})",
                object,
                attribute.name(),
                index,
                old,
                new
            ),
            Notification::ListInsert {
                object,
                attribute,
                index,
                value,
            } => write!(f, "ListInsert({:?}.{}[{}]: {})", object, attribute.name(), index, value),
            Notification::ListRemove {
                object,
                attribute,
                index,
                value,
            } => write!(f, "ListRemove({:?}.{}[{}]: {})", object, attribute.name(), index, value),
            Notification::ListMove {
                object,
                attribute,
                from,
                to,
                value,
            } => write!(
                f,
                "ListMove({:?}.{}[{} -> {}]: {})",
                object,
                attribute.name(),
                from,
                to,
                value
            ),
            Notification::Parent { object, old, new } => {
                write!(f, "Parent({:?}: {:?} -> {:?})", object, old, new)
            }
        }
    }
}
