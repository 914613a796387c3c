//! Parent assignment.
//!
//! [`set_container`] is the single place where an object changes parent. It
//! keeps the parent link of the child and the child slot of the parent in
//! sync and emits, in order:
//!
//! 1. the removal from the old slot (`Set` to null or `ListRemove`, on the
//!    old parent),
//! 2. the eviction of the previous occupant of a unary target slot
//!    (`Parent` to none, on the occupant),
//! 3. the insertion into the new slot (`Set` or `ListInsert`, on the new
//!    parent),
//! 4. `Parent` on the child, only if the parent object changed.
//!
//! The child's parent link is updated before any of these are sent, so
//! adapters always observe a consistent tree.

use tracing::debug;

use crate::error::{FirstError, ModelError, Result};
use crate::list::ModelList;
use crate::meta::{Attribute, Value};
use crate::notification::Notification;
use crate::object::Object;

/// Moves `child` into `target` (or detaches it when `None`).
///
/// For list targets `index` is the insertion index; `None` appends. Moving a
/// child to the list it already sits in relocates it within that list.
pub(crate) fn set_container(
    child: &Object,
    target: Option<(&Object, &'static Attribute)>,
    index: Option<usize>,
) -> Result<()> {
    let old = child.container();

    match (&old, target) {
        (None, None) => return Ok(()),
        (Some((old_parent, old_attr)), Some((parent, attr)))
            if old_parent == parent && *old_attr == attr =>
        {
            return match (attr.is_list(), index) {
                (true, Some(index)) => ModelList::new(parent.clone(), attr).relocate(child, index),
                _ => Ok(()),
            };
        }
        _ => {}
    }

    if let Some((parent, attr)) = target {
        check_target(child, parent, attr, index)?;
    }

    child.replace_container(target);
    let mut pending = FirstError::default();

    if let Some((old_parent, old_attr)) = old.as_ref().map(|(p, a)| (p, *a)) {
        if old_attr.is_unary() {
            old_parent.write_unary(old_attr, Value::Null);
            pending.record(old_parent.notify(&Notification::Set {
                object: old_parent.clone(),
                attribute: old_attr,
                old: Value::Object(child.clone()),
                new: Value::Null,
            }));
        } else {
            pending.record(
                ModelList::new(old_parent.clone(), old_attr).remove_without_parent_sync(child),
            );
        }
    }

    if let Some((parent, attr)) = target {
        if attr.is_unary() {
            let evicted = parent.read_unary(attr);
            if let Value::Object(occupant) = &evicted {
                occupant.replace_container(None);
                pending.record(occupant.notify(&Notification::Parent {
                    object: occupant.clone(),
                    old: Some(parent.clone()),
                    new: None,
                }));
            }
            parent.write_unary(attr, Value::Object(child.clone()));
            pending.record(parent.notify(&Notification::Set {
                object: parent.clone(),
                attribute: attr,
                old: evicted,
                new: Value::Object(child.clone()),
            }));
        } else {
            let list = ModelList::new(parent.clone(), attr);
            let at = index.unwrap_or_else(|| list.len());
            pending.record(list.insert_without_parent_sync(at, child));
        }
    }

    let old_parent = old.map(|(parent, _)| parent);
    let new_parent = target.map(|(parent, _)| parent.clone());
    debug!(child = ?child, from = ?old_parent, to = ?new_parent, "moved object");
    if old_parent != new_parent {
        pending.record(child.notify(&Notification::Parent {
            object: child.clone(),
            old: old_parent,
            new: new_parent,
        }));
    }

    pending.finish()
}

/// Validates a new slot before anything is mutated.
pub(crate) fn check_target(
    child: &Object,
    parent: &Object,
    attr: &'static Attribute,
    index: Option<usize>,
) -> Result<()> {
    attr.check_member(parent)?;
    attr.check_value(&Value::Object(child.clone()))?;

    if parent == child {
        return Err(ModelError::SelfContainment {
            object: child.debug_path_default(),
        });
    }
    if parent.ancestors().any(|ancestor| &ancestor == child) {
        return Err(ModelError::ContainmentCycle {
            object: child.debug_path_default(),
            parent: parent.debug_path_default(),
        });
    }
    if let (true, Some(index)) = (attr.is_list(), index) {
        let len = ModelList::new(parent.clone(), attr).len();
        if index > len {
            return Err(ModelError::IndexOutOfBounds {
                attribute: attr.to_string(),
                index,
                len,
            });
        }
    }
    Ok(())
}
