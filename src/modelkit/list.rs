//! Observable list attributes.
//!
//! A [`ModelList`] is a live view of one list attribute of one object. It
//! never copies the elements; every read goes to the owner's storage.
//!
//! Reference and child lists are *distinct*: an element appears at most once,
//! and adding an element that is already present moves it instead. Child lists
//! also route every mutation through containment, so the parent of an element
//! always matches the list holding it.

use std::fmt;

use crate::containment;
use crate::error::{FirstError, ModelError, Result};
use crate::meta::{Attribute, AttributeKind, Value};
use crate::notification::Notification;
use crate::object::Object;

#[derive(Clone)]
pub struct ModelList {
    owner: Object,
    attribute: &'static Attribute,
}

impl ModelList {
    pub(crate) fn new(owner: Object, attribute: &'static Attribute) -> Self {
        Self { owner, attribute }
    }

    pub fn owner(&self) -> &Object {
        &self.owner
    }

    pub fn attribute(&self) -> &'static Attribute {
        self.attribute
    }

    pub fn is_distinct(&self) -> bool {
        self.attribute.kind() != AttributeKind::Property
    }

    pub fn len(&self) -> usize {
        self.owner.with_list(self.attribute, |items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.owner
            .with_list(self.attribute, |items| items.get(index).cloned())
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.owner.with_list(self.attribute, |items| items.clone())
    }

    /// Snapshot of the object elements of a reference or child list.
    pub fn objects(&self) -> Vec<Object> {
        self.owner.with_list(self.attribute, |items| {
            items.iter().filter_map(|v| v.as_object().cloned()).collect()
        })
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.owner
            .with_list(self.attribute, |items| items.iter().position(|v| v == value))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.index_of(value).is_some()
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let len = self.len();
        self.insert(len, value)
    }

    /// Inserts at `index` (`0..=len`).
    ///
    /// In a distinct list an element that is already present is moved so that
    /// it ends up where the insertion would have placed it.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.attribute.check_value(&value)?;
        self.check_index(index, self.len() + 1)?;

        if let (AttributeKind::Child, Value::Object(child)) = (self.attribute.kind(), &value) {
            return containment::set_container(child, Some((&self.owner, self.attribute)), Some(index));
        }
        self.insert_unchecked(index, value)
    }

    /// Replaces the element at `index`, returning the previous one.
    ///
    /// In a distinct list, setting an element that is present elsewhere moves
    /// it to `index` instead and the previous element shifts by one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        self.attribute.check_value(&value)?;
        let current = self.element_at(index)?;
        if current == value {
            return Ok(current);
        }
        if self.is_distinct() {
            if let Some(existing) = self.index_of(&value) {
                self.move_item(existing, index)?;
                return Ok(current);
            }
        }

        match (self.attribute.kind(), &current, &value) {
            (AttributeKind::Child, Value::Object(old_child), Value::Object(new_child)) => {
                containment::check_target(new_child, &self.owner, self.attribute, Some(index))?;
                let mut pending = FirstError::default();
                pending.record(containment::set_container(old_child, None, None));
                pending.record(containment::set_container(
                    new_child,
                    Some((&self.owner, self.attribute)),
                    Some(index.min(self.len())),
                ));
                pending.finish()?;
            }
            _ => {
                self.owner.with_list(self.attribute, |items| {
                    items[index] = value.clone();
                });
                self.owner.notify(&Notification::ListSet {
                    object: self.owner.clone(),
                    attribute: self.attribute,
                    index,
                    old: current.clone(),
                    new: value,
                })?;
            }
        }
        Ok(current)
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let value = self.element_at(index)?;
        match (self.attribute.kind(), &value) {
            (AttributeKind::Child, Value::Object(child)) => {
                containment::set_container(child, None, None)?;
            }
            _ => {
                self.owner.with_list(self.attribute, |items| items.remove(index));
                self.owner.notify(&Notification::ListRemove {
                    object: self.owner.clone(),
                    attribute: self.attribute,
                    index,
                    value: value.clone(),
                })?;
            }
        }
        Ok(value)
    }

    /// Removes the first occurrence of `value`; returns whether it was present.
    pub fn remove_value(&self, value: &Value) -> Result<bool> {
        match self.index_of(value) {
            Some(index) => self.remove(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Moves the element at `from` so that it ends up at index `to`.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        let len = self.len();
        self.check_index(from, len)?;
        self.check_index(to, len)?;
        if from == to {
            return Ok(());
        }
        let value = self.owner.with_list(self.attribute, |items| {
            let value = items.remove(from);
            items.insert(to, value.clone());
            value
        });
        self.owner.notify(&Notification::ListMove {
            object: self.owner.clone(),
            attribute: self.attribute,
            from,
            to,
            value,
        })
    }

    /// Removes every element front to back, one notification each.
    pub fn clear(&self) -> Result<()> {
        let mut pending = FirstError::default();
        while !self.is_empty() {
            let before = self.len();
            pending.record(self.remove(0).map(|_| ()));
            if self.len() == before {
                break;
            }
        }
        pending.finish()
    }

    pub fn extend<I, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    /// Inserts without touching the element's parent. Used by containment
    /// once the parent link is already updated.
    pub(crate) fn insert_without_parent_sync(&self, index: usize, child: &Object) -> Result<()> {
        let index = index.min(self.len());
        self.insert_unchecked(index, Value::Object(child.clone()))
    }

    /// Removes without touching the element's parent.
    pub(crate) fn remove_without_parent_sync(&self, child: &Object) -> Result<()> {
        let value = Value::Object(child.clone());
        let index = self.index_of(&value).ok_or_else(|| ModelError::NotContained {
            object: format!("{:?}", child),
            attribute: self.attribute.to_string(),
        })?;
        self.owner.with_list(self.attribute, |items| items.remove(index));
        self.owner.notify(&Notification::ListRemove {
            object: self.owner.clone(),
            attribute: self.attribute,
            index,
            value,
        })
    }

    /// Moves `child`, already in this list, to where an insertion at `index`
    /// would place it.
    pub(crate) fn relocate(&self, child: &Object, index: usize) -> Result<()> {
        let value = Value::Object(child.clone());
        match self.index_of(&value) {
            Some(current) => self.move_item(current, Self::final_index(index, current)),
            None => Ok(()),
        }
    }

    fn insert_unchecked(&self, index: usize, value: Value) -> Result<()> {
        if self.is_distinct() {
            if let Some(current) = self.index_of(&value) {
                return self.move_item(current, Self::final_index(index, current));
            }
        }
        self.owner
            .with_list(self.attribute, |items| items.insert(index, value.clone()));
        self.owner.notify(&Notification::ListInsert {
            object: self.owner.clone(),
            attribute: self.attribute,
            index,
            value,
        })
    }

    /// Final position of an element at `current` re-inserted at `index`,
    /// accounting for its own removal.
    fn final_index(index: usize, current: usize) -> usize {
        if index > current {
            index - 1
        } else {
            index
        }
    }

    fn element_at(&self, index: usize) -> Result<Value> {
        self.check_index(index, self.len())?;
        Ok(self
            .owner
            .with_list(self.attribute, |items| items[index].clone()))
    }

    fn check_index(&self, index: usize, bound: usize) -> Result<()> {
        if index < bound {
            Ok(())
        } else {
            Err(ModelError::IndexOutOfBounds {
                attribute: self.attribute.to_string(),
                index,
                len: self.len(),
            })
        }
    }
}

impl fmt::Debug for ModelList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{} ", self.owner, self.attribute.name())?;
        f.debug_list().entries(self.to_vec()).finish()
    }
}
