//! Tree navigation over containment links.
//!
//! All walks use explicit stacks, so arbitrarily deep trees are fine.

use std::collections::HashMap;
use std::fmt::Write;

use crate::meta::{Attribute, AttributeKind, Value};
use crate::object::Object;

/// Iterator over the parent chain of an object, nearest first.
pub struct Ancestors {
    next: Option<Object>,
}

impl Iterator for Ancestors {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// Pre-order iterator over everything contained below an object.
pub struct Descendants {
    stack: Vec<Object>,
}

impl Iterator for Descendants {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        let current = self.stack.pop()?;
        self.stack.extend(current.child_objects().into_iter().rev());
        Some(current)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DebugPathOptions {
    /// Only print the class name of the root, not of every hop.
    pub only_properties: bool,
    /// Append `<id>` to objects that have one.
    pub show_ids: bool,
}

impl Default for DebugPathOptions {
    fn default() -> Self {
        Self {
            only_properties: true,
            show_ids: true,
        }
    }
}

impl Object {
    /// Parent, grandparent, and so on up to the root.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    pub fn root(&self) -> Object {
        self.ancestors().last().unwrap_or_else(|| self.clone())
    }

    /// The chain from the root down to this object, both included.
    pub fn path_from_root(&self) -> Vec<Object> {
        let mut path: Vec<Object> = std::iter::once(self.clone())
            .chain(self.ancestors())
            .collect();
        path.reverse();
        path
    }

    /// Direct children in attribute declaration order.
    pub fn child_objects(&self) -> Vec<Object> {
        let mut children = Vec::new();
        for &attr in self.class().all_children() {
            children.extend(
                child_values(self, attr)
                    .into_iter()
                    .filter_map(Value::into_object),
            );
        }
        children
    }

    pub fn descendants(&self) -> Descendants {
        let mut stack = self.child_objects();
        stack.reverse();
        Descendants { stack }
    }

    /// Visits this object and its descendants in pre-order. Returning `false`
    /// from `visit` skips the children of the visited object.
    pub fn walk(&self, mut visit: impl FnMut(&Object) -> bool) {
        let mut stack = vec![self.clone()];
        while let Some(current) = stack.pop() {
            if visit(&current) {
                stack.extend(current.child_objects().into_iter().rev());
            }
        }
    }

    /// Human readable location such as `Root.child<n1>.children[1]`.
    pub fn debug_path(&self, options: DebugPathOptions) -> String {
        let path = self.path_from_root();
        let mut out = String::new();
        for (i, object) in path.iter().enumerate() {
            if i == 0 || !options.only_properties {
                if i > 0 {
                    out.push('/');
                }
                out.push_str(object.class().name());
            }
            if options.show_ids {
                if let Some(id) = object.try_id() {
                    let _ = write!(out, "<{}>", id);
                }
            }
            if let Some(next) = path.get(i + 1) {
                push_hop(&mut out, object, next);
            }
        }
        out
    }

    pub(crate) fn debug_path_default(&self) -> String {
        self.debug_path(DebugPathOptions::default())
    }
}

/// Appends `.attr` or `.attr[index]` for the hop from `parent` to `child`.
pub(crate) fn push_hop(out: &mut String, parent: &Object, child: &Object) {
    let Some(attr) = child.containing_attribute() else {
        return;
    };
    out.push('.');
    out.push_str(attr.name());
    if attr.is_list() {
        let index = parent
            .list(attr)
            .ok()
            .and_then(|list| list.index_of(&Value::Object(child.clone())));
        if let Some(index) = index {
            let _ = write!(out, "[{}]", index);
        }
    }
}

/// Current values of an attribute as a flat list: one element for unary
/// attributes, all elements for lists.
fn child_values(object: &Object, attr: &'static Attribute) -> Vec<Value> {
    if attr.is_list() {
        object.with_list(attr, |items| items.clone())
    } else {
        vec![object.read_unary(attr)]
    }
}

/// Position of every object of a tree, as (child attribute, element) steps.
fn positions(root: &Object) -> HashMap<Object, Vec<(usize, usize)>> {
    let mut positions = HashMap::new();
    let mut stack = vec![(root.clone(), Vec::new())];
    while let Some((object, position)) = stack.pop() {
        for (attr_index, &attr) in object.class().all_children().iter().enumerate() {
            for (element, value) in child_values(&object, attr).into_iter().enumerate() {
                if let Value::Object(child) = value {
                    let mut child_position: Vec<(usize, usize)> = position.clone();
                    child_position.push((attr_index, element));
                    stack.push((child, child_position));
                }
            }
        }
        positions.insert(object, position);
    }
    positions
}

/// Structural equality of two trees.
///
/// Classes and property values must match, children are compared
/// recursively, and references are equal when they point to the same position
/// inside their respective trees, or to the very same object outside them.
pub fn deep_equals(a: &Object, b: &Object) -> bool {
    let positions_a = positions(a);
    let positions_b = positions(b);
    let same_reference = |x: &Value, y: &Value| match (x, y) {
        (Value::Object(x), Value::Object(y)) => {
            match (positions_a.get(x), positions_b.get(y)) {
                (Some(px), Some(py)) => px == py,
                (None, None) => x == y,
                _ => false,
            }
        }
        (x, y) => x == y,
    };

    let mut stack = vec![(a.clone(), b.clone())];
    while let Some((x, y)) = stack.pop() {
        if x.class() != y.class() {
            return false;
        }
        for &attr in x.class().all_attributes() {
            let xs = child_values(&x, attr);
            let ys = child_values(&y, attr);
            if xs.len() != ys.len() {
                return false;
            }
            let pairs = xs.into_iter().zip(ys);
            match attr.kind() {
                AttributeKind::Property => {
                    if pairs.into_iter().any(|(vx, vy)| vx != vy) {
                        return false;
                    }
                }
                AttributeKind::Reference => {
                    if pairs.into_iter().any(|(vx, vy)| !same_reference(&vx, &vy)) {
                        return false;
                    }
                }
                AttributeKind::Child => {
                    for pair in pairs {
                        match pair {
                            (Value::Object(cx), Value::Object(cy)) => stack.push((cx, cy)),
                            (Value::Null, Value::Null) => {}
                            _ => return false,
                        }
                    }
                }
            }
        }
    }
    true
}
