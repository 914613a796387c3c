//! Format-independent serialization.
//!
//! [`serialize`] walks a containment tree depth first, in pre-order, and turns
//! it into a stream of callbacks on a [`Serializer`]. For every object:
//!
//! ```text
//! start_object
//!   on_simple_property / on_simple_list_property        (declaration order)
//!   on_reference_property / on_reference_list_property  (declaration order)
//!   start_child_attribute                                (per child attribute)
//!     ... one nested object per element ...
//!   end_child_attribute
//! end_object
//! ```
//!
//! Properties and references are reported in a single pass over
//! `all_attributes()`, so their relative order is the declaration order.
//!
//! The walk uses an explicit stack. `parents` is the chain of objects whose
//! callbacks are still open, root first, excluding the current object.

use tracing::trace;

use crate::error::{ModelError, Result};
use crate::meta::{Arity, Attribute, AttributeKind, Value};
use crate::object::Object;

/// Callbacks of a serialization run. Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait Serializer {
    fn start_object(&mut self, object: &Object, parents: &[Object]) -> Result<()> {
        Ok(())
    }

    fn end_object(&mut self, object: &Object, parents: &[Object]) -> Result<()> {
        Ok(())
    }

    fn on_simple_property(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        value: &Value,
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    fn on_simple_list_property(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        values: &[Value],
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    fn on_reference_property(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        target: Option<&Object>,
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    fn on_reference_list_property(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        targets: &[Object],
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    fn start_child_attribute(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    fn end_child_attribute(
        &mut self,
        object: &Object,
        attribute: &'static Attribute,
        parents: &[Object],
    ) -> Result<()> {
        Ok(())
    }

    /// Called once after the root object ended.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    /// Skip attributes holding their default value; empty lists and null
    /// references count as defaults, and empty child attributes are skipped.
    pub ignore_default_values: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            ignore_default_values: true,
        }
    }
}

struct Frame {
    object: Object,
    started: bool,
    child_attribute: usize,
    child_index: usize,
}

impl Frame {
    fn new(object: Object) -> Self {
        Self {
            object,
            started: false,
            child_attribute: 0,
            child_index: 0,
        }
    }
}

fn annotate(object: &Object, attribute: Option<&Attribute>, err: ModelError) -> ModelError {
    let mut location = object.debug_path_default();
    if let Some(attribute) = attribute {
        location.push('.');
        location.push_str(attribute.name());
    }
    ModelError::Serialization {
        location,
        source: Box::new(err),
    }
}

/// Runs `serializer` over the tree rooted at `root`.
pub fn serialize<S: Serializer + ?Sized>(
    root: &Object,
    serializer: &mut S,
    options: &SerializeOptions,
) -> Result<()> {
    let mut stack = vec![Frame::new(root.clone())];
    let mut parents: Vec<Object> = Vec::new();

    while let Some(head) = stack.last_mut() {
        let object = head.object.clone();

        if !head.started {
            head.started = true;
            trace!(object = ?object, depth = parents.len(), "serializing object");
            serializer
                .start_object(&object, &parents)
                .map_err(|e| annotate(&object, None, e))?;
            emit_attributes(&object, serializer, options, &parents)?;
        }

        let Some(&attribute) = object.class().all_children().get(head.child_attribute) else {
            serializer
                .end_object(&object, &parents)
                .map_err(|e| annotate(&object, None, e))?;
            stack.pop();
            parents.pop();
            continue;
        };

        let (len, next) = child_at(&object, attribute, head.child_index);
        let announce = !options.ignore_default_values || len > 0;

        if head.child_index == 0 && announce {
            serializer
                .start_child_attribute(&object, attribute, &parents)
                .map_err(|e| annotate(&object, Some(attribute), e))?;
        }

        match next {
            Some(next) => {
                head.child_index += 1;
                parents.push(object);
                stack.push(Frame::new(next));
            }
            None => {
                head.child_attribute += 1;
                head.child_index = 0;
                if announce {
                    serializer
                        .end_child_attribute(&object, attribute, &parents)
                        .map_err(|e| annotate(&object, Some(attribute), e))?;
                }
            }
        }
    }

    serializer.finish()
}

/// Element count of a child attribute and its element at `index`, read
/// without copying the rest of the list.
fn child_at(object: &Object, attribute: &'static Attribute, index: usize) -> (usize, Option<Object>) {
    if attribute.is_list() {
        object.with_list(attribute, |items| {
            (items.len(), items.get(index).and_then(|v| v.as_object().cloned()))
        })
    } else {
        let child = object.read_unary(attribute).into_object();
        (usize::from(child.is_some()), child.filter(|_| index == 0))
    }
}

fn emit_attributes<S: Serializer + ?Sized>(
    object: &Object,
    serializer: &mut S,
    options: &SerializeOptions,
    parents: &[Object],
) -> Result<()> {
    let skip = options.ignore_default_values;
    for &attribute in object.class().all_attributes() {
        let result = match (attribute.kind(), attribute.arity()) {
            (AttributeKind::Child, _) => continue,
            (AttributeKind::Property, Arity::Unary) => {
                let value = object.read_unary(attribute);
                if skip && value == attribute.default_value() {
                    continue;
                }
                serializer.on_simple_property(object, attribute, &value, parents)
            }
            (AttributeKind::Property, Arity::List) => {
                let values = object.with_list(attribute, |items| items.clone());
                if skip && values.is_empty() {
                    continue;
                }
                serializer.on_simple_list_property(object, attribute, &values, parents)
            }
            (AttributeKind::Reference, Arity::Unary) => {
                let target = object.read_unary(attribute).into_object();
                if skip && target.is_none() {
                    continue;
                }
                serializer.on_reference_property(object, attribute, target.as_ref(), parents)
            }
            (AttributeKind::Reference, Arity::List) => {
                let targets: Vec<Object> = object.with_list(attribute, |items| {
                    items.iter().filter_map(|v| v.as_object().cloned()).collect()
                });
                if skip && targets.is_empty() {
                    continue;
                }
                serializer.on_reference_list_property(object, attribute, &targets, parents)
            }
        };
        result.map_err(|e| annotate(object, Some(attribute), e))?;
    }
    Ok(())
}
