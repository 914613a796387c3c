//! Model objects.
//!
//! An [`Object`] is a cheap, clonable handle to one instance of a [`Class`].
//! Handles compare by identity. Each instance stores one slot per attribute of
//! its class (indexed by [`Attribute::slot`]), a weak link to its container,
//! and the adapters observing it.
//!
//! Parents are held weakly and children strongly, so a tree lives as long as
//! someone holds its root.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::containment;
use crate::error::{AdapterFailure, ModelError, Result};
use crate::list::ModelList;
use crate::meta::{Arity, Attribute, AttributeKind, Class, Value};
use crate::notification::{Adapter, Notification};

/// Result of reading an attribute reflectively.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Single(Value),
    List(ModelList),
}

impl AttrValue {
    pub fn into_value(self) -> Option<Value> {
        match self {
            AttrValue::Single(v) => Some(v),
            AttrValue::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<ModelList> {
        match self {
            AttrValue::List(l) => Some(l),
            AttrValue::Single(_) => None,
        }
    }
}

/// Contract of typed wrappers around [`Object`], one per model class.
pub trait ModelType: Sized {
    fn class() -> &'static Class;

    /// Wraps an object without checking its class.
    fn from_object(object: Object) -> Self;

    fn object(&self) -> &Object;

    fn create() -> Self {
        Self::from_object(Object::new(Self::class()))
    }

    fn cast(object: &Object) -> Option<Self> {
        object
            .class()
            .is_subclass_of(Self::class())
            .then(|| Self::from_object(object.clone()))
    }
}

enum Slot {
    Unary(Value),
    List(Vec<Value>),
}

struct Container {
    parent: Weak<ObjectData>,
    attribute: &'static Attribute,
}

#[derive(Clone)]
struct Registration {
    adapter: Rc<dyn Adapter>,
    any: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Registration {
    fn is<A: ?Sized>(&self, adapter: &Rc<A>) -> bool {
        Rc::as_ptr(&self.any) as *const () == Rc::as_ptr(adapter) as *const ()
    }
}

pub(crate) struct ObjectData {
    class: &'static Class,
    slots: RefCell<Vec<Slot>>,
    container: RefCell<Option<Container>>,
    adapters: RefCell<Vec<Registration>>,
}

impl Drop for ObjectData {
    // Releases contained objects iteratively; a naive drop recurses once per
    // tree level.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        release_slots(self.slots.get_mut(), &mut pending);
        while let Some(data) = pending.pop() {
            if let Ok(mut data) = Rc::try_unwrap(data) {
                release_slots(data.slots.get_mut(), &mut pending);
            }
        }
    }
}

fn release_slots(slots: &mut Vec<Slot>, pending: &mut Vec<Rc<ObjectData>>) {
    for slot in slots.drain(..) {
        match slot {
            Slot::Unary(Value::Object(object)) => pending.push(object.0),
            Slot::List(items) => pending.extend(items.into_iter().filter_map(|v| match v {
                Value::Object(object) => Some(object.0),
                _ => None,
            })),
            Slot::Unary(_) => {}
        }
    }
}

#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    /// Creates a default instance: every unary attribute at its default,
    /// every list empty, no parent.
    pub fn new(class: &'static Class) -> Object {
        let slots = class
            .all_attributes()
            .iter()
            .map(|attr| match attr.arity() {
                Arity::Unary => Slot::Unary(attr.default_value()),
                Arity::List => Slot::List(Vec::new()),
            })
            .collect();
        Object(Rc::new(ObjectData {
            class,
            slots: RefCell::new(slots),
            container: RefCell::new(None),
            adapters: RefCell::new(Vec::new()),
        }))
    }

    pub fn class(&self) -> &'static Class {
        self.0.class
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn cast<T: ModelType>(&self) -> Option<T> {
        T::cast(self)
    }

    pub fn parent(&self) -> Option<Object> {
        self.container().map(|(parent, _)| parent)
    }

    /// The child attribute of the parent that holds this object.
    pub fn containing_attribute(&self) -> Option<&'static Attribute> {
        self.container().map(|(_, attr)| attr)
    }

    pub fn container(&self) -> Option<(Object, &'static Attribute)> {
        let container = self.0.container.borrow();
        let container = container.as_ref()?;
        let parent = container.parent.upgrade()?;
        Some((Object(parent), container.attribute))
    }

    pub(crate) fn replace_container(&self, target: Option<(&Object, &'static Attribute)>) {
        *self.0.container.borrow_mut() = target.map(|(parent, attribute)| Container {
            parent: Rc::downgrade(&parent.0),
            attribute,
        });
    }

    /// Value of the class's id attribute, if it has one and it is set.
    pub fn id(&self) -> Option<String> {
        let attr = self.class().id_attribute()?;
        self.read_unary(attr).as_str().map(str::to_string)
    }

    pub fn get(&self, attribute: &'static Attribute) -> Result<AttrValue> {
        attribute.get(self)
    }

    pub fn get_by_name(&self, name: &str) -> Result<AttrValue> {
        let attr = self
            .class()
            .attribute(name)
            .ok_or_else(|| ModelError::UnknownAttribute {
                object: format!("{:?}", self),
                class: self.class().name().to_string(),
                name: name.to_string(),
            })?;
        attr.get(self)
    }

    /// Reads a unary attribute.
    pub fn value(&self, attribute: &'static Attribute) -> Result<Value> {
        attribute.check_member(self)?;
        attribute.require_arity(Arity::Unary)?;
        Ok(self.read_unary(attribute))
    }

    /// Live view of a list attribute.
    pub fn list(&self, attribute: &'static Attribute) -> Result<ModelList> {
        attribute.check_member(self)?;
        attribute.require_arity(Arity::List)?;
        Ok(ModelList::new(self.clone(), attribute))
    }

    /// Writes a unary attribute.
    ///
    /// Properties and references notify `Set` only when the value actually
    /// changes. Child attributes go through containment: the new child is
    /// detached from wherever it was, and setting null detaches the current
    /// child.
    pub fn set(&self, attribute: &'static Attribute, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        attribute.check_member(self)?;
        attribute.require_arity(Arity::Unary)?;
        attribute.check_value(&value)?;

        if attribute.kind() == AttributeKind::Child {
            return match value {
                Value::Object(child) => {
                    containment::set_container(&child, Some((self, attribute)), None)
                }
                _ => match self.read_unary(attribute) {
                    Value::Object(current) => containment::set_container(&current, None, None),
                    _ => Ok(()),
                },
            };
        }

        let old = self.read_unary(attribute);
        if old == value {
            return Ok(());
        }
        self.write_unary(attribute, value.clone());
        self.notify(&Notification::Set {
            object: self.clone(),
            attribute,
            old,
            new: value,
        })
    }

    pub(crate) fn read_unary(&self, attribute: &'static Attribute) -> Value {
        match self.0.slots.borrow().get(attribute.slot()) {
            Some(Slot::Unary(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    /// Stores a unary value without notifying; returns the previous value.
    pub(crate) fn write_unary(&self, attribute: &'static Attribute, value: Value) -> Value {
        match self.0.slots.borrow_mut().get_mut(attribute.slot()) {
            Some(Slot::Unary(current)) => std::mem::replace(current, value),
            _ => Value::Null,
        }
    }

    /// Runs `f` on the raw storage of a list attribute.
    pub(crate) fn with_list<R>(
        &self,
        attribute: &'static Attribute,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> R {
        let mut slots = self.0.slots.borrow_mut();
        match slots.get_mut(attribute.slot()) {
            Some(Slot::List(items)) => f(items),
            _ => f(&mut Vec::new()),
        }
    }

    /// Attaches `adapter`; attaching an already attached instance is a no-op.
    pub fn attach<A: Adapter>(&self, adapter: Rc<A>) -> Result<Rc<A>> {
        if self.0.adapters.borrow().iter().any(|r| r.is(&adapter)) {
            return Ok(adapter);
        }
        let registration = Registration {
            adapter: adapter.clone(),
            any: adapter.clone(),
            type_id: TypeId::of::<A>(),
            type_name: type_name::<A>(),
        };
        self.0.adapters.borrow_mut().push(registration.clone());
        registration
            .adapter
            .on_attach(self)
            .map_err(|source| self.hook_failure("attach", registration.type_name, source))?;
        Ok(adapter)
    }

    /// Returns the adapter of type `A`, creating and attaching it on first use.
    pub fn adapt<A: Adapter>(&self, factory: impl FnOnce(&Object) -> A) -> Result<Rc<A>> {
        match self.adapter::<A>() {
            Some(existing) => Ok(existing),
            None => self.attach(Rc::new(factory(self))),
        }
    }

    /// The first attached adapter of type `A`.
    pub fn adapter<A: Adapter>(&self) -> Option<Rc<A>> {
        let any = self
            .0
            .adapters
            .borrow()
            .iter()
            .find(|r| r.type_id == TypeId::of::<A>())
            .map(|r| r.any.clone())?;
        any.downcast::<A>().ok()
    }

    /// Removes `adapter`; returns whether it was attached.
    pub fn detach<A: ?Sized>(&self, adapter: &Rc<A>) -> Result<bool> {
        let removed = {
            let mut adapters = self.0.adapters.borrow_mut();
            adapters
                .iter()
                .position(|r| r.is(adapter))
                .map(|index| adapters.remove(index))
        };
        self.finish_detach(removed)
    }

    /// Removes the first adapter of type `A`.
    pub fn detach_type<A: Adapter>(&self) -> Result<bool> {
        let removed = {
            let mut adapters = self.0.adapters.borrow_mut();
            adapters
                .iter()
                .position(|r| r.type_id == TypeId::of::<A>())
                .map(|index| adapters.remove(index))
        };
        self.finish_detach(removed)
    }

    fn finish_detach(&self, removed: Option<Registration>) -> Result<bool> {
        match removed {
            None => Ok(false),
            Some(registration) => {
                registration
                    .adapter
                    .on_detach(self)
                    .map_err(|source| self.hook_failure("detach", registration.type_name, source))?;
                Ok(true)
            }
        }
    }

    pub fn adapter_count(&self) -> usize {
        self.0.adapters.borrow().len()
    }

    fn hook_failure(
        &self,
        hook: &str,
        adapter: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> ModelError {
        warn!(adapter, object = ?self, "adapter {} hook failed: {}", hook, source);
        ModelError::Adapter {
            notification: format!("{} of {:?}", hook, self),
            first: AdapterFailure { adapter, source },
            others: Vec::new(),
        }
    }

    /// Delivers `notification` to every attached adapter in attachment order.
    ///
    /// Adapters attached or detached during delivery take effect with the
    /// next notification.
    pub fn notify(&self, notification: &Notification) -> Result<()> {
        let adapters: Vec<Registration> = self.0.adapters.borrow().clone();
        let mut failures = Vec::new();
        for registration in adapters {
            if let Err(source) = registration.adapter.notify(notification) {
                warn!(
                    adapter = registration.type_name,
                    "adapter failed on {}: {}", notification, source
                );
                failures.push(AdapterFailure {
                    adapter: registration.type_name,
                    source,
                });
            }
        }
        ModelError::from_failures(|| notification.to_string(), failures)
    }

    pub(crate) fn try_id(&self) -> Option<String> {
        let attr = self.class().id_attribute()?;
        let slots = self.0.slots.try_borrow().ok()?;
        match slots.get(attr.slot()) {
            Some(Slot::Unary(Value::String(id))) => Some(id.clone()),
            _ => None,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_id() {
            Some(id) => write!(f, "{}<{}>", self.class().name(), id),
            None => f.write_str(self.class().name()),
        }
    }
}
