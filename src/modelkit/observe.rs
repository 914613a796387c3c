//! Observing a value through a chain of objects.
//!
//! A [`ValuePath`] starts at a class, follows unary child or reference
//! attributes, and ends at the attribute whose value is of interest:
//!
//! ```text
//! TestRoot: friend.child.name
//! ```
//!
//! An [`ObservedValue`] keeps one adapter on every object currently on that
//! chain. When an intermediate object is replaced the adapters below it move
//! to the new object, and listeners learn whether the value is reachable
//! ([`ValueEvent::Resolved`]) or not ([`ValueEvent::Unresolved`]).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::error::{AdapterFailure, FirstError, ModelError, Result};
use crate::meta::{Arity, Attribute, AttributeKind, Class, Value};
use crate::notification::{Adapter, AdapterResult, Notification};
use crate::object::{AttrValue, Object};

/// Attribute chain from a class to a value.
#[derive(Clone)]
pub struct ValuePath {
    class: &'static Class,
    hops: Vec<&'static Attribute>,
    target: &'static Attribute,
}

impl ValuePath {
    /// Every hop must be a unary child or reference attribute of the class
    /// reached so far, and `target` an attribute of the last class.
    pub fn new(
        class: &'static Class,
        hops: impl IntoIterator<Item = &'static Attribute>,
        target: &'static Attribute,
    ) -> Result<ValuePath> {
        let hops: Vec<_> = hops.into_iter().collect();
        let malformed = |reason: String| ModelError::MalformedPath {
            path: dotted(&hops, target),
            reason,
        };

        let mut current = class;
        for (index, &hop) in hops.iter().enumerate() {
            if !hop.is_member_of(current) {
                return Err(malformed(format!(
                    "hop {}: {} is not an attribute of {}",
                    index,
                    hop.name(),
                    current.name()
                )));
            }
            if hop.kind() == AttributeKind::Property || hop.is_list() {
                return Err(malformed(format!(
                    "hop {}: {} is not a unary child or reference",
                    index,
                    hop.name()
                )));
            }
            current = hop
                .value_type()
                .class()
                .ok_or_else(|| malformed(format!("hop {} has no target class", index)))?;
        }
        if !target.is_member_of(current) {
            return Err(malformed(format!(
                "{} is not an attribute of {}",
                target.name(),
                current.name()
            )));
        }

        Ok(ValuePath {
            class,
            hops,
            target,
        })
    }

    /// Builds a path from dot separated attribute names, e.g.
    /// `friend.child.name`.
    pub fn parse(class: &'static Class, text: &str) -> Result<ValuePath> {
        let names: Vec<&str> = text.split('.').collect();
        let mut attributes = Vec::with_capacity(names.len());
        let mut current = Some(class);
        for name in &names {
            let owner = current.ok_or_else(|| ModelError::MalformedPath {
                path: text.to_string(),
                reason: format!("cannot continue past a value attribute at '{}'", name),
            })?;
            let attribute = owner
                .attribute(name)
                .ok_or_else(|| ModelError::MalformedPath {
                    path: text.to_string(),
                    reason: format!("{} has no attribute '{}'", owner.name(), name),
                })?;
            current = attribute.value_type().class();
            attributes.push(attribute);
        }
        // split always yields at least one part
        let target = attributes.pop().ok_or_else(|| ModelError::MalformedPath {
            path: text.to_string(),
            reason: "empty path".into(),
        })?;
        ValuePath::new(class, attributes, target)
    }

    pub fn class(&self) -> &'static Class {
        self.class
    }

    pub fn hops(&self) -> &[&'static Attribute] {
        &self.hops
    }

    pub fn target(&self) -> &'static Attribute {
        self.target
    }

    /// The object holding the target attribute, or `None` when a hop is
    /// empty.
    pub fn resolve_target(&self, root: &Object) -> Result<Option<Object>> {
        if !root.class().is_subclass_of(self.class) {
            return Err(ModelError::TypeMismatch {
                attribute: self.to_string(),
                expected: self.class.name().to_string(),
                found: root.class().name().to_string(),
            });
        }
        let mut current = root.clone();
        for &hop in &self.hops {
            match current.read_unary(hop).into_object() {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn get(&self, root: &Object) -> Result<Option<AttrValue>> {
        match self.resolve_target(root)? {
            Some(object) => object.get(self.target).map(Some),
            None => Ok(None),
        }
    }

    /// Sets the target value; returns false when the path does not resolve.
    pub fn set(&self, root: &Object, value: impl Into<Value>) -> Result<bool> {
        match self.resolve_target(root)? {
            Some(object) => {
                object.set(self.target, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn dotted(hops: &[&'static Attribute], target: &'static Attribute) -> String {
    hops.iter()
        .chain(std::iter::once(&target))
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class.name(), dotted(&self.hops, self.target))
    }
}

impl fmt::Debug for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValuePath({})", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueEvent {
    /// The value is reachable. `notification` is the change that produced it,
    /// or `None` when the chain itself was (re)connected.
    Resolved {
        value: Value,
        notification: Option<Notification>,
    },
    Unresolved,
}

impl fmt::Display for ValueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueEvent::Resolved { value, .. } => write!(f, "Resolved({})", value),
            ValueEvent::Unresolved => f.write_str("Unresolved"),
        }
    }
}

pub type ValueListener = dyn Fn(&ValueEvent) -> AdapterResult;

/// Handle returned by [`ObservedValue::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

struct ObservedInner {
    root: Object,
    path: ValuePath,
    listeners: RefCell<Vec<(ListenerId, Rc<ValueListener>)>>,
    next_listener: Cell<usize>,
    root_link: RefCell<Option<Rc<PathLink>>>,
}

impl ObservedInner {
    fn current(&self) -> Result<ValueEvent> {
        Ok(match self.path.resolve_target(&self.root)? {
            Some(object) => ValueEvent::Resolved {
                value: object.read_unary(self.path.target),
                notification: None,
            },
            None => ValueEvent::Unresolved,
        })
    }

    fn emit(&self, event: &ValueEvent) -> Result<()> {
        let listeners: Vec<_> = self.listeners.borrow().clone();
        trace!(path = %self.path, listeners = listeners.len(), "{}", event);
        let mut failures = Vec::new();
        for (_, listener) in listeners {
            if let Err(source) = listener(event) {
                warn!(path = %self.path, "value listener failed on {}: {}", event, source);
                failures.push(AdapterFailure {
                    adapter: "value listener",
                    source,
                });
            }
        }
        ModelError::from_failures(|| format!("{} at {}", event, self.path), failures)
    }
}

/// Adapter on the object at position `index` of the chain. Links before the
/// target follow their hop; the last link watches the target attribute.
struct PathLink {
    observed: Weak<ObservedInner>,
    index: usize,
    next: RefCell<Option<(Object, Rc<PathLink>)>>,
}

impl PathLink {
    fn new(observed: Weak<ObservedInner>, index: usize) -> Self {
        Self {
            observed,
            index,
            next: RefCell::new(None),
        }
    }

    /// Moves the next link from its current object to `target`.
    fn follow(&self, target: Option<Object>) -> Result<()> {
        if let Some((current, _)) = &*self.next.borrow() {
            if Some(current) == target.as_ref() {
                return Ok(());
            }
        }

        let mut pending = FirstError::default();
        let previous = self.next.borrow_mut().take();
        if let Some((object, link)) = previous {
            pending.record(object.detach(&link).map(|_| ()));
        }
        if let Some(object) = target {
            let link = Rc::new(PathLink::new(self.observed.clone(), self.index + 1));
            *self.next.borrow_mut() = Some((object.clone(), link.clone()));
            pending.record(object.attach(link).map(|_| ()));
        }
        pending.finish()
    }
}

impl Adapter for PathLink {
    fn notify(&self, notification: &Notification) -> AdapterResult {
        let Some(observed) = self.observed.upgrade() else {
            return Ok(());
        };
        match observed.path.hops.get(self.index) {
            Some(&hop) => {
                if let Notification::Set { attribute, new, .. } = notification {
                    if *attribute == hop {
                        self.follow(new.as_object().cloned())?;
                    }
                }
            }
            None if notification.attribute() == Some(observed.path.target) => {
                let value = match notification {
                    Notification::Set { new, .. } => new.clone(),
                    other => other.object().read_unary(observed.path.target),
                };
                observed.emit(&ValueEvent::Resolved {
                    value,
                    notification: Some(notification.clone()),
                })?;
            }
            None => {}
        }
        Ok(())
    }

    fn on_attach(&self, object: &Object) -> AdapterResult {
        let Some(observed) = self.observed.upgrade() else {
            return Ok(());
        };
        match observed.path.hops.get(self.index) {
            Some(&hop) => self.follow(object.read_unary(hop).into_object())?,
            None => observed.emit(&ValueEvent::Resolved {
                value: object.read_unary(observed.path.target),
                notification: None,
            })?,
        }
        Ok(())
    }

    fn on_detach(&self, _object: &Object) -> AdapterResult {
        let Some(observed) = self.observed.upgrade() else {
            return Ok(());
        };
        if self.index < observed.path.hops.len() {
            self.follow(None)?;
        } else {
            observed.emit(&ValueEvent::Unresolved)?;
        }
        Ok(())
    }
}

/// A live view of the value at the end of a [`ValuePath`] seen from `root`.
///
/// Dropping the handle removes every adapter it installed.
pub struct ObservedValue {
    inner: Rc<ObservedInner>,
}

impl ObservedValue {
    /// Creates an inactive observation. The target must be unary.
    pub fn new(root: &Object, path: ValuePath) -> Result<ObservedValue> {
        path.target.require_arity(Arity::Unary)?;
        if !root.class().is_subclass_of(path.class) {
            return Err(ModelError::TypeMismatch {
                attribute: path.to_string(),
                expected: path.class.name().to_string(),
                found: root.class().name().to_string(),
            });
        }
        Ok(ObservedValue {
            inner: Rc::new(ObservedInner {
                root: root.clone(),
                path,
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                root_link: RefCell::new(None),
            }),
        })
    }

    /// Creates and activates an observation.
    pub fn observe(root: &Object, path: ValuePath) -> Result<ObservedValue> {
        let observed = ObservedValue::new(root, path)?;
        observed.activate()?;
        Ok(observed)
    }

    pub fn root(&self) -> &Object {
        &self.inner.root
    }

    pub fn path(&self) -> &ValuePath {
        &self.inner.path
    }

    pub fn is_active(&self) -> bool {
        self.inner.root_link.borrow().is_some()
    }

    /// Installs the adapter chain. Listeners receive the current state.
    pub fn activate(&self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }
        let link = Rc::new(PathLink::new(Rc::downgrade(&self.inner), 0));
        *self.inner.root_link.borrow_mut() = Some(link.clone());
        self.inner.root.attach(link)?;
        Ok(())
    }

    /// Removes the adapter chain. Listeners see the value become unresolved.
    pub fn deactivate(&self) -> Result<()> {
        let link = self.inner.root_link.borrow_mut().take();
        match link {
            Some(link) => self.inner.root.detach(&link).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn get(&self) -> Result<Option<Value>> {
        Ok(self
            .inner
            .path
            .resolve_target(&self.inner.root)?
            .map(|object| object.read_unary(self.inner.path.target)))
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<bool> {
        self.inner.path.set(&self.inner.root, value)
    }

    /// Registers `listener` and immediately sends it the current state.
    pub fn add_listener(
        &self,
        listener: impl Fn(&ValueEvent) -> AdapterResult + 'static,
    ) -> Result<ListenerId> {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        let listener: Rc<ValueListener> = Rc::new(listener);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, listener.clone()));

        let event = self.inner.current()?;
        listener(&event).map_err(|source| ModelError::Adapter {
            notification: format!("{} at {}", event, self.inner.path),
            first: AdapterFailure {
                adapter: "value listener",
                source,
            },
            others: Vec::new(),
        })?;
        Ok(id)
    }

    /// Unregisters a listener. If the value is currently resolved, the
    /// listener receives a final `Unresolved`.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        let removed = {
            let mut listeners = self.inner.listeners.borrow_mut();
            listeners
                .iter()
                .position(|(candidate, _)| *candidate == id)
                .map(|index| listeners.remove(index).1)
        };
        let Some(listener) = removed else {
            return Ok(false);
        };
        if matches!(self.inner.current()?, ValueEvent::Resolved { .. }) {
            listener(&ValueEvent::Unresolved).map_err(|source| ModelError::Adapter {
                notification: format!("Unresolved at {}", self.inner.path),
                first: AdapterFailure {
                    adapter: "value listener",
                    source,
                },
                others: Vec::new(),
            })?;
        }
        Ok(true)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl Drop for ObservedValue {
    fn drop(&mut self) {
        self.inner.listeners.borrow_mut().clear();
        if let Err(err) = self.deactivate() {
            warn!(path = %self.inner.path, "failed to remove observation adapters: {}", err);
        }
    }
}

impl fmt::Debug for ObservedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedValue")
            .field("root", &self.inner.root)
            .field("path", &self.inner.path)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        test_node, test_root, FixtureError, TestNode, TestRoot, TEST_NODE, TEST_ROOT,
    };
    use crate::ModelType;

    fn friend_child_name() -> ValuePath {
        ValuePath::new(
            &TEST_ROOT,
            [test_root::friend(), test_root::child()],
            test_node::name(),
        )
        .unwrap()
    }

    fn sample() -> TestRoot {
        let root = TestRoot::create();
        let friend = TestRoot::create();
        let child = TestNode::create();
        child.set_name("Foo").unwrap();
        friend.set_child(Some(&child)).unwrap();
        root.set_friend(Some(&friend)).unwrap();
        root
    }

    fn recorder(observed: &ObservedValue) -> Rc<RefCell<Vec<ValueEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        observed
            .add_listener(move |event| {
                sink.borrow_mut().push(event.clone());
                Ok(())
            })
            .unwrap();
        events
    }

    fn drain(events: &Rc<RefCell<Vec<ValueEvent>>>) -> Vec<ValueEvent> {
        std::mem::take(&mut *events.borrow_mut())
    }

    #[test]
    fn test_parse_matches_new() {
        let parsed = ValuePath::parse(&TEST_ROOT, "friend.child.name").unwrap();
        assert_eq!(parsed.hops(), friend_child_name().hops());
        assert_eq!(parsed.target(), test_node::name());
        assert_eq!(parsed.to_string(), "TestRoot: friend.child.name");
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["labels.name", "children.name", "name.child", "friend.nope", ""] {
            assert!(
                matches!(
                    ValuePath::parse(&TEST_ROOT, bad),
                    Err(ModelError::MalformedPath { .. })
                ),
                "{bad} should be rejected"
            );
        }
        assert!(ValuePath::new(&TEST_NODE, [test_root::friend()], test_root::name()).is_err());
    }

    #[test]
    fn test_get_and_set_through_path() {
        let root = sample();
        let path = friend_child_name();
        let value = path.get(root.object()).unwrap().and_then(AttrValue::into_value);
        assert_eq!(value, Some(Value::from("Foo")));

        assert!(path.set(root.object(), "Bar").unwrap());
        assert_eq!(root.friend().unwrap().child().unwrap().name(), "Bar");

        root.friend().unwrap().set_child(None).unwrap();
        assert!(path.get(root.object()).unwrap().is_none());
        assert!(!path.set(root.object(), "Baz").unwrap());
    }

    #[test]
    fn test_root_class_must_match() {
        let node = TestNode::create();
        assert!(matches!(
            friend_child_name().resolve_target(node.object()),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_observation_follows_chain() {
        let root = sample();
        let observed = ObservedValue::observe(root.object(), friend_child_name()).unwrap();
        assert_eq!(observed.get().unwrap(), Some(Value::from("Foo")));
        let child = root.friend().unwrap().child().unwrap();
        assert_eq!(child.object().adapter_count(), 1);

        let events = recorder(&observed);
        assert_eq!(
            drain(&events),
            vec![ValueEvent::Resolved {
                value: Value::from("Foo"),
                notification: None,
            }]
        );

        child.set_name("Bar").unwrap();
        assert_eq!(
            drain(&events),
            vec![ValueEvent::Resolved {
                value: Value::from("Bar"),
                notification: Some(Notification::Set {
                    object: child.object().clone(),
                    attribute: test_node::name(),
                    old: Value::from("Foo"),
                    new: Value::from("Bar"),
                }),
            }]
        );

        let old_friend = root.friend().unwrap();
        root.set_friend(None).unwrap();
        assert_eq!(drain(&events), vec![ValueEvent::Unresolved]);
        assert_eq!(old_friend.object().adapter_count(), 0);
        assert_eq!(child.object().adapter_count(), 0);

        root.set_friend(Some(&TestRoot::create())).unwrap();
        assert!(drain(&events).is_empty());

        root.friend().unwrap().set_child(Some(&TestNode::create())).unwrap();
        assert_eq!(
            drain(&events),
            vec![ValueEvent::Resolved {
                value: Value::from(""),
                notification: None,
            }]
        );
    }

    #[test]
    fn test_unrelated_changes_are_ignored() {
        let root = sample();
        let observed = ObservedValue::observe(root.object(), friend_child_name()).unwrap();
        let events = recorder(&observed);
        drain(&events);

        root.set_name("other").unwrap();
        root.friend().unwrap().set_name("other").unwrap();
        root.friend().unwrap().child().unwrap().set_id(Some("c")).unwrap();
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn test_deactivate_and_drop_remove_adapters() {
        let root = sample();
        let child = root.friend().unwrap().child().unwrap();
        let observed = ObservedValue::observe(root.object(), friend_child_name()).unwrap();
        let events = recorder(&observed);
        drain(&events);

        observed.deactivate().unwrap();
        assert!(!observed.is_active());
        assert_eq!(drain(&events), vec![ValueEvent::Unresolved]);
        assert_eq!(root.object().adapter_count(), 0);
        assert_eq!(child.object().adapter_count(), 0);

        observed.activate().unwrap();
        assert_eq!(child.object().adapter_count(), 1);
        drop(observed);
        assert_eq!(root.object().adapter_count(), 0);
        assert_eq!(child.object().adapter_count(), 0);
    }

    #[test]
    fn test_remove_listener_sends_unresolved() {
        let root = sample();
        let observed = ObservedValue::observe(root.object(), friend_child_name()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let id = observed
            .add_listener(move |event| {
                sink.borrow_mut().push(event.clone());
                Ok(())
            })
            .unwrap();
        drain(&events);

        assert!(observed.remove_listener(id).unwrap());
        assert!(!observed.remove_listener(id).unwrap());
        assert_eq!(drain(&events), vec![ValueEvent::Unresolved]);
        assert_eq!(observed.listener_count(), 0);
    }

    #[test]
    fn test_listener_failures_are_aggregated() {
        let root = sample();
        let observed = ObservedValue::observe(root.object(), friend_child_name()).unwrap();
        let armed = Rc::new(Cell::new(false));
        for label in ["first", "second"] {
            let armed = armed.clone();
            observed
                .add_listener(move |_| {
                    if armed.get() {
                        Err(Box::new(FixtureError(label.to_string())))
                    } else {
                        Ok(())
                    }
                })
                .unwrap();
        }
        let events = recorder(&observed);
        drain(&events);
        armed.set(true);

        let child = root.friend().unwrap().child().unwrap();
        let err = child.set_name("Bar").unwrap_err();
        assert_eq!(child.name(), "Bar");
        assert_eq!(drain(&events).len(), 1);

        // the path link reports the aggregated listener error as its own failure
        let failures = err.adapter_failures();
        assert_eq!(failures.len(), 1);
        let inner = failures[0].source.downcast_ref::<ModelError>().unwrap();
        let labels: Vec<String> = inner
            .adapter_failures()
            .iter()
            .map(|f| f.source.to_string())
            .collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn test_list_target_cannot_be_observed() {
        let root = TestRoot::create();
        let path = ValuePath::parse(&TEST_ROOT, "labels").unwrap();
        assert!(matches!(
            ObservedValue::new(root.object(), path),
            Err(ModelError::WrongArity { .. })
        ));
    }
}
