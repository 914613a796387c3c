//! Fixture model used by the tests.
//!
//! Three classes cover every attribute shape the runtime supports:
//!
//! - `TestRoot`: an id, one property of each value type (plain, nullable and
//!   list variants), unary and list children, unary and list references, and
//!   a `friend` child of its own class for multi-hop paths.
//! - `TestNode`: id, name and a child list, for building deeper trees.
//! - `TestExtendedRoot`: a subclass of `TestRoot` adding `extra`.
//!
//! The typed wrappers show what generated model code looks like on top of the
//! reflective API.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use once_cell::sync::Lazy;

use crate::error::Result;
use crate::list::ModelList;
use crate::meta::{Attribute, Class, Literal, Value, ValueType};
use crate::notification::{Adapter, AdapterResult, Notification};
use crate::object::{ModelType, Object};

pub const COLORS: &[&str] = &["Red", "Green", "Blue"];

pub static TEST_ROOT: Lazy<Class> = Lazy::new(|| {
    Class::builder("TestRoot")
        .attribute(Attribute::id("id"))
        .attribute(Attribute::property("name", ValueType::String))
        .attribute(Attribute::property("flag", ValueType::Bool).default(Literal::Bool(true)))
        .attribute(Attribute::property("count", ValueType::Int))
        .attribute(Attribute::property("big", ValueType::Long))
        .attribute(Attribute::property("ratio", ValueType::Double))
        .attribute(Attribute::property("day", ValueType::Date).nullable())
        .attribute(Attribute::property("moment", ValueType::OffsetDateTime).nullable())
        .attribute(Attribute::property("color", ValueType::Enum(COLORS)))
        .attribute(Attribute::property("labels", ValueType::String).list())
        .attribute(Attribute::property("numbers", ValueType::Int).list())
        .attribute(Attribute::property("days", ValueType::Date).list())
        .attribute(Attribute::child("child", || &*TEST_NODE))
        .attribute(Attribute::child("children", || &*TEST_NODE).list())
        .attribute(Attribute::reference("single_ref", || &*TEST_NODE))
        .attribute(Attribute::reference("multi_ref", || &*TEST_NODE).list())
        .attribute(Attribute::child("friend", || &*TEST_ROOT))
        .build()
});

pub static TEST_NODE: Lazy<Class> = Lazy::new(|| {
    Class::builder("TestNode")
        .attribute(Attribute::id("id"))
        .attribute(Attribute::property("name", ValueType::String))
        .attribute(Attribute::child("children", || &*TEST_NODE).list())
        .build()
});

pub static TEST_EXTENDED_ROOT: Lazy<Class> = Lazy::new(|| {
    Class::builder("TestExtendedRoot")
        .extends(&TEST_ROOT)
        .attribute(Attribute::property("extra", ValueType::String))
        .build()
});

fn lookup(class: &'static Class, name: &str) -> &'static Attribute {
    class
        .attribute(name)
        .unwrap_or_else(|| panic!("{} has no attribute {}", class.name(), name))
}

macro_rules! accessors {
    ($class:expr; $($name:ident),* $(,)?) => {
        $(
            pub fn $name() -> &'static Attribute {
                super::lookup(&$class, stringify!($name))
            }
        )*
    };
}

pub mod test_root {
    use super::{Attribute, TEST_ROOT};

    accessors!(TEST_ROOT; id, name, flag, count, big, ratio, day, moment, color,
        labels, numbers, days, child, children, single_ref, multi_ref, friend);
}

pub mod test_node {
    use super::{Attribute, TEST_NODE};

    accessors!(TEST_NODE; id, name, children);
}

pub mod test_extended_root {
    use super::{Attribute, TEST_EXTENDED_ROOT};

    accessors!(TEST_EXTENDED_ROOT; extra);
}

macro_rules! model_type {
    ($wrapper:ident, $class:expr) => {
        #[derive(Clone, Debug, PartialEq)]
        pub struct $wrapper(Object);

        impl ModelType for $wrapper {
            fn class() -> &'static Class {
                &$class
            }

            fn from_object(object: Object) -> Self {
                Self(object)
            }

            fn object(&self) -> &Object {
                &self.0
            }
        }
    };
}

model_type!(TestRoot, TEST_ROOT);
model_type!(TestNode, TEST_NODE);
model_type!(TestExtendedRoot, TEST_EXTENDED_ROOT);

fn list_of(object: &Object, attribute: &'static Attribute) -> ModelList {
    ModelList::new(object.clone(), attribute)
}

fn string_of(object: &Object, attribute: &'static Attribute) -> String {
    object
        .read_unary(attribute)
        .as_str()
        .map(str::to_string)
        .unwrap_or_default()
}

impl TestRoot {
    pub fn id(&self) -> Option<String> {
        self.0.id()
    }

    pub fn set_id(&self, id: Option<&str>) -> Result<()> {
        self.0.set(test_root::id(), id)
    }

    pub fn name(&self) -> String {
        string_of(&self.0, test_root::name())
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        self.0.set(test_root::name(), name)
    }

    pub fn flag(&self) -> bool {
        self.0.read_unary(test_root::flag()).as_bool().unwrap_or_default()
    }

    pub fn set_flag(&self, flag: bool) -> Result<()> {
        self.0.set(test_root::flag(), flag)
    }

    pub fn count(&self) -> i32 {
        self.0.read_unary(test_root::count()).as_int().unwrap_or_default()
    }

    pub fn set_count(&self, count: i32) -> Result<()> {
        self.0.set(test_root::count(), count)
    }

    pub fn set_big(&self, big: i64) -> Result<()> {
        self.0.set(test_root::big(), big)
    }

    pub fn set_ratio(&self, ratio: f64) -> Result<()> {
        self.0.set(test_root::ratio(), ratio)
    }

    pub fn set_day(&self, day: Option<NaiveDate>) -> Result<()> {
        self.0.set(test_root::day(), day)
    }

    pub fn set_moment(&self, moment: Option<DateTime<FixedOffset>>) -> Result<()> {
        self.0.set(test_root::moment(), moment)
    }

    pub fn color(&self) -> String {
        string_of(&self.0, test_root::color())
    }

    pub fn set_color(&self, color: &str) -> Result<()> {
        self.0.set(test_root::color(), Value::Enum(color.to_string()))
    }

    pub fn labels(&self) -> ModelList {
        list_of(&self.0, test_root::labels())
    }

    pub fn numbers(&self) -> ModelList {
        list_of(&self.0, test_root::numbers())
    }

    pub fn days(&self) -> ModelList {
        list_of(&self.0, test_root::days())
    }

    pub fn child(&self) -> Option<TestNode> {
        self.0
            .read_unary(test_root::child())
            .into_object()
            .map(TestNode::from_object)
    }

    pub fn set_child(&self, child: Option<&TestNode>) -> Result<()> {
        self.0
            .set(test_root::child(), child.map(|c| c.object().clone()))
    }

    pub fn children(&self) -> ModelList {
        list_of(&self.0, test_root::children())
    }

    pub fn single_ref(&self) -> Option<TestNode> {
        self.0
            .read_unary(test_root::single_ref())
            .into_object()
            .map(TestNode::from_object)
    }

    pub fn set_single_ref(&self, target: Option<&TestNode>) -> Result<()> {
        self.0
            .set(test_root::single_ref(), target.map(|t| t.object().clone()))
    }

    pub fn multi_ref(&self) -> ModelList {
        list_of(&self.0, test_root::multi_ref())
    }

    pub fn friend(&self) -> Option<TestRoot> {
        self.0
            .read_unary(test_root::friend())
            .into_object()
            .map(TestRoot::from_object)
    }

    pub fn set_friend(&self, friend: Option<&TestRoot>) -> Result<()> {
        self.0
            .set(test_root::friend(), friend.map(|f| f.object().clone()))
    }
}

impl TestNode {
    pub fn id(&self) -> Option<String> {
        self.0.id()
    }

    pub fn set_id(&self, id: Option<&str>) -> Result<()> {
        self.0.set(test_node::id(), id)
    }

    pub fn name(&self) -> String {
        string_of(&self.0, test_node::name())
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        self.0.set(test_node::name(), name)
    }

    pub fn children(&self) -> ModelList {
        list_of(&self.0, test_node::children())
    }
}

impl TestExtendedRoot {
    pub fn as_root(&self) -> TestRoot {
        TestRoot::from_object(self.0.clone())
    }

    pub fn extra(&self) -> String {
        string_of(&self.0, test_extended_root::extra())
    }

    pub fn set_extra(&self, extra: &str) -> Result<()> {
        self.0.set(test_extended_root::extra(), extra)
    }
}

/// Adapter that keeps every notification it receives.
#[derive(Default)]
pub struct RecordingAdapter {
    events: RefCell<Vec<Notification>>,
}

impl RecordingAdapter {
    pub fn attach_to(object: &Object) -> Rc<RecordingAdapter> {
        object
            .attach(Rc::new(RecordingAdapter::default()))
            .expect("recording adapter attaches")
    }

    /// Returns and forgets the notifications received so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl Adapter for RecordingAdapter {
    fn notify(&self, notification: &Notification) -> AdapterResult {
        self.events.borrow_mut().push(notification.clone());
        Ok(())
    }
}

/// Adapter whose every notification fails with its label.
pub struct Failing(pub &'static str);

#[derive(Debug)]
pub struct FixtureError(pub String);

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FixtureError {}

impl Adapter for Failing {
    fn notify(&self, notification: &Notification) -> AdapterResult {
        Err(Box::new(FixtureError(format!(
            "{} failed on {}",
            self.0, notification
        ))))
    }
}
