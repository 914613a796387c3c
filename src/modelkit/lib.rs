//! # Modelkit Architecture
//!
//! Modelkit is a **reflective object-model runtime**. Model types are described
//! at runtime by a metamodel, instances form containment trees, and every
//! state change is announced to observers. Formats and tools are written once
//! against the metamodel and work for any model.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Formats (json/)                                            │
//! │  - JSON documents on top of the two generic frameworks      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Frameworks (serializer.rs, deserializer.rs, path.rs)       │
//! │  - Pre-order callback walk over a tree                      │
//! │  - Incremental reconstruction with deferred references      │
//! │  - Path strings and their resolution                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Object Model (object.rs, list.rs, containment.rs)          │
//! │  - Slot storage, typed get/set, live list views             │
//! │  - Single-parent containment kept consistent on every move  │
//! │  - Notifications delivered to attached adapters             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Metamodel (meta/)                                          │
//! │  - Class and Attribute descriptors, Value and ValueType     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//!
//! [`Object`] is an `Rc` handle. A parent owns its children; the link back to
//! the parent is weak. References between objects are plain handles and do not
//! take part in containment. Nothing here is `Send`: a model lives on one
//! thread.
//!
//! ## Notifications
//!
//! Each change produces exactly one [`Notification`], delivered after the
//! change. Adapters may read and modify the model from inside `notify`. A
//! failing adapter never stops delivery to the others; failures are collected
//! into one [`ModelError::Adapter`].
//!
//! ## Module Overview
//!
//! - [`meta`]: Metamodel descriptors and dynamic values
//! - [`object`]: Object handles, reflective access, adapter registry
//! - [`list`]: Live views of list attributes
//! - [`notification`]: Notification variants and the `Adapter` trait
//! - [`tree`]: Ancestors, descendants, debug paths, deep equality
//! - [`path`]: Path strings and the id resolver
//! - [`serializer`] / [`deserializer`]: Format independent (de)serialization
//! - [`codec`]: String codecs for the date and time value types
//! - [`json`]: The JSON format
//! - [`observe`]: Value observation along attribute chains
//! - [`config`]: Format settings
//! - [`error`]: Error types

mod containment;

pub mod codec;
pub mod config;
pub mod deserializer;
pub mod error;
pub mod json;
pub mod list;
pub mod meta;
pub mod notification;
pub mod object;
pub mod observe;
pub mod path;
pub mod serializer;
pub mod tree;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{ModelError, Result};
pub use notification::{Adapter, AdapterResult, Notification};
pub use object::{AttrValue, ModelType, Object};
pub use serializer::serialize;
pub use tree::deep_equals;
