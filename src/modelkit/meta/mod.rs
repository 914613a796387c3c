//! The reflective metamodel.
//!
//! Every model type is described by a [`Class`]: its name, optional
//! superclass, and an ordered list of [`Attribute`]s. Each attribute has a
//! kind (property, reference or child), an arity (unary or list) and a
//! [`ValueType`].
//!
//! Descriptors are declared as statics and never change after construction:
//!
//! ```
//! use modelkit::meta::{Attribute, Class, ValueType};
//! use once_cell::sync::Lazy;
//!
//! static FOLDER: Lazy<Class> = Lazy::new(|| {
//!     Class::builder("Folder")
//!         .attribute(Attribute::id("id"))
//!         .attribute(Attribute::property("title", ValueType::String))
//!         .attribute(Attribute::child("folders", || &*FOLDER).list())
//!         .build()
//! });
//!
//! assert_eq!(FOLDER.all_children().len(), 1);
//! ```

mod attribute;
mod class;
mod value;

pub use attribute::{Arity, Attribute, AttributeKind};
pub use class::{Class, ClassBuilder};
pub use value::{Literal, Value, ValueType};
