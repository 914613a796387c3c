//! JSON encoding of model trees.
//!
//! Built entirely on the generic [`serialize`](crate::serialize) driver and
//! the [`Deserializer`](crate::deserializer::Deserializer):
//!
//! - an object is a JSON object keyed by attribute name,
//! - a unary child is a nested object (or `null`), a child list an array,
//! - a reference is its path string, a reference list an array of paths,
//! - enums are variant names, dates go through the value codecs.
//!
//! ```json
//! {
//!   "id": "root",
//!   "name": "Foo",
//!   "single_ref": "<id:root>.children[0]",
//!   "children": [ { "name": "first" } ]
//! }
//! ```
//!
//! Nested objects are read back as instances of the class their attribute
//! declares.

mod reader;
mod writer;

use std::io::{Read, Write};

use serde_json::Value as Json;

use crate::codec::{CodecRegistry, ValueCodec};
use crate::config::ModelkitConfig;
use crate::deserializer::Deserializer;
use crate::error::Result;
use crate::meta::Class;
use crate::object::Object;
use crate::path::ReferenceResolver;
use crate::serializer::{serialize, SerializeOptions};

use writer::JsonWriter;

/// JSON encoder/decoder with its settings and value codecs.
#[derive(Default)]
pub struct JsonFormat {
    config: ModelkitConfig,
    codecs: CodecRegistry,
}

impl JsonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ModelkitConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a codec that takes precedence over the built-in ones.
    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codecs.register(Box::new(codec));
        self
    }

    pub fn config(&self) -> &ModelkitConfig {
        &self.config
    }

    pub fn to_value(&self, root: &Object) -> Result<Json> {
        let mut writer = JsonWriter::new(&self.codecs);
        let options = SerializeOptions {
            ignore_default_values: self.config.ignore_default_values,
        };
        serialize(root, &mut writer, &options)?;
        writer.into_json()
    }

    pub fn to_string(&self, root: &Object) -> Result<String> {
        let json = self.to_value(root)?;
        Ok(if self.config.pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        })
    }

    pub fn write(&self, root: &Object, writer: impl Write) -> Result<()> {
        let json = self.to_value(root)?;
        if self.config.pretty {
            serde_json::to_writer_pretty(writer, &json)?;
        } else {
            serde_json::to_writer(writer, &json)?;
        }
        Ok(())
    }

    /// Reads a tree whose root is an instance of `class`. References that
    /// point outside the document are looked up in `resolver`.
    pub fn from_value(
        &self,
        class: &'static Class,
        json: &Json,
        resolver: Option<&dyn ReferenceResolver>,
    ) -> Result<Object> {
        let mut de = Deserializer::new().strict_references(self.config.strict_references);
        if let Some(resolver) = resolver {
            de = de.with_resolver(resolver);
        }
        reader::read(json, class, &mut de, &self.codecs)
    }

    pub fn from_str(
        &self,
        class: &'static Class,
        text: &str,
        resolver: Option<&dyn ReferenceResolver>,
    ) -> Result<Object> {
        let json: Json = serde_json::from_str(text)?;
        self.from_value(class, &json, resolver)
    }

    pub fn read(
        &self,
        class: &'static Class,
        reader: impl Read,
        resolver: Option<&dyn ReferenceResolver>,
    ) -> Result<Object> {
        let json: Json = serde_json::from_reader(reader)?;
        self.from_value(class, &json, resolver)
    }
}

/// Encodes `root` with the default settings.
pub fn to_string(root: &Object) -> Result<String> {
    JsonFormat::new().to_string(root)
}

/// Decodes a document with the default settings and no external resolver.
pub fn from_str(class: &'static Class, text: &str) -> Result<Object> {
    JsonFormat::new().from_str(class, text, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::path::Resolver;
    use crate::test_utils::{TestNode, TestRoot, TEST_ROOT};
    use crate::tree::deep_equals;
    use crate::ModelType;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use serde_json::json;

    fn populated() -> TestRoot {
        let root = TestRoot::create();
        root.set_id(Some("test")).unwrap();
        root.set_name("Foo").unwrap();
        root.set_flag(false).unwrap();
        root.set_count(42).unwrap();
        root.set_big(4200).unwrap();
        root.set_ratio(42.5).unwrap();
        root.set_color("Blue").unwrap();
        root.set_day(NaiveDate::from_ymd_opt(1970, 1, 2)).unwrap();
        root.set_moment(Some(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(1970, 1, 4, 12, 0, 0)
                .unwrap(),
        ))
        .unwrap();
        root.labels().extend(["Bar42", "Bar1337"]).unwrap();
        root.numbers().extend([4242, 1337]).unwrap();

        let child = TestNode::create();
        root.set_child(Some(&child)).unwrap();
        let first = TestNode::create();
        first.set_name("Child One").unwrap();
        let inner = TestNode::create();
        inner.set_name("Inner child").unwrap();
        first.children().push(inner.object()).unwrap();
        root.children().push(first.object()).unwrap();
        root.set_single_ref(Some(&child)).unwrap();
        root.multi_ref().push(inner.object()).unwrap();
        root
    }

    #[test]
    fn test_round_trip_deep_equals() {
        let root = populated();
        let text = to_string(root.object()).unwrap();
        let back = from_str(&TEST_ROOT, &text).unwrap();
        assert!(deep_equals(root.object(), &back), "{}", text);
    }

    #[test]
    fn test_round_trip_with_all_values() {
        let root = populated();
        let format = JsonFormat::new().with_config(ModelkitConfig {
            ignore_default_values: false,
            ..ModelkitConfig::default()
        });
        let text = format.to_string(root.object()).unwrap();
        let back = format.from_str(&TEST_ROOT, &text, None).unwrap();
        assert!(deep_equals(root.object(), &back));
    }

    #[test]
    fn test_document_shape() {
        let root = TestRoot::create();
        root.set_id(Some("r")).unwrap();
        let node = TestNode::create();
        node.set_name("n").unwrap();
        root.children().push(node.object()).unwrap();
        root.set_single_ref(Some(&node)).unwrap();

        let json = JsonFormat::new().to_value(root.object()).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "r",
                "single_ref": "<id:r>.children[0]",
                "children": [ { "name": "n" } ]
            })
        );
    }

    #[test]
    fn test_dates_use_codecs() {
        let root = TestRoot::create();
        root.set_day(NaiveDate::from_ymd_opt(2024, 2, 29)).unwrap();
        let json = JsonFormat::new().to_value(root.object()).unwrap();
        assert_eq!(json["day"], json!("2024-02-29"));
    }

    #[test]
    fn test_forward_references_in_document() {
        let text = r#"{
            "id": "r",
            "multi_ref": ["<id:r>.children[1]", "<id:r>.children[0]"],
            "children": [ { "name": "a" }, { "name": "b" } ]
        }"#;
        let root = TestRoot::cast(&from_str(&TEST_ROOT, text).unwrap()).unwrap();
        let names: Vec<String> = root
            .multi_ref()
            .objects()
            .iter()
            .map(|o| TestNode::cast(o).unwrap().name())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_external_references() {
        let other = TestRoot::create();
        other.set_id(Some("other")).unwrap();
        let target = TestNode::create();
        other.children().push(target.object()).unwrap();
        let resolver = Resolver::new([other.object()]).unwrap();

        let text = r#"{ "multi_ref": ["<id:other>.children[0]"] }"#;
        let root = JsonFormat::new()
            .from_str(&TEST_ROOT, text, Some(&resolver))
            .unwrap();
        let root = TestRoot::cast(&root).unwrap();
        assert_eq!(root.multi_ref().objects(), vec![target.object().clone()]);
    }

    #[test]
    fn test_reference_outside_tree_needs_id() {
        let root = TestRoot::create();
        root.set_single_ref(Some(&TestNode::create())).unwrap();
        let err = to_string(root.object()).unwrap_err();
        assert!(matches!(err, ModelError::Serialization { .. }));
    }

    #[test]
    fn test_bad_documents() {
        assert!(matches!(from_str(&TEST_ROOT, "{"), Err(ModelError::Json(_))));
        assert!(matches!(from_str(&TEST_ROOT, "[]"), Err(ModelError::Protocol(_))));
        assert!(matches!(
            from_str(&TEST_ROOT, r#"{ "count": "x" }"#),
            Err(ModelError::TypeMismatch { .. })
        ));
        assert!(matches!(
            from_str(&TEST_ROOT, r#"{ "nope": 1 }"#),
            Err(ModelError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            from_str(&TEST_ROOT, r#"{ "color": "Purple" }"#),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_write_and_read_streams() {
        let root = populated();
        let mut buffer = Vec::new();
        JsonFormat::new().write(root.object(), &mut buffer).unwrap();
        let back = JsonFormat::new()
            .read(&TEST_ROOT, buffer.as_slice(), None)
            .unwrap();
        assert!(deep_equals(root.object(), &back));
    }
}
