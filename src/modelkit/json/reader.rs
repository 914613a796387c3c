use serde_json::Value as Json;

use crate::codec::CodecRegistry;
use crate::deserializer::Deserializer;
use crate::error::{ModelError, Result};
use crate::meta::{Attribute, AttributeKind, Class, Value, ValueType};
use crate::object::Object;

enum Step<'a> {
    Enter(&'static Class, &'a Json),
    Attribute(&'a str, &'a Json),
    EndAttribute,
    Exit,
}

fn mismatch(attribute: &Attribute, json: &Json) -> ModelError {
    let found = match json {
        Json::Null => "null",
        Json::Bool(_) => "JSON boolean",
        Json::Number(_) => "JSON number",
        Json::String(_) => "JSON string",
        Json::Array(_) => "JSON array",
        Json::Object(_) => "JSON object",
    };
    ModelError::TypeMismatch {
        attribute: attribute.to_string(),
        expected: attribute.value_type().to_string(),
        found: found.to_string(),
    }
}

fn elements<'a>(attribute: &Attribute, json: &'a Json) -> Result<&'a [Json]> {
    match json {
        Json::Array(items) => Ok(items),
        Json::Null => Ok(&[]),
        other => Err(mismatch(attribute, other)),
    }
}

fn decode(codecs: &CodecRegistry, attribute: &Attribute, json: &Json) -> Result<Value> {
    let value_type = attribute.value_type();
    let value = match (value_type, json) {
        (_, Json::Null) => Value::Null,
        (ValueType::Bool, Json::Bool(b)) => Value::Bool(*b),
        (ValueType::Int, Json::Number(n)) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::Int)
            .ok_or_else(|| mismatch(attribute, json))?,
        (ValueType::Long, Json::Number(n)) => {
            n.as_i64().map(Value::Long).ok_or_else(|| mismatch(attribute, json))?
        }
        (ValueType::Double, Json::Number(n)) => {
            n.as_f64().map(Value::Double).ok_or_else(|| mismatch(attribute, json))?
        }
        (ValueType::String, Json::String(s)) => Value::String(s.clone()),
        (ValueType::Enum(_), Json::String(s)) => Value::Enum(s.clone()),
        (ValueType::Object(_), other) => return Err(mismatch(attribute, other)),
        (
            ValueType::Date | ValueType::DateTime | ValueType::OffsetDateTime,
            Json::String(s),
        ) => codecs.decode(&value_type, s)?,
        (_, other) => return Err(mismatch(attribute, other)),
    };
    Ok(value)
}

fn reference_path<'a>(attribute: &Attribute, json: &'a Json) -> Result<&'a str> {
    json.as_str().ok_or_else(|| mismatch(attribute, json))
}

/// Drives `de` over a parsed document. Children are read as instances of the
/// class their attribute declares.
pub(crate) fn read(
    json: &Json,
    class: &'static Class,
    de: &mut Deserializer<'_>,
    codecs: &CodecRegistry,
) -> Result<Object> {
    let mut steps = vec![Step::Enter(class, json)];
    let mut root = None;

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(class, json) => {
                let fields = json.as_object().ok_or_else(|| {
                    ModelError::Protocol(format!("expected a JSON object for {}", class.name()))
                })?;
                de.start_object(class)?;
                steps.push(Step::Exit);
                for (key, value) in fields.iter().rev() {
                    steps.push(Step::Attribute(key, value));
                }
            }
            Step::Exit => {
                let object = de.end_object()?;
                if de.depth() == 0 {
                    root = Some(object);
                }
            }
            Step::EndAttribute => de.end_attribute()?,
            Step::Attribute(key, value) => {
                let attribute = de.start_attribute(key)?;
                match attribute.kind() {
                    AttributeKind::Property if attribute.is_list() => {
                        for item in elements(attribute, value)? {
                            de.add_simple_value(decode(codecs, attribute, item)?)?;
                        }
                        de.end_attribute()?;
                    }
                    AttributeKind::Property => {
                        de.add_simple_value(decode(codecs, attribute, value)?)?;
                        de.end_attribute()?;
                    }
                    AttributeKind::Reference if attribute.is_list() => {
                        for item in elements(attribute, value)? {
                            de.add_reference_value(reference_path(attribute, item)?)?;
                        }
                        de.end_attribute()?;
                    }
                    AttributeKind::Reference => {
                        if !value.is_null() {
                            de.add_reference_value(reference_path(attribute, value)?)?;
                        }
                        de.end_attribute()?;
                    }
                    AttributeKind::Child => {
                        let child_class = attribute
                            .value_type()
                            .class()
                            .ok_or_else(|| mismatch(attribute, value))?;
                        steps.push(Step::EndAttribute);
                        if attribute.is_list() {
                            for item in elements(attribute, value)?.iter().rev() {
                                steps.push(Step::Enter(child_class, item));
                            }
                        } else if !value.is_null() {
                            steps.push(Step::Enter(child_class, value));
                        }
                    }
                }
            }
        }
    }

    root.ok_or_else(|| ModelError::Protocol("document contained no root object".into()))
}
