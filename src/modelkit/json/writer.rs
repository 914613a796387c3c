use serde_json::{Map, Number, Value as Json};

use crate::codec::CodecRegistry;
use crate::error::{ModelError, Result};
use crate::meta::{Attribute, Value, ValueType};
use crate::object::Object;
use crate::serializer::Serializer;

enum Open {
    Object {
        fields: Map<String, Json>,
        /// Unary child attribute waiting for its value.
        pending: Option<&'static str>,
    },
    Array {
        key: &'static str,
        items: Vec<Json>,
    },
}

/// Builds a `serde_json::Value` tree from serializer callbacks.
pub(crate) struct JsonWriter<'c> {
    codecs: &'c CodecRegistry,
    open: Vec<Open>,
    result: Option<Json>,
}

impl<'c> JsonWriter<'c> {
    pub(crate) fn new(codecs: &'c CodecRegistry) -> Self {
        Self {
            codecs,
            open: Vec::new(),
            result: None,
        }
    }

    pub(crate) fn into_json(self) -> Result<Json> {
        self.result
            .ok_or_else(|| ModelError::Protocol("serialization produced no root object".into()))
    }

    fn fields(&mut self) -> Result<&mut Map<String, Json>> {
        match self.open.last_mut() {
            Some(Open::Object { fields, .. }) => Ok(fields),
            _ => Err(ModelError::Protocol("no open JSON object".into())),
        }
    }

    fn encode(&self, attribute: &Attribute, value: &Value) -> Result<Json> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Long(l) => Json::from(*l),
            Value::Double(d) => Number::from_f64(*d).map(Json::Number).ok_or_else(|| {
                ModelError::Codec {
                    value_type: ValueType::Double.to_string(),
                    message: format!("{} has no JSON representation", d),
                }
            })?,
            Value::String(s) | Value::Enum(s) => Json::String(s.clone()),
            Value::Object(_) => {
                return Err(ModelError::Protocol(format!(
                    "{} holds an object where a value was expected",
                    attribute
                )))
            }
            other => Json::String(self.codecs.encode(&attribute.value_type(), other)?),
        })
    }

    fn attach(&mut self, value: Json) -> Result<()> {
        match self.open.last_mut() {
            None => self.result = Some(value),
            Some(Open::Array { items, .. }) => items.push(value),
            Some(Open::Object { fields, pending }) => {
                let key = pending.take().ok_or_else(|| {
                    ModelError::Protocol("nested object without a child attribute".into())
                })?;
                fields.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

impl Serializer for JsonWriter<'_> {
    fn start_object(&mut self, _object: &Object, _parents: &[Object]) -> Result<()> {
        self.open.push(Open::Object {
            fields: Map::new(),
            pending: None,
        });
        Ok(())
    }

    fn end_object(&mut self, _object: &Object, _parents: &[Object]) -> Result<()> {
        match self.open.pop() {
            Some(Open::Object { fields, .. }) => self.attach(Json::Object(fields)),
            _ => Err(ModelError::Protocol("end_object without open JSON object".into())),
        }
    }

    fn on_simple_property(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        value: &Value,
        _parents: &[Object],
    ) -> Result<()> {
        let json = self.encode(attribute, value)?;
        self.fields()?.insert(attribute.name().to_string(), json);
        Ok(())
    }

    fn on_simple_list_property(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        values: &[Value],
        _parents: &[Object],
    ) -> Result<()> {
        let items = values
            .iter()
            .map(|v| self.encode(attribute, v))
            .collect::<Result<Vec<_>>>()?;
        self.fields()?
            .insert(attribute.name().to_string(), Json::Array(items));
        Ok(())
    }

    fn on_reference_property(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        target: Option<&Object>,
        _parents: &[Object],
    ) -> Result<()> {
        let json = match target {
            Some(target) => Json::String(target.path()?),
            None => Json::Null,
        };
        self.fields()?.insert(attribute.name().to_string(), json);
        Ok(())
    }

    fn on_reference_list_property(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        targets: &[Object],
        _parents: &[Object],
    ) -> Result<()> {
        let paths = targets
            .iter()
            .map(|t| t.path().map(Json::String))
            .collect::<Result<Vec<_>>>()?;
        self.fields()?
            .insert(attribute.name().to_string(), Json::Array(paths));
        Ok(())
    }

    fn start_child_attribute(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        _parents: &[Object],
    ) -> Result<()> {
        if attribute.is_list() {
            self.open.push(Open::Array {
                key: attribute.name(),
                items: Vec::new(),
            });
        } else if let Some(Open::Object { pending, .. }) = self.open.last_mut() {
            *pending = Some(attribute.name());
        }
        Ok(())
    }

    fn end_child_attribute(
        &mut self,
        _object: &Object,
        attribute: &'static Attribute,
        _parents: &[Object],
    ) -> Result<()> {
        if attribute.is_list() {
            match self.open.pop() {
                Some(Open::Array { key, items }) => {
                    self.fields()?.insert(key.to_string(), Json::Array(items));
                }
                _ => return Err(ModelError::Protocol("unbalanced child list".into())),
            }
        } else if let Some(Open::Object { fields, pending }) = self.open.last_mut() {
            // unary child that stayed empty
            if let Some(key) = pending.take() {
                fields.insert(key.to_string(), Json::Null);
            }
        }
        Ok(())
    }
}
