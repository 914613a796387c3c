//! Text codecs for values that formats cannot represent natively.
//!
//! Codecs are matched by the exact declared [`ValueType`] of an attribute.
//! A [`CodecRegistry`] searches custom codecs first, in registration order,
//! then the built-in date/time codecs.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{ModelError, Result};
use crate::meta::{Value, ValueType};

pub trait ValueCodec {
    fn value_type(&self) -> ValueType;
    fn encode(&self, value: &Value) -> Result<String>;
    fn decode(&self, text: &str) -> Result<Value>;
}

fn codec_error(value_type: ValueType, message: impl ToString) -> ModelError {
    ModelError::Codec {
        value_type: value_type.to_string(),
        message: message.to_string(),
    }
}

/// `2024-02-29`
pub struct DateCodec;

impl ValueCodec for DateCodec {
    fn value_type(&self) -> ValueType {
        ValueType::Date
    }

    fn encode(&self, value: &Value) -> Result<String> {
        match value {
            Value::Date(date) => Ok(date.format("%Y-%m-%d").to_string()),
            other => Err(codec_error(ValueType::Date, format!("can't encode {}", other.type_name()))),
        }
    }

    fn decode(&self, text: &str) -> Result<Value> {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| codec_error(ValueType::Date, format!("'{}': {}", text, e)))
    }
}

/// `2024-02-29T13:45:00`, with fractional seconds when present.
pub struct DateTimeCodec;

impl ValueCodec for DateTimeCodec {
    fn value_type(&self) -> ValueType {
        ValueType::DateTime
    }

    fn encode(&self, value: &Value) -> Result<String> {
        match value {
            Value::DateTime(dt) => Ok(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            other => Err(codec_error(
                ValueType::DateTime,
                format!("can't encode {}", other.type_name()),
            )),
        }
    }

    fn decode(&self, text: &str) -> Result<Value> {
        text.parse::<NaiveDateTime>()
            .map(Value::DateTime)
            .map_err(|e| codec_error(ValueType::DateTime, format!("'{}': {}", text, e)))
    }
}

/// RFC 3339, e.g. `2024-02-29T13:45:00+01:00`.
pub struct OffsetDateTimeCodec;

impl ValueCodec for OffsetDateTimeCodec {
    fn value_type(&self) -> ValueType {
        ValueType::OffsetDateTime
    }

    fn encode(&self, value: &Value) -> Result<String> {
        match value {
            Value::OffsetDateTime(dt) => Ok(dt.to_rfc3339()),
            other => Err(codec_error(
                ValueType::OffsetDateTime,
                format!("can't encode {}", other.type_name()),
            )),
        }
    }

    fn decode(&self, text: &str) -> Result<Value> {
        DateTime::parse_from_rfc3339(text)
            .map(Value::OffsetDateTime)
            .map_err(|e| codec_error(ValueType::OffsetDateTime, format!("'{}': {}", text, e)))
    }
}

pub struct CodecRegistry {
    custom: Vec<Box<dyn ValueCodec>>,
    builtin: Vec<Box<dyn ValueCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let builtin: Vec<Box<dyn ValueCodec>> = vec![
            Box::new(DateCodec) as Box<dyn ValueCodec>,
            Box::new(DateTimeCodec),
            Box::new(OffsetDateTimeCodec),
        ];
        Self {
            custom: Vec::new(),
            builtin,
        }
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec that takes precedence over the built-ins.
    pub fn register(&mut self, codec: Box<dyn ValueCodec>) {
        self.custom.push(codec);
    }

    pub fn with(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.register(Box::new(codec));
        self
    }

    pub fn find(&self, value_type: &ValueType) -> Option<&dyn ValueCodec> {
        self.custom
            .iter()
            .chain(self.builtin.iter())
            .find(|codec| codec.value_type() == *value_type)
            .map(|codec| &**codec)
    }

    pub fn encode(&self, value_type: &ValueType, value: &Value) -> Result<String> {
        self.find(value_type)
            .ok_or_else(|| codec_error(*value_type, "no codec registered"))?
            .encode(value)
    }

    pub fn decode(&self, value_type: &ValueType, text: &str) -> Result<Value> {
        self.find(value_type)
            .ok_or_else(|| codec_error(*value_type, "no codec registered"))?
            .decode(text)
    }
}
