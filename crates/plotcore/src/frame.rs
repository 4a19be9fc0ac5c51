//! Labeled data frames delivered by sources.
//!
//! A frame is a JSON object mapping field names to numbers or to nested
//! objects. The reserved `"$(time)"` field carries the ingestion clock.

use serde_json::{Map, Value};

/// Pseudo-field holding the time a frame was ingested, in seconds.
pub const TIME_FIELD: &str = "$(time)";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has no field '{0}'")]
    MissingField(String),
    #[error("frame field '{0}' is not a number")]
    NotANumber(String),
    #[error("frame payload must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    fields: Map<String, Value>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a decoded JSON payload; anything but an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(FrameError::NotAnObject),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Top-level numeric field.
    pub fn number(&self, field: &str) -> Result<f64, FrameError> {
        let value = self
            .fields
            .get(field)
            .ok_or_else(|| FrameError::MissingField(field.to_string()))?;
        value
            .as_f64()
            .ok_or_else(|| FrameError::NotANumber(field.to_string()))
    }

    /// Numeric `field` inside the nested object stored under `source`.
    pub fn nested_number(&self, source: &str, field: &str) -> Result<f64, FrameError> {
        let path = || format!("{source}.{field}");
        let nested = self
            .fields
            .get(source)
            .ok_or_else(|| FrameError::MissingField(source.to_string()))?;
        let value = nested
            .get(field)
            .ok_or_else(|| FrameError::MissingField(path()))?;
        value.as_f64().ok_or_else(|| FrameError::NotANumber(path()))
    }

    pub fn set_time(&mut self, seconds: f64) {
        self.fields.insert(TIME_FIELD.to_string(), Value::from(seconds));
    }

    /// Stores the latest frame received from `source`.
    pub fn insert_source(&mut self, source: &str, frame: Value) {
        self.fields.insert(source.to_string(), frame);
    }
}

impl TryFrom<Value> for DataFrame {
    type Error = FrameError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
