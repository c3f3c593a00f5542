//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::SluiceError;

/// Parsed arguments of one function call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse the raw `arguments` string of a function call. An empty string
    /// means "no arguments".
    pub fn parse(raw: &str) -> Result<Self, SluiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(Value::Object(Default::default())));
        }
        let value = serde_json::from_str::<Value>(trimmed)
            .map_err(|e| SluiceError::InvalidArgument(format!("arguments are not valid JSON: {e}")))?;
        Ok(Self::new(value))
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, SluiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SluiceError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, SluiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| SluiceError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, SluiceError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            SluiceError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
