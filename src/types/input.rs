//! Conversation input sent to the completion service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::response::FunctionCallItem;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
}

/// Message content: plain text or structured parts passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallOutput {
    pub call_id: String,
    pub output: String,
}

/// One turn of conversation input.
///
/// Messages may arrive without a `type` tag; they always serialize with one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum InputItem {
    Message(InputMessage),
    FunctionCall(FunctionCallItem),
    FunctionCallOutput(FunctionCallOutput),
}

impl InputItem {
    pub fn message(role: Role, text: impl Into<String>) -> Self {
        Self::Message(InputMessage {
            role,
            content: MessageContent::Text(text.into()),
        })
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::message(Role::User, text)
    }

    pub fn developer(text: impl Into<String>) -> Self {
        Self::message(Role::Developer, text)
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput(FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        })
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Message(message) => Some(message.role),
            _ => None,
        }
    }
}

impl TryFrom<Value> for InputItem {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("message")
            .to_string();
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(serde::de::Error::custom(format!("expected object, got {other}"))),
        };
        map.remove("type");
        let inner = Value::Object(map);
        match kind.as_str() {
            "message" => serde_json::from_value(inner).map(Self::Message),
            "function_call" => serde_json::from_value(inner).map(Self::FunctionCall),
            "function_call_output" => serde_json::from_value(inner).map(Self::FunctionCallOutput),
            other => Err(serde::de::Error::custom(format!(
                "unsupported input item type `{other}`"
            ))),
        }
    }
}

impl From<InputItem> for Value {
    fn from(item: InputItem) -> Self {
        let (kind, inner) = match item {
            InputItem::Message(m) => ("message", serde_json::to_value(m)),
            InputItem::FunctionCall(c) => ("function_call", serde_json::to_value(c)),
            InputItem::FunctionCallOutput(o) => ("function_call_output", serde_json::to_value(o)),
        };
        match inner {
            Ok(Value::Object(mut map)) => {
                map.insert("type".into(), Value::String(kind.to_string()));
                Value::Object(map)
            }
            _ => Value::Null,
        }
    }
}
