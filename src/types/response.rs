//! Response projection: the evolving view of one completion call.
//!
//! Output items and content parts are stored as dense `Vec<Option<_>>`
//! arenas. A `None` slot is a placeholder for an index the stream has not
//! filled yet and serializes as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported by the service for a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Incomplete,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Snapshot of everything known about one completion call.
///
/// `kind` and `sequence_number` come from the lifecycle event that last
/// replaced the projection; patches leave them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    /// Required when reading stored records, so an unrelated object is not
    /// taken for an empty snapshot.
    pub response: ResponseProjection,
}

/// The `response` object of the Responses API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseProjection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub output: Vec<Option<OutputItem>>,
    /// Fields the orchestrator does not interpret (model, usage, error, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseProjection {
    /// Ensure `output` has a slot at `index`, padding with placeholders.
    pub fn ensure_output_slot(&mut self, index: usize) -> &mut Option<OutputItem> {
        pad_to(&mut self.output, index);
        &mut self.output[index]
    }

    /// Completed `function_call` items, in output order.
    pub fn function_calls(&self) -> Vec<&FunctionCallItem> {
        self.output
            .iter()
            .filter_map(|slot| match slot {
                Some(OutputItem::FunctionCall(call)) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Concatenated `output_text` of all message items.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .flatten()
            .filter_map(|item| match item {
                OutputItem::Message(message) => Some(message.text()),
                _ => None,
            })
            .collect()
    }
}

impl ResponseSnapshot {
    /// Trimmed view used for logging and client summaries.
    pub fn sanitized(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.kind.clone()));
        out.insert(
            "status".into(),
            serde_json::to_value(self.response.status).unwrap_or_default(),
        );
        out.insert(
            "created_at".into(),
            self.response.created_at.map(Value::from).unwrap_or_default(),
        );
        out.insert(
            "output".into(),
            serde_json::to_value(&self.response.output).unwrap_or_default(),
        );
        match self.response.status {
            Some(ResponseStatus::Failed) => {
                out.insert("error".into(), self.extra_or_empty("error"));
            }
            Some(ResponseStatus::Incomplete) => {
                out.insert("incomplete".into(), self.extra_or_empty("incomplete_details"));
            }
            _ => {}
        }
        Value::Object(out)
    }

    fn extra_or_empty(&self, key: &str) -> Value {
        match self.response.extra.get(key) {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(value) => value.clone(),
        }
    }
}

/// One top-level element of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum OutputItem {
    Message(MessageItem),
    FunctionCall(FunctionCallItem),
    /// Item kinds the orchestrator passes through untouched.
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<Option<ContentPart>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageItem {
    /// Ensure `content` has a slot at `index`, padding with placeholders.
    pub fn ensure_content_slot(&mut self, index: usize) -> &mut Option<ContentPart> {
        pad_to(&mut self.content, index);
        &mut self.content[index]
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .flatten()
            .filter_map(|part| match part {
                ContentPart::OutputText(text) => Some(text.text.as_str()),
                ContentPart::Other(_) => None,
            })
            .collect()
    }
}

/// A model request to run a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One sub-element of a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ContentPart {
    OutputText(TextPart),
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<Option<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextPart {
    /// Record an annotation at `index`, padding with placeholders.
    pub fn set_annotation(&mut self, index: usize, annotation: Value) {
        pad_to(&mut self.annotations, index);
        self.annotations[index] = Some(annotation);
    }
}

pub(crate) fn pad_to<T>(slots: &mut Vec<Option<T>>, index: usize) {
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
}

/// Parse `value` into `T` after removing its `type` tag; `None` on mismatch.
fn untag<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
    let mut map = value.as_object()?.clone();
    map.remove("type");
    serde_json::from_value(Value::Object(map)).ok()
}

/// Serialize `inner` and stamp it with a `type` tag.
fn tag<T: Serialize>(kind: &str, inner: &T) -> Value {
    match serde_json::to_value(inner) {
        Ok(Value::Object(mut map)) => {
            map.insert("type".into(), Value::String(kind.to_string()));
            Value::Object(map)
        }
        Ok(other) => other,
        Err(_) => Value::Null,
    }
}

fn type_of(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

impl From<Value> for OutputItem {
    fn from(value: Value) -> Self {
        let parsed = match type_of(&value) {
            Some("message") => untag(&value).map(Self::Message),
            Some("function_call") => untag(&value).map(Self::FunctionCall),
            _ => None,
        };
        parsed.unwrap_or(Self::Other(value))
    }
}

impl From<OutputItem> for Value {
    fn from(item: OutputItem) -> Self {
        match item {
            OutputItem::Message(message) => tag("message", &message),
            OutputItem::FunctionCall(call) => tag("function_call", &call),
            OutputItem::Other(value) => value,
        }
    }
}

impl From<Value> for ContentPart {
    fn from(value: Value) -> Self {
        match type_of(&value) {
            Some("output_text") => untag(&value)
                .map(Self::OutputText)
                .unwrap_or(Self::Other(value)),
            _ => Self::Other(value),
        }
    }
}

impl From<ContentPart> for Value {
    fn from(part: ContentPart) -> Self {
        match part {
            ContentPart::OutputText(text) => tag("output_text", &text),
            ContentPart::Other(value) => value,
        }
    }
}
