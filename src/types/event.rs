//! Raw typed events emitted by a streaming completion call.

use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::error::{Result, SluiceError};

use super::response::{ContentPart, OutputItem, ResponseProjection};

/// Event kinds the reconstructor interprets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr,
)]
pub enum EventKind {
    #[strum(serialize = "response.created")]
    Created,
    #[strum(serialize = "response.in_progress")]
    InProgress,
    #[strum(serialize = "response.completed")]
    Completed,
    #[strum(serialize = "response.failed")]
    Failed,
    #[strum(serialize = "response.incomplete")]
    Incomplete,
    #[strum(serialize = "response.output_item.added")]
    OutputItemAdded,
    #[strum(serialize = "response.output_item.done")]
    OutputItemDone,
    #[strum(serialize = "response.content_part.added")]
    ContentPartAdded,
    #[strum(serialize = "response.content_part.done")]
    ContentPartDone,
    #[strum(serialize = "response.output_text.delta")]
    OutputTextDelta,
    #[strum(serialize = "response.output_text.annotation.added")]
    AnnotationAdded,
    #[strum(serialize = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta,
}

impl EventKind {
    /// Lifecycle events after which the service sends nothing more.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Incomplete)
    }
}

/// One event from the completion stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// The wire `type`, kept verbatim so unknown kinds can be forwarded.
    pub event_type: String,
    pub sequence_number: Option<u64>,
    pub data: StreamEventData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventData {
    Lifecycle {
        response: ResponseProjection,
    },
    OutputItem {
        output_index: usize,
        item: OutputItem,
    },
    ContentPart {
        output_index: usize,
        content_index: usize,
        part: ContentPart,
    },
    OutputTextDelta {
        output_index: usize,
        content_index: usize,
        delta: String,
    },
    AnnotationAdded {
        output_index: usize,
        content_index: usize,
        annotation_index: usize,
        annotation: Value,
    },
    FunctionCallArgumentsDelta {
        output_index: usize,
        item_id: Option<String>,
        delta: String,
    },
    /// Any kind the reconstructor does not interpret.
    Other(Value),
}

#[derive(Deserialize)]
struct LifecyclePayload {
    response: ResponseProjection,
}

#[derive(Deserialize)]
struct OutputItemPayload {
    output_index: usize,
    item: OutputItem,
}

#[derive(Deserialize)]
struct ContentPartPayload {
    output_index: usize,
    content_index: usize,
    part: ContentPart,
}

#[derive(Deserialize)]
struct TextDeltaPayload {
    output_index: usize,
    content_index: usize,
    delta: String,
}

#[derive(Deserialize)]
struct AnnotationPayload {
    output_index: usize,
    content_index: usize,
    #[serde(default)]
    annotation_index: usize,
    annotation: Value,
}

#[derive(Deserialize)]
struct ArgumentsDeltaPayload {
    output_index: usize,
    #[serde(default)]
    item_id: Option<String>,
    delta: String,
}

impl StreamEvent {
    /// Parse a decoded JSON event. Unknown kinds become [`StreamEventData::Other`];
    /// a known kind with a mismatched payload is an error.
    pub fn from_value(value: Value) -> Result<Self> {
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SluiceError::Stream("event without a type".into()))?
            .to_string();
        let sequence_number = value.get("sequence_number").and_then(Value::as_u64);

        let Ok(kind) = event_type.parse::<EventKind>() else {
            return Ok(Self {
                event_type,
                sequence_number,
                data: StreamEventData::Other(value),
            });
        };

        let data = match kind {
            EventKind::Created
            | EventKind::InProgress
            | EventKind::Completed
            | EventKind::Failed
            | EventKind::Incomplete => {
                let p: LifecyclePayload = serde_json::from_value(value)?;
                StreamEventData::Lifecycle {
                    response: p.response,
                }
            }
            EventKind::OutputItemAdded | EventKind::OutputItemDone => {
                let p: OutputItemPayload = serde_json::from_value(value)?;
                StreamEventData::OutputItem {
                    output_index: p.output_index,
                    item: p.item,
                }
            }
            EventKind::ContentPartAdded | EventKind::ContentPartDone => {
                let p: ContentPartPayload = serde_json::from_value(value)?;
                StreamEventData::ContentPart {
                    output_index: p.output_index,
                    content_index: p.content_index,
                    part: p.part,
                }
            }
            EventKind::OutputTextDelta => {
                let p: TextDeltaPayload = serde_json::from_value(value)?;
                StreamEventData::OutputTextDelta {
                    output_index: p.output_index,
                    content_index: p.content_index,
                    delta: p.delta,
                }
            }
            EventKind::AnnotationAdded => {
                let p: AnnotationPayload = serde_json::from_value(value)?;
                StreamEventData::AnnotationAdded {
                    output_index: p.output_index,
                    content_index: p.content_index,
                    annotation_index: p.annotation_index,
                    annotation: p.annotation,
                }
            }
            EventKind::FunctionCallArgumentsDelta => {
                let p: ArgumentsDeltaPayload = serde_json::from_value(value)?;
                StreamEventData::FunctionCallArgumentsDelta {
                    output_index: p.output_index,
                    item_id: p.item_id,
                    delta: p.delta,
                }
            }
        };

        Ok(Self {
            event_type,
            sequence_number,
            data,
        })
    }

    /// The interpreted kind, if any.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.parse().ok()
    }
}
