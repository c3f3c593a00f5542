//! Rebuilding conversation input from persisted chat history.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent_loop::TurnRecord;
use crate::types::{ContentPart, InputItem, OutputItem, Role};

/// Shown to the model when the user has no warehouse to query.
pub const NO_WAREHOUSE_WARNING: &str = "Warning: The user does not have any warehouse created. \
They should create a new warehouse to analyse data";

/// One persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sender", rename_all = "lowercase")]
pub enum StoredMessage {
    /// The input the user submitted.
    User {
        #[serde(default)]
        input: Vec<InputItem>,
    },
    /// Accumulated responses of one completed turn.
    Assistant {
        #[serde(default)]
        responses: Vec<TurnRecord>,
    },
}

/// Conversation input for the next turn, in history order.
///
/// Developer turns from stored user input are dropped; the preamble is
/// rebuilt for every turn instead. Assistant transcripts expand to their
/// text messages and function calls, followed by the recorded tool outputs.
pub fn conversation_input(history: &[StoredMessage]) -> Vec<InputItem> {
    let mut input = Vec::new();
    for message in history {
        match message {
            StoredMessage::User { input: items } => input.extend(
                items
                    .iter()
                    .filter(|item| item.role() != Some(Role::Developer))
                    .cloned(),
            ),
            StoredMessage::Assistant { responses } => {
                for record in responses {
                    expand_record(record, &mut input);
                }
            }
        }
    }
    input
}

fn expand_record(record: &TurnRecord, input: &mut Vec<InputItem>) {
    match record {
        TurnRecord::Response(snapshot) => {
            for item in snapshot.response.output.iter().flatten() {
                match item {
                    OutputItem::Message(message) => {
                        let role = message
                            .role
                            .as_deref()
                            .and_then(|r| r.parse().ok())
                            .unwrap_or(Role::Assistant);
                        for part in message.content.iter().flatten() {
                            if let ContentPart::OutputText(text) = part {
                                input.push(InputItem::message(role, text.text.clone()));
                            }
                        }
                    }
                    OutputItem::FunctionCall(call) => {
                        input.push(InputItem::FunctionCall(call.clone()));
                    }
                    OutputItem::Other(_) => {}
                }
            }
        }
        TurnRecord::ToolResult(result) => input.push(InputItem::function_call_output(
            result.call_id.clone(),
            result.output.to_output_string(),
        )),
    }
}

/// Developer note describing the user's warehouse, or warning that none exists.
pub fn warehouse_preamble(schema: Option<&Value>) -> InputItem {
    match schema {
        Some(schema) => InputItem::developer(format!("Warehouse Schema: {schema}")),
        None => InputItem::developer(NO_WAREHOUSE_WARNING),
    }
}

/// Prepend the warehouse preamble to `input`.
pub fn with_preamble(mut input: Vec<InputItem>, schema: Option<&Value>) -> Vec<InputItem> {
    input.insert(0, warehouse_preamble(schema));
    input
}
