//! Events produced by one agent turn.

use serde_json::{json, Value};

use crate::error::Result;
use crate::tools::ToolOutcome;
use crate::types::ResponseSnapshot;

use super::types::{TurnRecord, TurnStatus};

/// Emitted by the chat turn before the loop starts.
pub const PROCESS_STARTED: &str = "internal.process.started";
pub const TOOL_EXECUTION_STARTED: &str = "internal.process.tool_execution_started";
pub const TOOL_EXECUTION_COMPLETED: &str = "internal.process.tool_execution_completed";
pub const PROCESS_COMPLETED: &str = "internal.process.completed";

/// One item of the agent event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A reconstructed snapshot, re-yielded unchanged under the upstream
    /// event type.
    Response {
        event_type: String,
        snapshot: ResponseSnapshot,
    },
    ToolExecutionStarted {
        tool_name: String,
        call_id: String,
    },
    ToolExecutionCompleted {
        tool_name: String,
        call_id: String,
        arguments: Value,
        result: ToolOutcome,
    },
    /// Always the last event of a turn that did not fail.
    Completed {
        responses: Vec<TurnRecord>,
        status: TurnStatus,
    },
}

impl AgentEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Response { event_type, .. } => event_type,
            Self::ToolExecutionStarted { .. } => TOOL_EXECUTION_STARTED,
            Self::ToolExecutionCompleted { .. } => TOOL_EXECUTION_COMPLETED,
            Self::Completed { .. } => PROCESS_COMPLETED,
        }
    }

    /// JSON payload sent to clients for this event.
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            Self::Response { snapshot, .. } => serde_json::to_value(snapshot)?,
            Self::ToolExecutionStarted { tool_name, .. } => json!({
                "tool_name": tool_name,
                "result": {},
                "type": TOOL_EXECUTION_STARTED,
            }),
            Self::ToolExecutionCompleted {
                tool_name,
                arguments,
                result,
                ..
            } => json!({
                "tool_name": tool_name,
                "arguments": arguments,
                "result": serde_json::to_value(result)?,
                "type": TOOL_EXECUTION_COMPLETED,
            }),
            Self::Completed { responses, status } => json!({
                "responses": serde_json::to_value(responses)?,
                "status": status,
                "type": PROCESS_COMPLETED,
            }),
        };
        Ok(value)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Payload of the [`PROCESS_STARTED`] event.
pub fn process_started_payload() -> Value {
    json!({"internal_status": "started", "type": PROCESS_STARTED})
}
