//! Core turn types for the agent loop.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::tools::ToolOutcome;
use crate::types::ResponseSnapshot;

/// Unique identifier of one user turn.
pub type TurnId = Uuid;

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Running,
    Completed,
}

/// Progress through the iteration budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationState {
    /// Completion calls started so far.
    pub iteration: u32,
    pub keep_running: bool,
}

impl IterationState {
    pub fn new() -> Self {
        Self {
            iteration: 0,
            keep_running: true,
        }
    }

    pub fn state(&self) -> LoopState {
        if self.keep_running {
            LoopState::Running
        } else {
            LoopState::Completed
        }
    }
}

impl Default for IterationState {
    fn default() -> Self {
        Self::new()
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    /// The model answered without requesting tools.
    Completed,
    /// The iteration cap was reached while the model still wanted tools.
    MaxIterations,
    /// The service reported `response.failed`.
    Failed,
    /// The service reported `response.incomplete`.
    Incomplete,
}

/// Record of one executed tool call, kept in the turn transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub tool_name: String,
    /// Parsed arguments, or the raw string when it was not valid JSON.
    pub arguments: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub call_id: String,
    pub output: ToolOutcome,
}

impl ToolResultRecord {
    pub const KIND: &'static str = "function_call_output";

    pub fn new(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        arguments: serde_json::Value,
        output: ToolOutcome,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            kind: Self::KIND.to_string(),
            call_id: call_id.into(),
            output,
        }
    }
}

/// One entry of the accumulated responses of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnRecord {
    // Listed first: a snapshot accepts almost any object.
    ToolResult(ToolResultRecord),
    Response(ResponseSnapshot),
}
