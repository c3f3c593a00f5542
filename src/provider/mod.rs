//! Completion service abstraction and the OpenAI Responses implementation.

pub mod http;
pub mod openai_responses;

pub use openai_responses::OpenAiResponsesService;

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tools::ToolDefinition;
use crate::types::{InputItem, StreamEvent};

/// How the model may pick tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// One completion call. Serializes to the Responses API request body minus
/// the `stream` flag, which the service sets.
#[derive(Debug, Clone, Builder, Serialize)]
pub struct CompletionRequest {
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[builder(default)]
    pub input: Vec<InputItem>,
    #[builder(default)]
    pub tool_choice: ToolChoice,
    /// Always `false` for the agent loop: tools run one at a time.
    #[builder(default)]
    pub parallel_tool_calls: bool,
}

/// A streaming completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Service name for logs.
    fn name(&self) -> &str;

    /// Start a completion call and return its typed events in order.
    ///
    /// Failures to start (HTTP status, auth) are returned directly; failures
    /// after the first event arrive as an `Err` item that ends the stream.
    /// Firing `cancel` ends the stream with [`SluiceError::Canceled`](crate::error::SluiceError::Canceled).
    async fn stream(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}
