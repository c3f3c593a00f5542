//! Tool executor: run a named tool and fold every failure into a result
//! the model can read.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::registry::ToolRegistry;
use super::tool::{ToolContext, UserId};

/// Outcome of one tool execution, as fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { result: serde_json::Value },
    Error { error: String },
}

impl ToolOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// JSON text placed in the `function_call_output` turn.
    pub fn to_output_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","error":"unserializable tool result: {e}"}}"#)
        })
    }
}

/// Runs tools from a shared registry.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `name` for `user_id`. Never fails: unknown tools, tool errors
    /// and panics all become [`ToolOutcome::Error`].
    pub async fn execute(&self, name: &str, args: &ToolArguments, user_id: &UserId) -> ToolOutcome {
        self.execute_with(name, args, ToolContext::new(user_id.clone()))
            .await
    }

    /// Like [`execute`](Self::execute) with a caller-supplied context.
    pub async fn execute_with(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: ToolContext,
    ) -> ToolOutcome {
        let Some(tool) = self.registry.get(name, &ctx.user_id) else {
            warn!(tool = name, "tool not found");
            return ToolOutcome::error(format!("Tool {name} not found"));
        };

        let run = AssertUnwindSafe(tool.run(args, &ctx)).catch_unwind();
        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => ToolOutcome::error("tool execution canceled"),
            res = run => match res {
                Ok(Ok(result)) => ToolOutcome::Success { result },
                Ok(Err(err)) => ToolOutcome::error(err.to_string()),
                Err(panic) => ToolOutcome::error(panic_message(panic.as_ref())),
            },
        };
        debug!(tool = name, is_error = outcome.is_error(), "tool executed");
        outcome
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("tool panicked: {s}")
    } else {
        "tool panicked".to_string()
    }
}
