//! Sluice: a streaming agent orchestrator for the OpenAI Responses API.
//!
//! One user turn runs as a loop: call the completion service, rebuild the
//! full response from its stream of deltas, run any tools the model asked
//! for, feed the results back and call again. Every intermediate snapshot
//! and tool event is re-emitted as a server-sent event frame.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use sluice::agent_loop::{AgentLoop, AgentRequest};
//! use sluice::config::SluiceConfig;
//! use sluice::provider::OpenAiResponsesService;
//! use sluice::tools::{builtin::builtin_registry, ToolExecutor};
//! use sluice::turn::{ChatTurn, MemoryTranscript};
//! use sluice::types::InputItem;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> sluice::error::Result<()> {
//! let config = SluiceConfig::load(None)?;
//! let service = Arc::new(OpenAiResponsesService::from_config(&config)?);
//! let executor = ToolExecutor::new(Arc::new(builtin_registry()));
//! let agent = AgentLoop::from_config(&config, service, executor);
//! let turn = ChatTurn::new(agent, Arc::new(MemoryTranscript::new()));
//!
//! let request = AgentRequest::builder()
//!     .user_id("user-1")
//!     .model(config.model.clone())
//!     .tools(vec!["current_time".to_string()])
//!     .input(vec![InputItem::user("What time is it?")])
//!     .build();
//! let mut frames = turn.frames(request, CancellationToken::new());
//! while let Some(frame) = frames.next().await {
//!     print!("{}", frame?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod provider;
pub mod reconstruct;
pub mod sse;
pub mod tools;
pub mod transcript;
pub mod turn;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
