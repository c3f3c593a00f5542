//! One chat turn as a client-facing SSE frame stream.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent_loop::{
    process_started_payload, AgentEvent, AgentLoop, AgentRequest, TurnId, PROCESS_STARTED,
};
use crate::error::Result;
use crate::sse::format_frame;
use crate::tools::UserId;
use crate::transcript::StoredMessage;

/// Persistence for chat messages.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn save(&self, turn_id: TurnId, user_id: &UserId, message: StoredMessage) -> Result<()>;
}

/// Keeps messages in memory; used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl TranscriptSink for MemoryTranscript {
    async fn save(&self, _turn_id: TurnId, _user_id: &UserId, message: StoredMessage) -> Result<()> {
        self.messages.lock().await.push(message);
        Ok(())
    }
}

/// Runs the agent loop for one message and frames its events.
#[derive(Clone)]
pub struct ChatTurn {
    agent: AgentLoop,
    sink: Arc<dyn TranscriptSink>,
}

impl ChatTurn {
    pub fn new(agent: AgentLoop, sink: Arc<dyn TranscriptSink>) -> Self {
        Self { agent, sink }
    }

    /// Frames for one turn: the started frame, every agent event, and last
    /// the completion frame, sent only after the responses were saved.
    ///
    /// An `Err` item ends the stream; clients treat a stream without the
    /// completion frame as an incomplete turn.
    pub fn frames(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<String>> {
        let turn_id = request.turn_id;
        let user_id = request.user_id.clone();
        let sink = self.sink.clone();
        let events = self.agent.run(request, cancel);

        let stream = async_stream::stream! {
            yield format_frame(PROCESS_STARTED, &process_started_payload());

            let mut events = events;
            while let Some(item) = events.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                if let AgentEvent::Completed { responses, .. } = &event {
                    let message = StoredMessage::Assistant {
                        responses: responses.clone(),
                    };
                    if let Err(e) = sink.save(turn_id, &user_id, message).await {
                        tracing::error!(turn_id = %turn_id, error = %e, "failed to save assistant message");
                        yield Err(e);
                        break;
                    }
                }
                match event.payload() {
                    Ok(payload) => yield format_frame(event.event_type(), &payload),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(stream)
    }
}

impl std::fmt::Debug for ChatTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTurn").field("agent", &self.agent).finish()
    }
}
