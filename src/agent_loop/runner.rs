//! Agent loop runner: completion call, tool round, repeat.

use std::sync::Arc;

use bon::Builder;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::{SluiceConfig, DEFAULT_MAX_ITERATIONS};
use crate::error::{Result, SluiceError};
use crate::provider::{CompletionRequest, CompletionService, ToolChoice};
use crate::reconstruct::reconstruct;
use crate::tools::{ToolArguments, ToolContext, ToolDefinition, ToolExecutor, ToolOutcome, UserId};
use crate::types::{EventKind, FunctionCallItem, InputItem, ResponseSnapshot};

use super::events::AgentEvent;
use super::types::{IterationState, LoopState, ToolResultRecord, TurnId, TurnRecord, TurnStatus};

/// Inputs of one user turn.
#[derive(Debug, Clone, Builder)]
pub struct AgentRequest {
    #[builder(default = Uuid::new_v4())]
    pub turn_id: TurnId,
    #[builder(into)]
    pub user_id: UserId,
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub instructions: Option<String>,
    /// Registered tool names offered to the model.
    #[builder(default)]
    pub tools: Vec<String>,
    /// Conversation so far, ending with the new user message.
    #[builder(default)]
    pub input: Vec<InputItem>,
}

/// Drives completion calls and tool rounds for one user turn at a time.
#[derive(Clone)]
pub struct AgentLoop {
    service: Arc<dyn CompletionService>,
    executor: ToolExecutor,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(service: Arc<dyn CompletionService>, executor: ToolExecutor) -> Self {
        Self {
            service,
            executor,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn from_config(
        config: &SluiceConfig,
        service: Arc<dyn CompletionService>,
        executor: ToolExecutor,
    ) -> Self {
        Self::new(service, executor).with_max_iterations(config.max_iterations)
    }

    /// Values below one are raised to one.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Start the turn on a background task and return its events.
    ///
    /// The stream is backed by a channel of capacity one, so the loop never
    /// runs more than one event ahead of the consumer. Dropping the stream
    /// aborts the turn, including an in-flight completion call or tool. An
    /// upstream failure arrives as a final `Err` item, and in that case no
    /// [`AgentEvent::Completed`] is sent.
    pub fn run(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<AgentEvent>> {
        let (tx, rx) = mpsc::channel(1);
        let span = tracing::info_span!(
            "agent_turn",
            turn_id = %request.turn_id,
            user_id = %request.user_id,
            model = %request.model,
        );
        let driver = TurnDriver {
            service: self.service.clone(),
            executor: self.executor.clone(),
            max_iterations: self.max_iterations,
            request,
            cancel: cancel.child_token(),
            tx,
        };
        tokio::spawn(driver.drive().instrument(span));
        Box::pin(ReceiverStream::new(rx))
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("service", &self.service.name())
            .field("executor", &self.executor)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// Why the producer stopped early.
enum Halt {
    /// The consumer dropped the stream.
    Closed,
    Failed(SluiceError),
}

impl From<SluiceError> for Halt {
    fn from(err: SluiceError) -> Self {
        Self::Failed(err)
    }
}

struct TurnDriver {
    service: Arc<dyn CompletionService>,
    executor: ToolExecutor,
    max_iterations: u32,
    request: AgentRequest,
    cancel: CancellationToken,
    tx: mpsc::Sender<Result<AgentEvent>>,
}

impl TurnDriver {
    async fn drive(self) {
        let outcome = tokio::select! {
            biased;
            _ = self.tx.closed() => Err(Halt::Closed),
            outcome = self.run_turn() => outcome,
        };
        // Turn-scoped token: reaches work a tool spawned off its context.
        self.cancel.cancel();
        match outcome {
            Ok(()) => {}
            Err(Halt::Closed) => debug!("event consumer went away; stopping turn"),
            Err(Halt::Failed(err)) => {
                warn!(error = %err, "agent turn failed");
                let _ = self.tx.send(Err(err)).await;
            }
        }
    }

    async fn emit(&self, event: AgentEvent) -> std::result::Result<(), Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Failed(SluiceError::Canceled)),
            sent = self.tx.send(Ok(event)) => sent.map_err(|_| Halt::Closed),
        }
    }

    async fn run_turn(&self) -> std::result::Result<(), Halt> {
        let tools = self
            .executor
            .registry()
            .definitions(&self.request.tools, &self.request.user_id);
        let mut input = self.request.input.clone();
        let mut responses: Vec<TurnRecord> = Vec::new();
        let mut state = IterationState::new();
        let mut status = TurnStatus::Completed;

        info!(tools = tools.len(), input_items = input.len(), "agent turn started");

        while state.state() == LoopState::Running {
            if state.iteration >= self.max_iterations {
                info!(max_iterations = self.max_iterations, "iteration cap reached");
                status = TurnStatus::MaxIterations;
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(Halt::Failed(SluiceError::Canceled));
            }
            state.iteration += 1;
            debug!(iteration = state.iteration, "completion call");

            let (kind, snapshot) = self.run_completion(&tools, &input).await?;
            match kind {
                EventKind::Completed => {
                    let calls: Vec<FunctionCallItem> = snapshot
                        .response
                        .function_calls()
                        .into_iter()
                        .cloned()
                        .collect();
                    responses.push(TurnRecord::Response(snapshot));
                    if calls.is_empty() {
                        state.keep_running = false;
                    }
                    for call in calls {
                        self.run_tool_call(call, &mut input, &mut responses).await?;
                    }
                }
                other => {
                    warn!(
                        event_type = %other,
                        response = %snapshot.sanitized(),
                        "completion ended without success"
                    );
                    responses.push(TurnRecord::Response(snapshot));
                    status = if other == EventKind::Incomplete {
                        TurnStatus::Incomplete
                    } else {
                        TurnStatus::Failed
                    };
                    state.keep_running = false;
                }
            }
        }

        info!(
            iterations = state.iteration,
            status = %status,
            records = responses.len(),
            "agent turn completed"
        );
        self.emit(AgentEvent::Completed { responses, status }).await
    }

    /// One completion call: forward every snapshot and return the terminal one.
    async fn run_completion(
        &self,
        tools: &[ToolDefinition],
        input: &[InputItem],
    ) -> std::result::Result<(EventKind, ResponseSnapshot), Halt> {
        let completion = CompletionRequest::builder()
            .model(self.request.model.clone())
            .maybe_instructions(self.request.instructions.clone())
            .tools(tools.to_vec())
            .input(input.to_vec())
            .tool_choice(ToolChoice::Auto)
            .parallel_tool_calls(false)
            .build();

        let events = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Halt::Failed(SluiceError::Canceled)),
            events = self.service.stream(&completion, self.cancel.clone()) => events?,
        };

        let mut pairs = reconstruct(events);
        let mut terminal = None;
        loop {
            let pair = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Halt::Failed(SluiceError::Canceled)),
                pair = pairs.next() => pair,
            };
            let Some(pair) = pair else { break };
            let (event_type, snapshot) = pair?;
            if let Ok(kind) = event_type.parse::<EventKind>() {
                if kind.is_terminal() {
                    terminal = Some((kind, snapshot.clone()));
                }
            }
            self.emit(AgentEvent::Response {
                event_type,
                snapshot,
            })
            .await?;
        }

        terminal.ok_or_else(|| {
            Halt::Failed(SluiceError::Stream(
                "completion stream ended without a terminal event".to_string(),
            ))
        })
    }

    async fn run_tool_call(
        &self,
        call: FunctionCallItem,
        input: &mut Vec<InputItem>,
        responses: &mut Vec<TurnRecord>,
    ) -> std::result::Result<(), Halt> {
        input.push(InputItem::FunctionCall(call.clone()));

        let parsed = ToolArguments::parse(&call.arguments);
        let arguments = match &parsed {
            Ok(args) => args.raw().clone(),
            Err(_) => Value::String(call.arguments.clone()),
        };

        self.emit(AgentEvent::ToolExecutionStarted {
            tool_name: call.name.clone(),
            call_id: call.call_id.clone(),
        })
        .await?;

        let outcome = match parsed {
            Ok(args) => {
                let ctx = ToolContext {
                    user_id: self.request.user_id.clone(),
                    call_id: Some(call.call_id.clone()),
                    cancel: self.cancel.child_token(),
                };
                self.executor.execute_with(&call.name, &args, ctx).await
            }
            Err(err) => ToolOutcome::error(err.to_string()),
        };
        info!(
            tool = %call.name,
            call_id = %call.call_id,
            is_error = outcome.is_error(),
            "tool call finished"
        );

        self.emit(AgentEvent::ToolExecutionCompleted {
            tool_name: call.name.clone(),
            call_id: call.call_id.clone(),
            arguments: arguments.clone(),
            result: outcome.clone(),
        })
        .await?;

        input.push(InputItem::function_call_output(
            call.call_id.clone(),
            outcome.to_output_string(),
        ));
        responses.push(TurnRecord::ToolResult(ToolResultRecord::new(
            call.name,
            call.call_id,
            arguments,
            outcome,
        )));
        Ok(())
    }
}
