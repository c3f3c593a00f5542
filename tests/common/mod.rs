//! Shared test helpers: a scripted completion service and event builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use sluice::agent_loop::AgentEvent;
use sluice::error::{Result, SluiceError};
use sluice::provider::{CompletionRequest, CompletionService};
use sluice::tools::{FnTool, ToolExecutor, ToolParameters, ToolRegistry};
use sluice::types::StreamEvent;

/// What one completion call does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit the events, then end.
    Events(Vec<Value>),
    /// Emit the events, then fail mid-stream.
    EventsThenError(Vec<Value>, String),
    /// Fail before any event.
    StartError(u16, String),
    /// Emit the events, then never finish.
    Hang(Vec<Value>),
}

/// Completion service that replays scripts and records every request.
pub struct ScriptedService {
    scripts: Mutex<VecDeque<Script>>,
    repeat: Option<Script>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answer every call with the same script.
    pub fn repeating(script: Script) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            repeat: Some(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn parse_all(events: Vec<Value>) -> Vec<Result<StreamEvent>> {
    events
        .into_iter()
        .map(|value| Ok(StreamEvent::from_value(value).expect("scripted event parses")))
        .collect()
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        _cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .expect("no script left for completion call");

        let stream = match script {
            Script::Events(events) => stream::iter(parse_all(events)).boxed(),
            Script::EventsThenError(events, message) => stream::iter(parse_all(events))
                .chain(stream::once(async move { Err(SluiceError::Stream(message)) }))
                .boxed(),
            Script::StartError(status, body) => {
                return Err(sluice::provider::http::status_to_error(status, &body))
            }
            Script::Hang(events) => stream::iter(parse_all(events))
                .chain(stream::pending())
                .boxed(),
        };
        Ok(stream)
    }
}

// Event builders -----------------------------------------------------------

pub fn created(id: &str) -> Value {
    json!({
        "type": "response.created",
        "sequence_number": 0,
        "response": {"id": id, "status": "in_progress", "created_at": 1_700_000_000, "output": []}
    })
}

pub fn message_item(text: &str) -> Value {
    json!({
        "type": "message",
        "id": "msg_1",
        "role": "assistant",
        "status": "completed",
        "content": [{"type": "output_text", "text": text, "annotations": []}]
    })
}

pub fn function_call_item(call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "type": "function_call",
        "id": format!("fc_{call_id}"),
        "call_id": call_id,
        "name": name,
        "arguments": arguments,
        "status": "completed"
    })
}

pub fn completed(id: &str, output: Vec<Value>) -> Value {
    json!({
        "type": "response.completed",
        "sequence_number": 99,
        "response": {"id": id, "status": "completed", "created_at": 1_700_000_000, "output": output}
    })
}

pub fn failed(id: &str) -> Value {
    json!({
        "type": "response.failed",
        "response": {
            "id": id,
            "status": "failed",
            "output": [],
            "error": {"code": "server_error", "message": "boom"}
        }
    })
}

/// created → message added → text part added → delta → completed.
pub fn text_turn(id: &str, text: &str) -> Vec<Value> {
    vec![
        created(id),
        json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"type": "message", "id": "msg_1", "role": "assistant", "status": "in_progress", "content": []}
        }),
        json!({
            "type": "response.content_part.added",
            "output_index": 0,
            "content_index": 0,
            "part": {"type": "output_text", "text": "", "annotations": []}
        }),
        json!({
            "type": "response.output_text.delta",
            "output_index": 0,
            "content_index": 0,
            "delta": text
        }),
        completed(id, vec![message_item(text)]),
    ]
}

/// A response that asks for each `(call_id, name, arguments)` in order.
pub fn tool_call_turn(id: &str, calls: &[(&str, &str, &str)]) -> Vec<Value> {
    let mut events = vec![created(id)];
    for (index, (call_id, name, arguments)) in calls.iter().enumerate() {
        events.push(json!({
            "type": "response.output_item.added",
            "output_index": index,
            "item": {
                "type": "function_call",
                "id": format!("fc_{call_id}"),
                "call_id": call_id,
                "name": name,
                "arguments": "",
                "status": "in_progress"
            }
        }));
        events.push(json!({
            "type": "response.function_call_arguments.delta",
            "output_index": index,
            "item_id": format!("fc_{call_id}"),
            "delta": arguments
        }));
        events.push(json!({
            "type": "response.output_item.done",
            "output_index": index,
            "item": function_call_item(call_id, name, arguments)
        }));
    }
    let output = calls
        .iter()
        .map(|(call_id, name, arguments)| function_call_item(call_id, name, arguments))
        .collect();
    events.push(completed(id, output));
    events
}

// Tools ----------------------------------------------------------------------

/// Registry with `lookup` (echoes its arguments and counts calls) and
/// `broken` (always fails).
pub fn test_executor(counter: Arc<AtomicUsize>) -> ToolExecutor {
    let mut registry = ToolRegistry::new();
    registry.register_shared(Arc::new(FnTool::new(
        "lookup",
        "Look something up",
        ToolParameters::object().string("q", "Query", true).build(),
        move |args, ctx| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({"n": n, "q": args.get_str("q")?, "user": ctx.user_id}))
            }
        },
    )));
    registry.register_shared(Arc::new(FnTool::new(
        "broken",
        "Always fails",
        ToolParameters::empty(),
        |_args, _ctx| async { Err(SluiceError::InvalidArgument("warehouse is offline".into())) },
    )));
    ToolExecutor::new(Arc::new(registry))
}

pub async fn collect(mut events: BoxStream<'static, Result<AgentEvent>>) -> Vec<Result<AgentEvent>> {
    let mut out = Vec::new();
    while let Some(event) = events.next().await {
        out.push(event);
    }
    out
}
