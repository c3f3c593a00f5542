//! Chat turn framing and persistence.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::*;
use sluice::agent_loop::{AgentLoop, AgentRequest, TurnId, TurnRecord};
use sluice::error::{Result, SluiceError};
use sluice::sse::{decode_frames, Frame};
use sluice::tools::UserId;
use sluice::transcript::{conversation_input, with_preamble, StoredMessage};
use sluice::turn::{ChatTurn, MemoryTranscript, TranscriptSink};
use sluice::types::InputItem;

fn request() -> AgentRequest {
    AgentRequest::builder()
        .user_id("u-1")
        .model("gpt-test")
        .input(vec![InputItem::user("hi")])
        .build()
}

async fn run_frames(turn: &ChatTurn) -> (String, Option<SluiceError>) {
    let mut frames = turn.frames(request(), CancellationToken::new());
    let mut raw = String::new();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(frame) => raw.push_str(&frame),
            Err(e) => return (raw, Some(e)),
        }
    }
    (raw, None)
}

#[tokio::test]
async fn hello_turn_produces_started_five_snapshots_and_completion() {
    let service = ScriptedService::new(vec![Script::Events(text_turn("resp_1", "Hello"))]);
    let transcript = Arc::new(MemoryTranscript::new());
    let turn = ChatTurn::new(
        AgentLoop::new(service, test_executor(Arc::default())),
        transcript.clone(),
    );

    let (raw, err) = run_frames(&turn).await;
    assert!(err.is_none());
    assert!(raw.starts_with(
        "event: internal.process.started\ndata: {\"internal_status\":\"started\",\"type\":\"internal.process.started\"}\n\n"
    ));

    let frames = decode_frames(&raw).unwrap();
    let names: Vec<_> = frames.iter().map(|f| f.event.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "internal.process.started",
            "response.created",
            "response.output_item.added",
            "response.content_part.added",
            "response.output_text.delta",
            "response.completed",
            "internal.process.completed",
        ]
    );

    let completed = &frames[5];
    assert_eq!(
        completed.data["response"]["output"][0]["content"][0]["text"],
        json!("Hello")
    );

    let Frame { data: last, .. } = frames.last().unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["responses"].as_array().unwrap().len(), 1);
    assert_eq!(last["responses"][0], completed.data);

    let saved = transcript.messages().await;
    assert_eq!(saved.len(), 1);
    match &saved[0] {
        StoredMessage::Assistant { responses } => assert_eq!(responses.len(), 1),
        other => panic!("unexpected message: {other:?}"),
    }
}

struct FailingSink;

#[async_trait]
impl TranscriptSink for FailingSink {
    async fn save(&self, _turn_id: TurnId, _user_id: &UserId, _message: StoredMessage) -> Result<()> {
        Err(SluiceError::Io(std::io::Error::other("disk full")))
    }
}

#[tokio::test]
async fn failed_save_withholds_completion_frame() {
    let service = ScriptedService::new(vec![Script::Events(text_turn("resp_1", "Hello"))]);
    let turn = ChatTurn::new(
        AgentLoop::new(service, test_executor(Arc::default())),
        Arc::new(FailingSink),
    );

    let (raw, err) = run_frames(&turn).await;
    assert!(matches!(err, Some(SluiceError::Io(_))));
    let frames = decode_frames(&raw).unwrap();
    assert_eq!(frames.len(), 6);
    assert!(frames.iter().all(|f| f.event != "internal.process.completed"));
}

#[tokio::test]
async fn upstream_failure_after_started_frame() {
    let service = ScriptedService::new(vec![Script::StartError(429, "{}".to_string())]);
    let turn = ChatTurn::new(
        AgentLoop::new(service, test_executor(Arc::default())),
        Arc::new(MemoryTranscript::new()),
    );

    let (raw, err) = run_frames(&turn).await;
    assert!(matches!(err, Some(SluiceError::RateLimited { .. })));
    let frames = decode_frames(&raw).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "internal.process.started");
}

#[tokio::test]
async fn saved_turn_rebuilds_next_conversation() {
    let service = ScriptedService::new(vec![
        Script::Events(tool_call_turn("resp_1", &[("call_1", "lookup", r#"{"q":"orders"}"#)])),
        Script::Events(text_turn("resp_2", "12 orders")),
    ]);
    let transcript = Arc::new(MemoryTranscript::new());
    let turn = ChatTurn::new(
        AgentLoop::new(service, test_executor(Arc::default())),
        transcript.clone(),
    );
    let (_, err) = run_frames(&turn).await;
    assert!(err.is_none());

    let mut history = vec![StoredMessage::User {
        input: vec![InputItem::user("hi")],
    }];
    history.extend(transcript.messages().await);
    let input = with_preamble(conversation_input(&history), None);

    let kinds: Vec<String> = input
        .iter()
        .map(|item| serde_json::to_value(item).unwrap()["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "message",
            "message",
            "function_call",
            "function_call_output",
            "message"
        ]
    );
    assert_eq!(input.last(), Some(&InputItem::message(sluice::types::Role::Assistant, "12 orders")));

    match &history[1] {
        StoredMessage::Assistant { responses } => {
            assert!(matches!(responses[1], TurnRecord::ToolResult(_)))
        }
        other => panic!("unexpected message: {other:?}"),
    }
}
