//! OpenAI Responses API completion service (streaming only).

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::SluiceConfig;
use crate::error::{Result, SluiceError};
use crate::types::StreamEvent;

use super::http::{bearer_headers, build_client, status_to_error};
use super::{CompletionRequest, CompletionService};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streams completions from `{base_url}/responses`.
#[derive(Debug, Clone)]
pub struct OpenAiResponsesService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiResponsesService {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        Ok(Self::with_client(build_client(None)?, api_key, base_url))
    }

    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: Option<String>,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    /// Build from configuration; fails when no API key is configured.
    pub fn from_config(config: &SluiceConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            SluiceError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;
        let client = build_client(config.request_timeout_secs.map(Duration::from_secs))?;
        Ok(Self::with_client(
            client,
            api_key,
            Some(config.base_url.clone()),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Result<Value> {
        let mut body = serde_json::to_value(request)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("stream".into(), Value::Bool(true));
        }
        Ok(body)
    }
}

/// Decode one SSE `data` payload. An `error` event from the service ends
/// the stream.
fn parse_event(data: &str) -> Result<StreamEvent> {
    let value: Value = serde_json::from_str(data)?;
    if value.get("type").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .or_else(|| value.get("error").and_then(|e| e.get("message")))
            .and_then(Value::as_str)
            .unwrap_or("upstream stream error");
        return Err(SluiceError::Stream(message.to_string()));
    }
    StreamEvent::from_value(value)
}

async fn map_eventsource_error(err: reqwest_eventsource::Error) -> SluiceError {
    use reqwest_eventsource::Error as EsError;
    match err {
        EsError::InvalidStatusCode(status, resp) => {
            let body = resp.text().await.unwrap_or_default();
            status_to_error(status.as_u16(), &body)
        }
        EsError::InvalidContentType(content_type, resp) => {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            if status >= 400 {
                status_to_error(status, &body)
            } else {
                SluiceError::Stream(format!(
                    "expected an event stream, got content type {content_type:?}"
                ))
            }
        }
        EsError::Transport(e) => SluiceError::Network(e),
        other => SluiceError::Stream(other.to_string()),
    }
}

#[async_trait]
impl CompletionService for OpenAiResponsesService {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_request_body(request)?;
        let url = format!("{}/responses", self.base_url);

        debug!(
            model = %request.model,
            tools = request.tools.len(),
            input_items = request.input.len(),
            "OpenAI Responses stream"
        );

        let builder = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key)?)
            .json(&body);
        let mut source = EventSource::new(builder)
            .map_err(|e| SluiceError::Stream(format!("cannot open event stream: {e}")))?;
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        // Surface HTTP failures from the call itself rather than as a stream item.
        let first = tokio::select! {
            _ = cancel.cancelled() => {
                source.close();
                return Err(SluiceError::Canceled);
            }
            first = source.next() => first,
        };
        let mut pending = match first {
            Some(Ok(Event::Open)) => None,
            Some(Ok(Event::Message(message))) => Some(message.data),
            Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                return Err(SluiceError::Stream(
                    "event stream closed before it opened".to_string(),
                ));
            }
            Some(Err(e)) => {
                source.close();
                return Err(map_eventsource_error(e).await);
            }
        };

        let stream = async_stream::stream! {
            loop {
                let data = match pending.take() {
                    Some(data) => data,
                    None => {
                        let next = tokio::select! {
                            _ = cancel.cancelled() => {
                                source.close();
                                yield Err(SluiceError::Canceled);
                                break;
                            }
                            next = source.next() => next,
                        };
                        match next {
                            Some(Ok(Event::Message(message))) => message.data,
                            Some(Ok(Event::Open)) => continue,
                            Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => break,
                            Some(Err(e)) => {
                                source.close();
                                yield Err(map_eventsource_error(e).await);
                                break;
                            }
                        }
                    }
                };

                if data == "[DONE]" {
                    source.close();
                    break;
                }
                trace!(data = %data, "OpenAI Responses SSE event");
                match parse_event(&data) {
                    Ok(event) => yield Ok(event),
                    Err(e) => {
                        source.close();
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
