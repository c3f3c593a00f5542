//! Stream reconstruction: fold incremental completion events into full
//! response snapshots.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::{Result, SluiceError};
use crate::types::{
    ContentPart, FunctionCallItem, OutputItem, ResponseSnapshot, StreamEvent, StreamEventData,
};

/// Mutable projection of one completion call.
#[derive(Debug, Default)]
pub struct StreamReconstructor {
    snapshot: ResponseSnapshot,
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current full projection.
    pub fn snapshot(&self) -> &ResponseSnapshot {
        &self.snapshot
    }

    /// Apply one event. On error the projection is left as it was before the
    /// failing patch.
    pub fn apply(&mut self, event: StreamEvent) -> Result<&ResponseSnapshot> {
        let event_type = event.event_type;
        match event.data {
            StreamEventData::Lifecycle { response } => {
                self.snapshot = ResponseSnapshot {
                    kind: event_type,
                    sequence_number: event.sequence_number,
                    response,
                };
            }
            StreamEventData::OutputItem { output_index, item } => {
                *self.snapshot.response.ensure_output_slot(output_index) = Some(item);
            }
            StreamEventData::ContentPart {
                output_index,
                content_index,
                part,
            } => {
                let slot = self.snapshot.response.ensure_output_slot(output_index);
                let item = slot.get_or_insert_with(|| OutputItem::Message(Default::default()));
                let OutputItem::Message(message) = item else {
                    return Err(SluiceError::malformed(
                        event_type,
                        format!("output {output_index} is not a message item"),
                    ));
                };
                *message.ensure_content_slot(content_index) = Some(part);
            }
            StreamEventData::OutputTextDelta {
                output_index,
                content_index,
                delta,
            } => {
                let part = self.text_part(&event_type, output_index, content_index)?;
                part.text.push_str(&delta);
            }
            StreamEventData::AnnotationAdded {
                output_index,
                content_index,
                annotation_index,
                annotation,
            } => {
                let part = self.text_part(&event_type, output_index, content_index)?;
                part.set_annotation(annotation_index, annotation);
            }
            StreamEventData::FunctionCallArgumentsDelta {
                output_index,
                item_id,
                delta,
            } => {
                let slot = self.snapshot.response.ensure_output_slot(output_index);
                let item = slot.get_or_insert_with(|| {
                    OutputItem::FunctionCall(FunctionCallItem {
                        id: item_id,
                        ..Default::default()
                    })
                });
                let OutputItem::FunctionCall(call) = item else {
                    return Err(SluiceError::malformed(
                        event_type,
                        format!("output {output_index} is not a function_call item"),
                    ));
                };
                call.arguments.push_str(&delta);
            }
            StreamEventData::Other(_) => {}
        }
        Ok(&self.snapshot)
    }

    fn text_part(
        &mut self,
        event_type: &str,
        output_index: usize,
        content_index: usize,
    ) -> Result<&mut crate::types::TextPart> {
        let item = self
            .snapshot
            .response
            .output
            .get_mut(output_index)
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                SluiceError::malformed(event_type, format!("no output item at {output_index}"))
            })?;
        let OutputItem::Message(message) = item else {
            return Err(SluiceError::malformed(
                event_type,
                format!("output {output_index} is not a message item"),
            ));
        };
        match message.content.get_mut(content_index).and_then(Option::as_mut) {
            Some(ContentPart::OutputText(text)) => Ok(text),
            Some(ContentPart::Other(_)) => Err(SluiceError::malformed(
                event_type,
                format!("content {output_index}/{content_index} is not a text part"),
            )),
            None => Err(SluiceError::malformed(
                event_type,
                format!("no content part at {output_index}/{content_index}"),
            )),
        }
    }
}

/// Lazily fold `events` into `(event_type, snapshot)` pairs, one per event.
///
/// The sequence stops after the first error, whether it came from upstream
/// or from applying an event.
pub fn reconstruct<S>(events: S) -> BoxStream<'static, Result<(String, ResponseSnapshot)>>
where
    S: Stream<Item = Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut reconstructor = StreamReconstructor::new();
        let mut inner = std::pin::pin!(events);
        while let Some(item) = inner.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            let event_type = event.event_type.clone();
            match reconstructor.apply(event) {
                Ok(snapshot) => yield Ok((event_type, snapshot.clone())),
                Err(e) => {
                    tracing::warn!(event_type = %event_type, error = %e, "stream reconstruction failed");
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseStatus, TextPart};
    use serde_json::json;

    fn event(value: serde_json::Value) -> StreamEvent {
        StreamEvent::from_value(value).expect("valid event")
    }

    fn created() -> StreamEvent {
        event(json!({
            "type": "response.created",
            "sequence_number": 0,
            "response": {"id": "resp_1", "status": "in_progress", "created_at": 1, "output": []}
        }))
    }

    fn text_part_added(output_index: usize, content_index: usize) -> StreamEvent {
        event(json!({
            "type": "response.content_part.added",
            "output_index": output_index,
            "content_index": content_index,
            "part": {"type": "output_text", "text": "", "annotations": []}
        }))
    }

    fn text_delta(output_index: usize, content_index: usize, delta: &str) -> StreamEvent {
        event(json!({
            "type": "response.output_text.delta",
            "output_index": output_index,
            "content_index": content_index,
            "delta": delta
        }))
    }

    fn text_at(r: &StreamReconstructor, output_index: usize, content_index: usize) -> String {
        match &r.snapshot().response.output[output_index] {
            Some(OutputItem::Message(m)) => match &m.content[content_index] {
                Some(ContentPart::OutputText(TextPart { text, .. })) => text.clone(),
                other => panic!("unexpected part {other:?}"),
            },
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn sparse_output_items_are_padded() {
        let mut r = StreamReconstructor::new();
        r.apply(created()).unwrap();
        r.apply(event(json!({
            "type": "response.output_item.added",
            "output_index": 3,
            "item": {"type": "message", "role": "assistant", "content": []}
        })))
        .unwrap();
        let output = &r.snapshot().response.output;
        assert_eq!(output.len(), 4);
        assert!(output[..3].iter().all(Option::is_none));

        r.apply(event(json!({
            "type": "response.output_item.added",
            "output_index": 1,
            "item": {"type": "message", "role": "assistant", "content": []}
        })))
        .unwrap();
        assert_eq!(r.snapshot().response.output.len(), 4);
        assert!(r.snapshot().response.output[1].is_some());
    }

    #[test]
    fn content_parts_pad_both_levels() {
        let mut r = StreamReconstructor::new();
        r.apply(text_part_added(2, 1)).unwrap();
        let output = &r.snapshot().response.output;
        assert_eq!(output.len(), 3);
        match &output[2] {
            Some(OutputItem::Message(m)) => {
                assert_eq!(m.content.len(), 2);
                assert!(m.content[0].is_none());
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn text_deltas_concatenate() {
        let mut r = StreamReconstructor::new();
        r.apply(created()).unwrap();
        r.apply(text_part_added(0, 0)).unwrap();
        r.apply(text_delta(0, 0, "He")).unwrap();
        r.apply(text_delta(0, 0, "llo")).unwrap();
        assert_eq!(text_at(&r, 0, 0), "Hello");
    }

    #[test]
    fn lifecycle_event_replaces_projection() {
        let mut r = StreamReconstructor::new();
        r.apply(created()).unwrap();
        r.apply(text_part_added(0, 0)).unwrap();
        r.apply(text_delta(0, 0, "draft")).unwrap();
        r.apply(event(json!({
            "type": "response.completed",
            "sequence_number": 9,
            "response": {"id": "resp_1", "status": "completed", "created_at": 1, "output": []}
        })))
        .unwrap();
        let snapshot = r.snapshot();
        assert_eq!(snapshot.kind, "response.completed");
        assert_eq!(snapshot.sequence_number, Some(9));
        assert_eq!(snapshot.response.status, Some(ResponseStatus::Completed));
        assert!(snapshot.response.output.is_empty());
    }

    #[test]
    fn patches_keep_lifecycle_kind() {
        let mut r = StreamReconstructor::new();
        r.apply(created()).unwrap();
        r.apply(text_part_added(0, 0)).unwrap();
        assert_eq!(r.snapshot().kind, "response.created");
    }

    #[test]
    fn delta_without_part_is_malformed() {
        let mut r = StreamReconstructor::new();
        r.apply(created()).unwrap();
        let err = r.apply(text_delta(0, 0, "x")).unwrap_err();
        assert!(matches!(err, SluiceError::MalformedStream { .. }));
        assert!(r.snapshot().response.output.is_empty());
    }

    #[test]
    fn annotations_are_keyed_by_index() {
        let mut r = StreamReconstructor::new();
        r.apply(text_part_added(0, 0)).unwrap();
        r.apply(event(json!({
            "type": "response.output_text.annotation.added",
            "output_index": 0,
            "content_index": 0,
            "annotation_index": 1,
            "annotation": {"type": "url_citation", "url": "https://example.com"}
        })))
        .unwrap();
        match &r.snapshot().response.output[0] {
            Some(OutputItem::Message(m)) => match &m.content[0] {
                Some(ContentPart::OutputText(part)) => {
                    assert_eq!(part.annotations.len(), 2);
                    assert!(part.annotations[0].is_none());
                    assert_eq!(
                        part.annotations[1].as_ref().unwrap()["url"],
                        "https://example.com"
                    );
                }
                other => panic!("unexpected part {other:?}"),
            },
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn argument_delta_initializes_function_call() {
        let mut r = StreamReconstructor::new();
        r.apply(event(json!({
            "type": "response.function_call_arguments.delta",
            "item_id": "fc_1",
            "output_index": 1,
            "delta": "{\"q\":"
        })))
        .unwrap();
        r.apply(event(json!({
            "type": "response.function_call_arguments.delta",
            "item_id": "fc_1",
            "output_index": 1,
            "delta": "\"sales\"}"
        })))
        .unwrap();
        let output = &r.snapshot().response.output;
        assert_eq!(output.len(), 2);
        match &output[1] {
            Some(OutputItem::FunctionCall(call)) => {
                assert_eq!(call.id.as_deref(), Some("fc_1"));
                assert_eq!(call.arguments, "{\"q\":\"sales\"}");
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test]
    async fn reconstruct_yields_one_pair_per_event() {
        let events = vec![
            Ok(created()),
            Ok(event(json!({"type": "response.audit.ping"}))),
            Ok(text_part_added(0, 0)),
            Ok(text_delta(0, 0, "Hi")),
        ];
        let pairs: Vec<_> = reconstruct(futures::stream::iter(events)).collect().await;
        let kinds: Vec<_> = pairs
            .iter()
            .map(|p| p.as_ref().unwrap().0.as_str())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "response.created",
                "response.audit.ping",
                "response.content_part.added",
                "response.output_text.delta"
            ]
        );
        let (_, last) = pairs.last().unwrap().as_ref().unwrap();
        assert_eq!(last.response.output_text(), "Hi");
    }

    #[tokio::test]
    async fn reconstruct_stops_after_error() {
        let events = vec![
            Ok(created()),
            Ok(text_delta(0, 0, "orphan")),
            Ok(text_part_added(0, 0)),
        ];
        let pairs: Vec<_> = reconstruct(futures::stream::iter(events)).collect().await;
        assert_eq!(pairs.len(), 2);
        assert!(pairs[1].is_err());
    }
}
