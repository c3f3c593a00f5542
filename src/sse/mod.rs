//! Server-sent event framing for the client event stream.
//!
//! A frame is `event: <type>\ndata: <json>\n\n`. [`FrameDecoder`] is the
//! consumer side: it accepts arbitrary chunk boundaries, joins multi-line
//! `data:` fields with `\n` and decodes them as JSON.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SluiceError};

/// Serialize one `(event_type, payload)` pair into a wire frame.
pub fn format_frame<T: Serialize + ?Sized>(event_type: &str, payload: &T) -> Result<String> {
    if event_type.contains(['\n', '\r']) {
        return Err(SluiceError::InvalidArgument(format!(
            "event type contains a line break: {event_type:?}"
        )));
    }
    let data = serde_json::to_string(payload)?;
    Ok(format!("event: {event_type}\ndata: {data}\n\n"))
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    pub data: Value,
}

/// Incremental frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &str) -> Result<Vec<Frame>> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=end).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.line(line)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(mut self) -> Result<Option<Frame>> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            if let Some(frame) = self.line(rest.trim_end_matches('\r'))? {
                return Ok(Some(frame));
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Result<Option<Frame>> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return Ok(None);
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Result<Option<Frame>> {
        let event = self.event.take();
        if self.data.is_empty() {
            return Ok(None);
        }
        let data = std::mem::take(&mut self.data).join("\n");
        let data = serde_json::from_str(&data)?;
        Ok(Some(Frame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        }))
    }
}

/// Decode a complete frame stream.
pub fn decode_frames(raw: &str) -> Result<Vec<Frame>> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(raw)?;
    frames.extend(decoder.finish()?);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn formats_single_frame() {
        let frame = format_frame("internal.process.started", &json!({"internal_status": "started"})).unwrap();
        assert_eq!(
            frame,
            "event: internal.process.started\ndata: {\"internal_status\":\"started\"}\n\n"
        );
    }

    #[test]
    fn rejects_line_breaks_in_event_type() {
        assert!(format_frame("bad\ntype", &json!({})).is_err());
    }

    #[test]
    fn decoder_handles_split_chunks() {
        let raw = format_frame("a", &json!({"n": 1})).unwrap() + &format_frame("b", &json!([2])).unwrap();
        let (head, tail) = raw.split_at(7);

        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.push(head).unwrap();
        assert!(frames.is_empty());
        frames.extend(decoder.push(tail).unwrap());

        assert_eq!(
            frames,
            vec![
                Frame { event: "a".into(), data: json!({"n": 1}) },
                Frame { event: "b".into(), data: json!([2]) },
            ]
        );
    }

    #[test]
    fn multi_line_data_is_joined() {
        let frames = decode_frames("event: x\ndata: {\"a\":\ndata: 1}\n\n").unwrap();
        assert_eq!(frames, vec![Frame { event: "x".into(), data: json!({"a": 1}) }]);
    }

    #[test]
    fn comments_and_crlf_are_tolerated() {
        let frames = decode_frames(": keep-alive\r\nevent: y\r\ndata: true\r\n\r\n").unwrap();
        assert_eq!(frames, vec![Frame { event: "y".into(), data: json!(true) }]);
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push("event: z\ndata: 3").unwrap().is_empty());
        assert_eq!(
            decoder.finish().unwrap(),
            Some(Frame { event: "z".into(), data: json!(3) })
        );
    }
}
