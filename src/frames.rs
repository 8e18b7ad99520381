// src/frames.rs
//! Line-oriented stream protocol consumed by the browser's chat hook.
//!
//! Every frame is one `\n`-terminated line: a type tag, `:`, then JSON.
//! JSON string escaping guarantees the payload never contains a raw newline.
//!
//! | frame     | tag | payload |
//! |-----------|-----|---------|
//! | text      | `0` | string  |
//! | data      | `2` | array   |
//! | error     | `3` | string  |
//! | finish    | `d` | object  |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishPayload {
    pub finish_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    TextDelta(String),
    Data(Vec<Value>),
    Error(String),
    Finish(FinishPayload),
}

impl StreamFrame {
    pub fn finish(reason: impl Into<String>, usage: Option<Usage>) -> Self {
        StreamFrame::Finish(FinishPayload {
            finish_reason: reason.into(),
            usage,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Error(_) | StreamFrame::Finish(_))
    }

    fn tag(&self) -> char {
        match self {
            StreamFrame::TextDelta(_) => '0',
            StreamFrame::Data(_) => '2',
            StreamFrame::Error(_) => '3',
            StreamFrame::Finish(_) => 'd',
        }
    }
}

/// Encode one frame as a protocol line (trailing newline included).
pub fn encode(frame: &StreamFrame) -> String {
    let payload = match frame {
        StreamFrame::TextDelta(s) | StreamFrame::Error(s) => serde_json::to_string(s),
        StreamFrame::Data(values) => serde_json::to_string(values),
        StreamFrame::Finish(p) => serde_json::to_string(p),
    }
    // strings, arrays of Values and plain structs always serialize
    .unwrap_or_else(|_| "null".to_string());

    let mut line = String::with_capacity(payload.len() + 3);
    line.push(frame.tag());
    line.push(':');
    line.push_str(&payload);
    line.push('\n');
    line
}

#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("line has no type tag")]
    MissingTag,
    #[error("unknown frame tag {0:?}")]
    UnknownTag(String),
    #[error("invalid payload for tag {tag}: {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Inverse of [`encode`]. Accepts the line with or without its newline.
pub fn decode(line: &str) -> Result<StreamFrame, FrameDecodeError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let (tag, payload) = line.split_once(':').ok_or(FrameDecodeError::MissingTag)?;

    let wrap = |source: serde_json::Error| FrameDecodeError::Payload {
        tag: tag.to_string(),
        source,
    };
    Ok(match tag {
        "0" => StreamFrame::TextDelta(serde_json::from_str(payload).map_err(wrap)?),
        "2" => StreamFrame::Data(serde_json::from_str(payload).map_err(wrap)?),
        "3" => StreamFrame::Error(serde_json::from_str(payload).map_err(wrap)?),
        "d" => StreamFrame::Finish(serde_json::from_str(payload).map_err(wrap)?),
        other => return Err(FrameDecodeError::UnknownTag(other.to_string())),
    })
}

/// Decode a whole response body, one frame per line.
pub fn decode_body(body: &str) -> Result<Vec<StreamFrame>, FrameDecodeError> {
    body.lines().filter(|l| !l.is_empty()).map(decode).collect()
}
