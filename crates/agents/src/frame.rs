//! UI message-stream frames.
//!
//! One response is exactly:
//!
//! ```text
//! start → text-start → text-delta* → text-end → finish{stop|error}
//! ```
//!
//! Frames serialize to the JSON objects a browser client expects, one per
//! SSE `data:` line. The responding handler travels on `start` as
//! `handlerId`; deltas carry only generated text.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `x-vercel-ai-ui-message-stream` response header.
pub const STREAM_PROTOCOL_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Frame {
    Start {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "handlerId", default, skip_serializing_if = "Option::is_none")]
        handler_id: Option<String>,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    Finish {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
    },
}

impl Frame {
    /// JSON payload for one SSE `data:` line.
    pub fn to_json(&self) -> String {
        // Frames contain only strings and enums
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn delta(&self) -> Option<&str> {
        match self {
            Self::TextDelta { delta, .. } => Some(delta),
            _ => None,
        }
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self {
            Self::Finish { finish_reason, .. } => Some(*finish_reason),
            _ => None,
        }
    }
}

/// Ids shared by every frame of one response.
#[derive(Debug, Clone)]
pub struct FrameIds {
    pub message_id: String,
    pub text_id: String,
}

impl FrameIds {
    pub fn new() -> Self {
        Self {
            message_id: format!("msg_{}", Uuid::new_v4().simple()),
            text_id: format!("text_{}", Uuid::new_v4().simple()),
        }
    }

    pub fn start(&self, handler_id: Option<&str>) -> Frame {
        Frame::Start {
            message_id: self.message_id.clone(),
            handler_id: handler_id.map(str::to_string),
        }
    }

    pub fn text_start(&self) -> Frame {
        Frame::TextStart {
            id: self.text_id.clone(),
        }
    }

    pub fn delta(&self, text: impl Into<String>) -> Frame {
        Frame::TextDelta {
            id: self.text_id.clone(),
            delta: text.into(),
        }
    }

    pub fn text_end(&self) -> Frame {
        Frame::TextEnd {
            id: self.text_id.clone(),
        }
    }

    pub fn finish(&self, reason: FinishReason) -> Frame {
        Frame::Finish {
            message_id: self.message_id.clone(),
            finish_reason: reason,
        }
    }

    /// A complete single-delta response, used for fail-soft replies.
    pub fn whole(&self, handler_id: Option<&str>, text: &str, reason: FinishReason) -> Vec<Frame> {
        vec![
            self.start(handler_id),
            self.text_start(),
            self.delta(text),
            self.text_end(),
            self.finish(reason),
        ]
    }
}

impl Default for FrameIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks the frame grammar, returning a description of the first violation.
pub fn validate_sequence(frames: &[Frame]) -> Result<(), String> {
    let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
        return Err("empty frame sequence".into());
    };

    let Frame::Start { message_id, .. } = first else {
        return Err(format!("first frame must be start, got {first:?}"));
    };
    let Some(Frame::TextStart { id: text_id }) = frames.get(1) else {
        return Err("second frame must be text-start".into());
    };
    let Frame::Finish {
        message_id: finish_id,
        ..
    } = last
    else {
        return Err(format!("last frame must be finish, got {last:?}"));
    };
    if finish_id != message_id {
        return Err("finish messageId does not match start".into());
    }
    if frames.len() < 4 {
        return Err("sequence too short".into());
    }
    match &frames[frames.len() - 2] {
        Frame::TextEnd { id } if id == text_id => {}
        other => return Err(format!("frame before finish must be text-end, got {other:?}")),
    }
    for frame in &frames[2..frames.len() - 2] {
        match frame {
            Frame::TextDelta { id, .. } if id == text_id => {}
            other => return Err(format!("unexpected frame in body: {other:?}")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_serializes_with_handler_id() {
        let frame = Frame::Start {
            message_id: "msg_1".into(),
            handler_id: Some("twitter".into()),
        };
        assert_eq!(
            frame.to_json(),
            r#"{"type":"start","messageId":"msg_1","handlerId":"twitter"}"#
        );
    }

    #[test]
    fn start_without_handler_omits_field() {
        let frame = Frame::Start {
            message_id: "msg_1".into(),
            handler_id: None,
        };
        assert_eq!(frame.to_json(), r#"{"type":"start","messageId":"msg_1"}"#);
    }

    #[test]
    fn body_frames_serialize_kebab_case() {
        let ids = FrameIds {
            message_id: "msg_a".into(),
            text_id: "text_b".into(),
        };
        assert_eq!(ids.text_start().to_json(), r#"{"type":"text-start","id":"text_b"}"#);
        assert_eq!(
            ids.delta("Hi").to_json(),
            r#"{"type":"text-delta","id":"text_b","delta":"Hi"}"#
        );
        assert_eq!(ids.text_end().to_json(), r#"{"type":"text-end","id":"text_b"}"#);
        assert_eq!(
            ids.finish(FinishReason::Error).to_json(),
            r#"{"type":"finish","messageId":"msg_a","finishReason":"error"}"#
        );
    }

    #[test]
    fn ids_have_prefixes() {
        let ids = FrameIds::new();
        assert!(ids.message_id.starts_with("msg_"));
        assert!(ids.text_id.starts_with("text_"));
        assert_eq!(ids.message_id.len(), 4 + 32);
        assert!(!ids.text_id.contains('-'));
    }

    #[test]
    fn frames_deserialize() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"finish","messageId":"m","finishReason":"stop"}"#).unwrap();
        assert_eq!(frame.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn whole_response_is_well_formed() {
        let ids = FrameIds::new();
        let frames = ids.whole(None, "oops", FinishReason::Error);
        assert!(validate_sequence(&frames).is_ok());
        assert_eq!(frames[2].delta(), Some("oops"));
    }

    #[test]
    fn validation_rejects_malformed_sequences() {
        let ids = FrameIds::new();
        assert!(validate_sequence(&[]).is_err());

        let missing_end = vec![ids.start(None), ids.text_start(), ids.finish(FinishReason::Stop)];
        assert!(validate_sequence(&missing_end).is_err());

        let mut misplaced = ids.whole(None, "x", FinishReason::Stop);
        misplaced.insert(2, ids.start(None));
        assert!(validate_sequence(&misplaced).is_err());

        let empty_body = vec![
            ids.start(Some("email")),
            ids.text_start(),
            ids.text_end(),
            ids.finish(FinishReason::Stop),
        ];
        assert!(validate_sequence(&empty_body).is_ok());
    }
}
