//! Relay frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{DecodeError, WireCredential};

/// Signalling events exchanged over the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEvent {
    Connecting,
    Waiting,
    Ready,
    Closed,
    Error,
    /// Room already holds two peers.
    Busy,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::Connecting => "connecting",
            SessionEvent::Waiting => "waiting",
            SessionEvent::Ready => "ready",
            SessionEvent::Closed => "closed",
            SessionEvent::Error => "error",
            SessionEvent::Busy => "busy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventFrame {
    event: SessionEvent,
}

/// One text message on the relay socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(SessionEvent),
    /// A wire credential relayed from the scanning device. Recognised by its
    /// `response` member.
    Credential(WireCredential),
    /// Valid JSON that is neither of the above. Ignored by the session.
    Unknown(Value),
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;

        if value.get("response").is_some() {
            return Ok(Frame::Credential(serde_json::from_value(value)?));
        }

        if value.get("event").is_some() {
            if let Ok(frame) = serde_json::from_value::<EventFrame>(value.clone()) {
                return Ok(Frame::Event(frame.event));
            }
        }

        Ok(Frame::Unknown(value))
    }

    pub fn to_text(&self) -> String {
        let value = match self {
            Frame::Event(event) => serde_json::json!({ "event": event }),
            Frame::Credential(wire) => serde_json::to_value(wire).unwrap_or(Value::Null),
            Frame::Unknown(value) => value.clone(),
        };
        value.to_string()
    }

    pub fn event_text(event: SessionEvent) -> String {
        Frame::Event(event).to_text()
    }
}
