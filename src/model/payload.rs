//! Signaling frames
//!
//! Every message on the wire, in either direction and over either transport, is
//! a JSON envelope `{"event": "<name>", "data": <any JSON>}`. The relay only
//! looks at `event`; `data` is carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{value::RawValue, Value};

/// Named signaling events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    Offer,
    Answer,
    IceCandidate,
    Broadcast,
    /// Server-originated; sent to the remaining peers when one leaves.
    PeerDisconnected,
}

/// A signaling envelope.
///
/// `data` keeps the sender's exact JSON text. A present `null` is
/// `Some("null")`; only a missing field is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: Event,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Box<RawValue>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Frames are equal when their payloads are the same text.
impl PartialEq for Frame {
    fn eq(&self, other: &Frame) -> bool {
        self.event == other.event
            && self.data.as_deref().map(RawValue::get) == other.data.as_deref().map(RawValue::get)
    }
}

impl Frame {
    /// Build a frame around a server-side value, encoded compactly.
    pub fn new(event: Event, data: impl Into<Value>) -> Frame {
        Frame {
            event,
            // Encoding a `Value` cannot fail.
            data: serde_json::value::to_raw_value(&data.into()).ok(),
        }
    }

    pub fn peer_disconnected() -> Frame {
        Frame {
            event: Event::PeerDisconnected,
            data: None,
        }
    }

    pub fn parse(text: &str) -> Result<Frame, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse either a single envelope or a JSON array of envelopes.
    pub fn parse_batch(text: &str) -> Result<Vec<Frame>, serde_json::Error> {
        if text.trim_start().starts_with('[') {
            serde_json::from_str(text)
        } else {
            Frame::parse(text).map(|frame| vec![frame])
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
