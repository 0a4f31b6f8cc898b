//! Server-pushed instruction events.
//!
//! During a call the server embeds an ordered `events` array in each status
//! response. Every event carries a call-scoped, strictly increasing
//! `idCallEvent`; the device must apply each event at most once and in order,
//! which [`tracker::EventTracker`] enforces.
//!
//! Wire shape of a single event:
//!
//! ```json
//! { "idCallEvent": 7, "event": { "cmd": "playbackVolume", "data": 80 } }
//! ```
//!
//! `data` is loosely typed on the wire — the server sends both `"80"` and
//! `80` for numeric payloads — so [`EventData`] accepts either.

pub mod settings;
pub mod tracker;

use serde::{Deserialize, Serialize};

/// Instruction kind pushed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCommand {
    #[serde(rename = "screen")]
    Screen,
    #[serde(rename = "playbackVolume")]
    PlaybackVolume,
    #[serde(rename = "digitalMicrophone")]
    DigitalMicrophone,
    #[serde(rename = "microphoneVolume")]
    MicrophoneVolume,
    #[serde(rename = "camera")]
    Camera,
    #[serde(rename = "videoSettings")]
    VideoSettings,
    /// Commands this firmware does not know; skipped but still advance the
    /// processed-event watermark.
    #[serde(other)]
    Unknown,
}

/// Loosely typed event payload: the server mixes string and integer forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Int(i64),
    Text(String),
}

impl EventData {
    /// Numeric view of the payload, parsing string payloads when needed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EventData::Int(v) => Some(*v),
            EventData::Text(s) => s.trim().parse().ok(),
        }
    }

    /// String view of the payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventData::Text(s) => Some(s.as_str()),
            EventData::Int(_) => None,
        }
    }
}

/// Inner `event` object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub cmd: EventCommand,
    pub data: EventData,
}

/// A single server-pushed event as delivered in a status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "idCallEvent")]
    pub id_call_event: i64,
    pub event: EventBody,
}

impl ServerEvent {
    pub fn command(&self) -> EventCommand {
        self.event.cmd
    }

    pub fn data(&self) -> &EventData {
        &self.event.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_from_wire_json() {
        let json = r#"{ "idCallEvent": 7, "event": { "cmd": "playbackVolume", "data": 80 } }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id_call_event, 7);
        assert_eq!(event.command(), EventCommand::PlaybackVolume);
        assert_eq!(event.data().as_i64(), Some(80));
    }

    #[test]
    fn test_string_payload_parses_numerically() {
        let json = r#"{ "idCallEvent": 1, "event": { "cmd": "microphoneVolume", "data": "150" } }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.data().as_i64(), Some(150));
    }

    #[test]
    fn test_unknown_command_does_not_fail_the_parse() {
        let json = r#"{ "idCallEvent": 3, "event": { "cmd": "holodeck", "data": "on" } }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.command(), EventCommand::Unknown);
    }
}
