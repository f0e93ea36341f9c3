//! Relay envelope types.
//!
//! Envelopes wrap host operations so they can travel over the relay
//! WebSocket between the local end (Rust) and the browser-side shim that owns
//! the real document.
//!
//! | Kind | Direction | Purpose |
//! |------|-----------|---------|
//! | `insertFrame` | Local → Shim | Insert a hidden frame |
//! | `postMessage` | Local → Shim | `postMessage` to a frame window |
//! | `message` | Shim → Local | Inbound message event |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{FrameId, Origin, WindowId};
use crate::transport::{HiddenFrame, MessageEvent};

// ============================================================================
// Envelope
// ============================================================================

/// A relay envelope, discriminated by its `kind` field.
///
/// # Format
///
/// ```json
/// { "kind": "insertFrame", "frameId": "uuid", "src": "https://ext.example/embed.html" }
/// { "kind": "postMessage", "target": "w1", "targetOrigin": "https://ext.example", "data": { ... } }
/// { "kind": "message", "origin": "https://ext.example", "source": "w1", "data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Envelope {
    /// Insert a hidden frame into the document.
    #[serde(rename_all = "camelCase")]
    InsertFrame {
        /// Frame identifier chosen by the bridge.
        frame_id: FrameId,
        /// Frame source URL.
        src: String,
    },

    /// Post a message to a frame window, restricted to an origin.
    #[serde(rename_all = "camelCase")]
    PostMessage {
        /// Target window handle.
        target: WindowId,
        /// Origin the recipient must have.
        target_origin: Origin,
        /// Message payload.
        data: Value,
    },

    /// An inbound message event observed by the shim.
    Message(MessageEvent),
}

impl Envelope {
    /// Creates an `insertFrame` envelope.
    #[inline]
    #[must_use]
    pub fn insert_frame(frame: &HiddenFrame) -> Self {
        Self::InsertFrame {
            frame_id: frame.id,
            src: frame.src.to_string(),
        }
    }

    /// Creates a `postMessage` envelope.
    #[inline]
    #[must_use]
    pub fn post_message(target: &WindowId, target_origin: &Origin, data: Value) -> Self {
        Self::PostMessage {
            target: target.clone(),
            target_origin: target_origin.clone(),
            data,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_insert_frame_format() {
        let origin = Origin::parse("https://ext.example").expect("valid");
        let frame = HiddenFrame::new(origin, "embed.html").expect("frame");
        let value = serde_json::to_value(Envelope::insert_frame(&frame)).expect("serialize");

        assert_eq!(value["kind"], "insertFrame");
        assert_eq!(value["src"], "https://ext.example/embed.html");
        assert_eq!(value["frameId"], json!(frame.id.to_string()));
    }

    #[test]
    fn test_post_message_format() {
        let origin = Origin::parse("https://ext.example").expect("valid");
        let envelope = Envelope::post_message(&WindowId::from("w1"), &origin, json!({ "a": 1 }));
        let value = serde_json::to_value(envelope).expect("serialize");

        assert_eq!(
            value,
            json!({
                "kind": "postMessage",
                "target": "w1",
                "targetOrigin": "https://ext.example",
                "data": { "a": 1 }
            })
        );
    }

    #[test]
    fn test_parse_message() {
        let envelope: Envelope = serde_json::from_value(json!({
            "kind": "message",
            "origin": "https://ext.example",
            "source": "w1",
            "data": { "type": "ready" }
        }))
        .expect("parse");

        let Envelope::Message(event) = envelope else {
            panic!("expected message");
        };
        assert_eq!(event.origin, "https://ext.example");
        assert_eq!(event.source, Some(WindowId::from("w1")));
        assert_eq!(event.data, json!({ "type": "ready" }));
    }

    #[test]
    fn test_parse_message_without_source() {
        let envelope: Envelope = serde_json::from_value(json!({
            "kind": "message",
            "origin": "https://other.example",
            "data": 1
        }))
        .expect("parse");

        let Envelope::Message(event) = envelope else {
            panic!("expected message");
        };
        assert!(event.source.is_none());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = serde_json::from_value::<Envelope>(json!({ "kind": "reload" }));
        assert!(result.is_err());
    }
}
