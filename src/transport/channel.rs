//! In-process host backed by tokio channels.
//!
//! Outbound host operations become [`HostEvent`]s on an unbounded channel;
//! inbound message events are handed to [`ChannelHost::deliver`] (or fed
//! through [`ChannelHost::spawn_inbound`]). Useful when the embedding
//! environment lives in the same process, and for tests.
//!
//! # Example
//!
//! ```ignore
//! let (host, mut events) = ChannelHost::new();
//! let bridge = Bridge::builder().build(host.clone())?;
//!
//! let pending = bridge.connect("https://ext.example")?;
//! // events.recv() yields HostEvent::FrameInserted(..)
//!
//! host.deliver(MessageEvent::new(
//!     "https://ext.example",
//!     Some(WindowId::from("w1")),
//!     json!({ "type": "ready" }),
//! ));
//! let connection = pending.await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{Origin, WindowId};

use super::{HiddenFrame, Host, Listeners, MessageEvent, MessageListener};

// ============================================================================
// HostEvent
// ============================================================================

/// An outbound host operation recorded by [`ChannelHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A hidden frame was inserted.
    FrameInserted(HiddenFrame),
    /// A message was posted to a frame window.
    PostMessage {
        /// Target window handle.
        target: WindowId,
        /// Origin the recipient must have.
        target_origin: Origin,
        /// Message payload.
        data: Value,
    },
}

// ============================================================================
// ChannelHost
// ============================================================================

/// Host whose document lives on the other end of a tokio channel.
///
/// Clones share the same channel, frame list and listeners.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    /// Outbound operations.
    events_tx: mpsc::UnboundedSender<HostEvent>,
    /// Registered inbound listeners.
    listeners: Listeners,
    /// Frames inserted so far.
    frames: Arc<Mutex<Vec<HiddenFrame>>>,
}

impl ChannelHost {
    /// Creates a host and the receiver of its outbound operations.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let host = Self {
            events_tx,
            listeners: Listeners::default(),
            frames: Arc::new(Mutex::new(Vec::new())),
        };

        (host, events_rx)
    }

    /// Dispatches an inbound message event to every listener.
    pub fn deliver(&self, event: MessageEvent) {
        trace!(origin = %event.origin, "Delivering message event");
        self.listeners.dispatch(event);
    }

    /// Spawns a task that delivers every event received on `inbound`,
    /// in order, until the sender side closes.
    pub fn spawn_inbound(&self, mut inbound: mpsc::UnboundedReceiver<MessageEvent>) -> JoinHandle<()> {
        let host = self.clone();

        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                host.deliver(event);
            }
            debug!("Inbound channel closed");
        })
    }

    /// Returns the frames inserted so far.
    #[must_use]
    pub fn frames(&self) -> Vec<HiddenFrame> {
        self.frames.lock().clone()
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Sends an outbound operation.
    fn emit(&self, event: HostEvent) -> Result<()> {
        self.events_tx
            .send(event)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Host for ChannelHost {
    fn insert_hidden_frame(&self, frame: &HiddenFrame) -> Result<()> {
        self.emit(HostEvent::FrameInserted(frame.clone()))?;
        self.frames.lock().push(frame.clone());
        debug!(frame_id = %frame.id, src = %frame.src, "Hidden frame inserted");
        Ok(())
    }

    fn post_message(&self, target: &WindowId, target_origin: &Origin, data: Value) -> Result<()> {
        self.emit(HostEvent::PostMessage {
            target: target.clone(),
            target_origin: target_origin.clone(),
            data,
        })
    }

    fn add_message_listener(&self, listener: MessageListener) {
        self.listeners.add(listener);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn origin() -> Origin {
        Origin::parse("https://ext.example").expect("valid")
    }

    #[test]
    fn test_insert_frame_emits_event() {
        let (host, mut events) = ChannelHost::new();
        let frame = HiddenFrame::new(origin(), "embed.html").expect("frame");

        host.insert_hidden_frame(&frame).expect("insert");

        assert_eq!(host.frames(), vec![frame.clone()]);
        assert_eq!(events.try_recv().ok(), Some(HostEvent::FrameInserted(frame)));
    }

    #[test]
    fn test_post_message_emits_event() {
        let (host, mut events) = ChannelHost::new();
        host.post_message(&WindowId::from("w1"), &origin(), json!(1))
            .expect("post");

        assert_eq!(
            events.try_recv().ok(),
            Some(HostEvent::PostMessage {
                target: WindowId::from("w1"),
                target_origin: origin(),
                data: json!(1),
            })
        );
    }

    #[test]
    fn test_closed_receiver_fails() {
        let (host, events) = ChannelHost::new();
        drop(events);

        let err = host
            .post_message(&WindowId::from("w1"), &origin(), json!(1))
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        let frame = HiddenFrame::new(origin(), "embed.html").expect("frame");
        assert!(host.insert_hidden_frame(&frame).is_err());
        assert!(host.frames().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_inbound_delivers_in_order() {
        let (host, _events) = ChannelHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        host.add_message_listener(Arc::new(move |event: MessageEvent| {
            sink.lock().push(event.data);
        }));

        let (tx, rx) = mpsc::unbounded_channel();
        let task = host.spawn_inbound(rx);

        for n in 0..5 {
            tx.send(MessageEvent::new("https://ext.example", None, json!(n)))
                .expect("send");
        }
        drop(tx);
        task.await.expect("task");

        assert_eq!(
            *seen.lock(),
            vec![json!(0), json!(1), json!(2), json!(3), json!(4)]
        );
    }
}
