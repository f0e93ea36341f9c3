//! Host transport layer.
//!
//! The bridge never touches a document directly. Everything it needs from
//! the embedding environment (inserting the hidden frame, posting to the
//! frame window, observing inbound message events) goes through the
//! [`Host`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │        Host trait            │  Extension      │
//! │                 │  insert_hidden_frame ───────►│  frame          │
//! │  Registry       │  post_message ──────────────►│  (hidden)       │
//! │  Listener  ◄────┼── message events ────────────│                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | In-process host backed by tokio channels |
//! | `relay` | Host that forwards operations over a WebSocket |
//! | `server` | WebSocket server the browser-side shim connects to |

// ============================================================================
// Submodules
// ============================================================================

/// In-process host backed by tokio channels.
pub mod channel;

/// WebSocket relay host and event loop.
pub mod relay;

/// WebSocket server for the browser-side shim.
pub mod server;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::identifiers::{FrameId, Origin, WindowId};

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelHost, HostEvent};
pub use relay::RelayHost;
pub use server::RelayServer;

// ============================================================================
// Types
// ============================================================================

/// Inbound message listener callback.
///
/// Called once per message event, in arrival order.
pub type MessageListener = Arc<dyn Fn(MessageEvent) + Send + Sync>;

// ============================================================================
// MessageEvent
// ============================================================================

/// An inbound cross-document message as observed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Serialized origin of the sender, as reported by the host.
    pub origin: String,

    /// Sender window handle, when the host exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<WindowId>,

    /// Message payload.
    #[serde(default)]
    pub data: Value,
}

impl MessageEvent {
    /// Creates a message event.
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, source: Option<WindowId>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source,
            data,
        }
    }
}

// ============================================================================
// HiddenFrame
// ============================================================================

/// A hidden frame the bridge asks the host to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenFrame {
    /// Frame identifier.
    pub id: FrameId,
    /// Origin the frame is loaded from.
    pub origin: Origin,
    /// Frame source URL, `origin` joined with the entry path.
    pub src: Url,
}

impl HiddenFrame {
    /// Describes a frame loading `entry_path` under `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if the path cannot be joined.
    pub fn new(origin: Origin, entry_path: &str) -> Result<Self> {
        let src = origin.join(entry_path)?;
        Ok(Self {
            id: FrameId::generate(),
            origin,
            src,
        })
    }
}

// ============================================================================
// Host
// ============================================================================

/// The embedding environment: a document plus its messaging primitive.
///
/// All methods are non-blocking.
pub trait Host: Send + Sync {
    /// Inserts a hidden frame into the document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] or [`crate::Error::ConnectionClosed`]
    /// if the frame cannot be inserted.
    fn insert_hidden_frame(&self, frame: &HiddenFrame) -> Result<()>;

    /// Posts `data` to `target`, delivered only if the target window's
    /// origin equals `target_origin`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Host`] or [`crate::Error::ConnectionClosed`]
    /// if the message cannot be posted.
    fn post_message(&self, target: &WindowId, target_origin: &Origin, data: Value) -> Result<()>;

    /// Registers a listener for every inbound message event.
    fn add_message_listener(&self, listener: MessageListener);
}

// ============================================================================
// Listeners
// ============================================================================

/// Listener list shared by the host implementations.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<RwLock<Vec<MessageListener>>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

impl Listeners {
    /// Registers a listener.
    pub fn add(&self, listener: MessageListener) {
        self.inner.write().push(listener);
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if no listener is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener.
    ///
    /// The list is snapshotted first so listeners may register further
    /// listeners without deadlocking.
    pub fn dispatch(&self, event: MessageEvent) {
        let snapshot: Vec<MessageListener> = self.inner.read().clone();

        for listener in snapshot {
            listener(event.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
