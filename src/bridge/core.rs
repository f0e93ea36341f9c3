//! Core bridge implementation.
//!
//! [`Bridge`] is the explicitly owned bridge state: the connection slots,
//! the pending-request table and the listener-installed flag, together with
//! the [`Host`] everything is routed through.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::Origin;
use crate::transport::Host;

use super::builder::BridgeBuilder;
use super::connection::Connection;
use super::options::BridgeOptions;
use super::pending::PendingTable;
use super::registry::ConnectionSlot;

// ============================================================================
// BridgeState
// ============================================================================

/// Tables guarded together by one lock.
#[derive(Default)]
pub(crate) struct BridgeState {
    /// Connection slot per origin.
    pub(crate) slots: FxHashMap<Origin, Arc<ConnectionSlot>>,
    /// Outstanding requests.
    pub(crate) pending: PendingTable,
}

// ============================================================================
// BridgeInner
// ============================================================================

/// Shared bridge internals.
pub(crate) struct BridgeInner {
    /// Document and messaging primitive.
    pub(crate) host: Arc<dyn Host>,
    /// Configuration.
    pub(crate) options: BridgeOptions,
    /// Slots and pending entries.
    pub(crate) state: Mutex<BridgeState>,
    /// Set once the message listener is registered with the host.
    pub(crate) listener: OnceLock<()>,
}

// ============================================================================
// Bridge
// ============================================================================

/// Page-side end of the extension bridge.
///
/// Clones share the same state. Connections and pending futures keep the
/// state alive; dropping every handle fails outstanding requests with
/// [`Error::ChannelClosed`](crate::Error::ChannelClosed).
///
/// # Example
///
/// ```ignore
/// let bridge = Bridge::new(host);
/// let connection = bridge.connect("https://ext.example")?.await?;
/// let reply = connection.call(json!({ "op": "ping" })).await?;
/// ```
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Bridge")
            .field("options", &self.inner.options)
            .field("slots", &state.slots.len())
            .field("pending", &state.pending.len())
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Constructors
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Creates a bridge with default options.
    #[must_use]
    pub fn new<H>(host: H) -> Self
    where
        H: Host + 'static,
    {
        Self::with_options(host, BridgeOptions::default())
    }

    /// Creates a bridge with already validated options.
    pub(crate) fn with_options<H>(host: H, options: BridgeOptions) -> Self
    where
        H: Host + 'static,
    {
        Self {
            inner: Arc::new(BridgeInner {
                host: Arc::new(host),
                options,
                state: Mutex::new(BridgeState::default()),
                listener: OnceLock::new(),
            }),
        }
    }
}

// ============================================================================
// Bridge - Accessors
// ============================================================================

impl Bridge {
    /// Returns the bridge configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Returns `true` once the message listener has been installed.
    #[inline]
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner.listener.get().is_some()
    }

    /// Returns the settled connection for `origin`, if any.
    ///
    /// `origin` is matched against the normalized serialization.
    #[must_use]
    pub fn connection(&self, origin: &str) -> Option<Connection> {
        let slot = Origin::parse(origin)
            .ok()
            .and_then(|origin| self.inner.state.lock().slots.get(&origin).cloned())?;

        slot.current()
            .map(|state| Connection::from_parts(Arc::clone(&self.inner), state))
    }

    /// Returns the number of origins `connect` has been called for.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    /// Returns the number of settled connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .slots
            .values()
            .filter(|slot| slot.is_settled())
            .count()
    }

    /// Returns the number of requests awaiting a response, across origins.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::WindowId;
    use crate::transport::{ChannelHost, MessageEvent};

    #[test]
    fn test_new_bridge_is_empty() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        assert!(!bridge.is_listening());
        assert_eq!(bridge.slot_count(), 0);
        assert_eq!(bridge.connection_count(), 0);
        assert_eq!(bridge.pending_count(), 0);
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_connection_lookup() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let _pending = bridge.connect("https://ext.example").expect("connect");
        assert!(bridge.connection("https://ext.example").is_none());
        assert_eq!(bridge.slot_count(), 1);
        assert_eq!(bridge.connection_count(), 0);

        host.deliver(MessageEvent::new(
            "https://ext.example",
            Some(WindowId::from("w1")),
            json!({ "type": "ready" }),
        ));

        let connection = bridge
            .connection("https://ext.example/any/path")
            .expect("settled");
        assert_eq!(connection.target(), &WindowId::from("w1"));
        assert_eq!(bridge.connection_count(), 1);
        assert!(bridge.connection("not an origin").is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host);
        let other = bridge.clone();

        let _pending = bridge.connect("https://ext.example").expect("connect");
        assert_eq!(other.slot_count(), 1);
        assert!(other.is_listening());
    }

    #[test]
    fn test_debug_format() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host);
        let debug = format!("{bridge:?}");
        assert!(debug.contains("Bridge"));
        assert!(debug.contains("embed.html"));
    }
}
