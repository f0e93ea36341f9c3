//! Connection handle.
//!
//! A [`Connection`] is bound to one extension origin and to the frame window
//! that announced readiness. It allocates request ids, registers pending
//! entries and posts REQUEST messages; responses are routed back by the
//! listener.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::result::Result as StdResult;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{Origin, RequestId, WindowId};
use crate::protocol::Message;

use super::core::BridgeInner;

// ============================================================================
// ConnectionState
// ============================================================================

/// Per-origin connection state, owned by the registry slot.
///
/// Holds no reference back to the bridge so the slot map stays acyclic.
#[derive(Debug)]
pub(crate) struct ConnectionState {
    /// Extension origin.
    origin: Origin,
    /// Frame window taken from the READY event.
    target: WindowId,
    /// Next request id to hand out.
    next_request_id: AtomicU64,
}

impl ConnectionState {
    /// Creates state for a freshly announced frame.
    pub(crate) fn new(origin: Origin, target: WindowId) -> Self {
        Self {
            origin,
            target,
            next_request_id: AtomicU64::new(0),
        }
    }

    /// Allocates the next request id.
    #[inline]
    fn next_id(&self) -> RequestId {
        RequestId::new(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Handle for issuing requests to one extension frame.
///
/// Clones share the same id counter and bound window.
/// There is no close operation; the channel lives as long as the frame.
#[derive(Clone)]
pub struct Connection {
    /// Bridge state (pending table, host).
    bridge: Arc<BridgeInner>,
    /// Shared connection state.
    state: Arc<ConnectionState>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("origin", &self.state.origin)
            .field("target", &self.state.target)
            .field(
                "next_request_id",
                &self.state.next_request_id.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Pairs connection state with its bridge.
    pub(crate) fn from_parts(bridge: Arc<BridgeInner>, state: Arc<ConnectionState>) -> Self {
        Self { bridge, state }
    }

    /// Returns the extension origin this connection is bound to.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.state.origin
    }

    /// Returns the frame window this connection posts to.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &WindowId {
        &self.state.target
    }

    /// Returns `true` if both handles refer to the same connection.
    #[inline]
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Sends a request without waiting for the response.
    ///
    /// Allocates the next id, registers the pending entry and posts
    /// `{type: "request", id, body}` to the bound window, restricted to the
    /// bound origin. The returned future settles when the listener routes
    /// the matching response.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if `max_pending` requests are outstanding
    /// - [`Error::Json`] if the message cannot be serialized
    /// - any error from [`Host::post_message`](crate::transport::Host::post_message);
    ///   the pending entry is removed first
    pub fn request(&self, body: Value) -> Result<PendingResponse> {
        let id = self.state.next_id();
        let data = Message::request(id, body).to_value()?;
        let (tx, rx) = oneshot::channel();

        // Store correlation before sending
        self.bridge
            .state
            .lock()
            .pending
            .insert(&self.state.origin, id, tx, self.bridge.options.max_pending)?;

        if let Err(e) = self
            .bridge
            .host
            .post_message(&self.state.target, &self.state.origin, data)
        {
            self.bridge
                .state
                .lock()
                .pending
                .remove(self.state.origin.as_str(), id);
            debug!(origin = %self.state.origin, request_id = %id, error = %e, "Request post failed");
            return Err(e);
        }

        trace!(origin = %self.state.origin, request_id = %id, "Request sent");

        Ok(PendingResponse {
            id,
            origin: self.state.origin.clone(),
            bridge: Arc::downgrade(&self.bridge),
            rx,
        })
    }

    /// Sends a request and waits for its response.
    ///
    /// Uses the bridge's default request timeout if one is configured,
    /// otherwise waits until the response arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the extension answered with `err`
    /// - [`Error::RequestTimeout`] if the configured timeout expired
    /// - any error from [`Connection::request`]
    pub async fn call(&self, body: Value) -> Result<Value> {
        match self.bridge.options.request_timeout {
            Some(request_timeout) => self.call_with_timeout(body, request_timeout).await,
            None => self.request(body)?.await,
        }
    }

    /// Sends a request and waits at most `request_timeout` for its response.
    ///
    /// On expiry the pending entry is removed, so a late response is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the extension answered with `err`
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - any error from [`Connection::request`]
    pub async fn call_with_timeout(&self, body: Value, request_timeout: Duration) -> Result<Value> {
        let pending = self.request(body)?;
        let id = pending.id();

        // Expiry drops the future, which removes the pending entry
        match timeout(request_timeout, pending).await {
            Ok(result) => result,
            Err(_) => {
                debug!(origin = %self.state.origin, request_id = %id, "Request timed out");
                Err(Error::request_timeout(
                    id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns `true` if request `id` is still awaiting its response.
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.bridge
            .state
            .lock()
            .pending
            .contains(self.state.origin.as_str(), id)
    }

    /// Returns the number of requests awaiting a response on this connection.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.bridge
            .state
            .lock()
            .pending
            .len_for(self.state.origin.as_str())
    }
}

// ============================================================================
// PendingResponse
// ============================================================================

/// Future of one request's response.
///
/// Resolves to the response `body`, or to [`Error::Remote`] carrying the
/// response `err` verbatim. If the bridge is dropped first it resolves to
/// [`Error::ChannelClosed`].
///
/// Dropping the future abandons the request: its pending entry is removed
/// and a late response is ignored. Wrapping it in `tokio::time::timeout`
/// therefore bounds both the wait and the entry's lifetime.
#[derive(Debug)]
#[must_use = "a response is only observed by awaiting it"]
pub struct PendingResponse {
    /// Request id.
    id: RequestId,
    /// Origin the request was sent to.
    origin: Origin,
    /// Bridge holding the pending entry.
    bridge: Weak<BridgeInner>,
    /// Completion slot written by the listener.
    rx: oneshot::Receiver<StdResult<Value, Value>>,
}

impl PendingResponse {
    /// Returns the id allocated for this request.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(err)) => Err(Error::remote(err)),
            Err(e) => Err(Error::ChannelClosed(e)),
        })
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        let Some(bridge) = self.bridge.upgrade() else {
            return;
        };

        // No-op once the listener has taken the entry
        if bridge
            .state
            .lock()
            .pending
            .remove(self.origin.as_str(), self.id)
        {
            trace!(origin = %self.origin, request_id = %self.id, "Abandoned request removed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
