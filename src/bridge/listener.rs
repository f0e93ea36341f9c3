//! Handshake listener.
//!
//! The single inbound-message dispatcher of a bridge. It settles connection
//! slots on READY and completes pending requests on RESPONSE; nothing else
//! removes entries from those tables except a caller's own timeout.
//!
//! Inbound traffic that is not for the bridge (other senders, unknown
//! origins, malformed data, duplicate or late responses) is dropped without
//! surfacing an error to anyone.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::identifiers::WindowId;
use crate::protocol::{Message, Response};
use crate::transport::MessageEvent;

use super::connection::ConnectionState;
use super::core::BridgeInner;

// ============================================================================
// Installation
// ============================================================================

/// Registers the dispatcher with the host, at most once per bridge.
///
/// The host only holds a weak reference, so a dropped bridge stops
/// reacting to messages.
pub(crate) fn ensure_installed(inner: &Arc<BridgeInner>) {
    inner.listener.get_or_init(|| {
        let weak = Arc::downgrade(inner);

        inner.host.add_message_listener(Arc::new(move |event: MessageEvent| {
            if let Some(inner) = weak.upgrade() {
                dispatch(&inner, event);
            }
        }));

        debug!("Message listener installed");
    });
}

// ============================================================================
// Dispatch
// ============================================================================

/// Routes one inbound message event.
pub(crate) fn dispatch(inner: &Arc<BridgeInner>, event: MessageEvent) {
    let MessageEvent {
        origin,
        source,
        data,
    } = event;

    let Some(message) = Message::from_value(data) else {
        trace!(origin = %origin, "Ignoring non-bridge message");
        return;
    };

    match message {
        Message::Ready => handle_ready(inner, &origin, source),
        Message::Response(response) => handle_response(inner, &origin, response),
        Message::Request(request) => {
            trace!(origin = %origin, request_id = %request.id, "Ignoring inbound request");
        }
    }
}

/// Settles the origin's slot with a connection bound to `source`.
fn handle_ready(inner: &BridgeInner, origin: &str, source: Option<WindowId>) {
    let Some(source) = source else {
        debug!(origin = %origin, "READY without source window ignored");
        return;
    };

    let slot = inner.state.lock().slots.get(origin).cloned();
    let Some(slot) = slot else {
        trace!(origin = %origin, "READY from origin without pending connect");
        return;
    };

    let state = Arc::new(ConnectionState::new(slot.origin().clone(), source.clone()));
    if slot.settle(state) {
        info!(origin = %origin, target = %source, "Extension frame ready");
    } else {
        debug!(origin = %origin, "Duplicate READY ignored");
    }
}

/// Completes the pending request matching `(origin, response.id)`.
fn handle_response(inner: &BridgeInner, origin: &str, response: Response) {
    let id = response.id;
    let responder = inner.state.lock().pending.take(origin, id);

    let Some(responder) = responder else {
        debug!(origin = %origin, request_id = %id, "Response for unknown request");
        return;
    };

    let is_error = response.is_error();
    if responder.send(response.into_result()).is_err() {
        trace!(origin = %origin, request_id = %id, "Requester went away before response");
        return;
    }

    trace!(origin = %origin, request_id = %id, is_error, "Response routed");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::bridge::Bridge;
    use crate::transport::ChannelHost;

    const ORIGIN: &str = "https://ext.example";

    #[test]
    fn test_listener_installed_once() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        ensure_installed(&bridge.inner);
        ensure_installed(&bridge.inner);
        let _a = bridge.connect("https://a.example").expect("connect");
        let _b = bridge.connect("https://b.example").expect("connect");

        assert_eq!(host.listener_count(), 1);
        assert!(bridge.is_listening());
    }

    #[test]
    fn test_response_from_other_origin_ignored() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        let _other = bridge.connect("https://other.example").expect("connect");
        let pending = bridge.connect(ORIGIN).expect("connect");

        host.deliver(MessageEvent::new(
            ORIGIN,
            Some(WindowId::from("w1")),
            json!({ "type": "ready" }),
        ));
        let connection = pending.try_get().expect("settled");
        let mut response = task::spawn(connection.request(json!(1)).expect("request"));

        host.deliver(MessageEvent::new(
            "https://other.example",
            None,
            json!({ "type": "response", "id": 0, "body": "spoofed" }),
        ));
        assert_pending!(response.poll());

        host.deliver(MessageEvent::new(
            ORIGIN,
            None,
            json!({ "type": "response", "id": 0, "body": "real" }),
        ));
        assert_eq!(assert_ready!(response.poll()).expect("ok"), json!("real"));
    }

    #[test]
    fn test_duplicate_response_ignored() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        let pending = bridge.connect(ORIGIN).expect("connect");
        host.deliver(MessageEvent::new(
            ORIGIN,
            Some(WindowId::from("w1")),
            json!({ "type": "ready" }),
        ));
        let connection = pending.try_get().expect("settled");

        let mut first = task::spawn(connection.request(json!(1)).expect("request"));
        let mut second = task::spawn(connection.request(json!(2)).expect("request"));

        let reply = json!({ "type": "response", "id": 0, "body": "once" });
        host.deliver(MessageEvent::new(ORIGIN, None, reply.clone()));
        host.deliver(MessageEvent::new(ORIGIN, None, reply));

        assert_eq!(assert_ready!(first.poll()).expect("ok"), json!("once"));
        assert_pending!(second.poll());
        assert_eq!(bridge.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_ready_keeps_first_window() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        let pending = bridge.connect(ORIGIN).expect("connect");

        for window in ["w1", "w2"] {
            host.deliver(MessageEvent::new(
                ORIGIN,
                Some(WindowId::from(window)),
                json!({ "type": "ready" }),
            ));
        }

        let connection = pending.try_get().expect("settled");
        assert_eq!(connection.target(), &WindowId::from("w1"));
    }

    #[test]
    fn test_inbound_request_ignored() {
        let (host, mut events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        let _pending = bridge.connect(ORIGIN).expect("connect");
        let _ = events.try_recv();

        host.deliver(MessageEvent::new(
            ORIGIN,
            Some(WindowId::from("w1")),
            json!({ "type": "request", "id": 0, "body": "hi" }),
        ));

        assert!(events.try_recv().is_err());
        assert_eq!(bridge.connection_count(), 0);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn test_dropped_bridge_stops_dispatch() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        drop(bridge.connect(ORIGIN).expect("connect"));
        drop(bridge);

        // Listener outlives the bridge but must not panic.
        host.deliver(MessageEvent::new(
            ORIGIN,
            Some(WindowId::from("w1")),
            json!({ "type": "ready" }),
        ));
        assert_eq!(host.listener_count(), 1);
    }
}
