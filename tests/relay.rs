//! Bridge over the WebSocket relay.
//!
//! A tungstenite client stands in for the browser-side shim: it performs
//! frame insertions by replying READY and answers posted requests.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use webext_bridge::{Bridge, RelayServer, WindowId};

const EXT: &str = "https://ext.example";

/// Runs a shim that handles envelopes until the socket closes.
///
/// Returns every envelope it received.
async fn run_shim(ws_url: String) -> Vec<Value> {
    let (mut socket, _) = connect_async(ws_url).await.expect("shim connect");
    let mut received = Vec::new();

    while let Some(Ok(frame)) = socket.next().await {
        let WsMessage::Text(text) = frame else {
            continue;
        };
        let envelope: Value = serde_json::from_str(&text).expect("envelope json");

        let reply = match envelope["kind"].as_str() {
            Some("insertFrame") => Some(json!({
                "kind": "message",
                "origin": EXT,
                "source": "frame-1",
                "data": { "type": "ready" },
            })),
            Some("postMessage") => {
                let data = &envelope["data"];
                Some(json!({
                    "kind": "message",
                    "origin": envelope["targetOrigin"],
                    "source": envelope["target"],
                    "data": {
                        "type": "response",
                        "id": data["id"],
                        "body": { "pong": data["body"] },
                    },
                }))
            }
            _ => None,
        };

        received.push(envelope);

        if let Some(reply) = reply {
            let text = serde_json::to_string(&reply).expect("serialize");
            if socket.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    }

    received
}

#[tokio::test]
async fn test_roundtrip_over_relay() {
    let server = RelayServer::bind_localhost().await.expect("bind");
    let shim = tokio::spawn(run_shim(server.ws_url()));

    let host = server
        .accept_with_timeout(Duration::from_secs(5))
        .await
        .expect("accept");
    let bridge = Bridge::new(host.clone());

    let connection = bridge
        .connect(EXT)
        .expect("connect")
        .wait_timeout(Duration::from_secs(5))
        .await
        .expect("ready");
    assert_eq!(connection.target(), &WindowId::from("frame-1"));

    let reply = connection
        .call_with_timeout(json!("ping"), Duration::from_secs(5))
        .await
        .expect("reply");
    assert_eq!(reply, json!({ "pong": "ping" }));

    host.shutdown();
    let received = tokio::time::timeout(Duration::from_secs(5), shim)
        .await
        .expect("shim finished")
        .expect("shim task");

    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["kind"], "insertFrame");
    assert_eq!(received[0]["src"], "https://ext.example/embed.html");
    assert_eq!(received[1]["kind"], "postMessage");
    assert_eq!(received[1]["targetOrigin"], EXT);
    assert_eq!(received[1]["target"], "frame-1");
    assert_eq!(
        received[1]["data"],
        json!({ "type": "request", "id": 0, "body": "ping" })
    );
}

#[tokio::test]
async fn test_closed_relay_fails_requests() {
    let server = RelayServer::bind_localhost().await.expect("bind");
    let shim = tokio::spawn(run_shim(server.ws_url()));

    let host = server
        .accept_with_timeout(Duration::from_secs(5))
        .await
        .expect("accept");
    let bridge = Bridge::new(host.clone());
    let connection = bridge
        .connect(EXT)
        .expect("connect")
        .wait_timeout(Duration::from_secs(5))
        .await
        .expect("ready");

    // Operations fail as soon as shutdown is requested, not once the
    // event loop gets around to closing the socket.
    host.shutdown();
    assert!(host.is_closed());

    let err = connection.request(json!("late")).expect_err("closed");
    assert!(err.is_connection_error());
    assert_eq!(bridge.pending_count(), 0);

    let _ = tokio::time::timeout(Duration::from_secs(5), shim).await;
    assert!(host.is_closed());
}
