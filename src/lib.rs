//! WebExt Bridge - Promise-style request/response channel between a web page
//! and a privileged extension frame.
//!
//! A page asks the bridge to [`connect`](Bridge::connect) to an extension
//! origin. The bridge inserts a hidden frame pointing at that origin's entry
//! page and waits for the frame to announce itself with a READY message.
//! The resulting [`Connection`] sends numbered requests to the frame and
//! completes each [`PendingResponse`] when the matching response arrives.
//!
//! # Architecture
//!
//! - **Requester (this crate)**: Owns connections and outstanding requests
//! - **Responder (extension frame)**: Posts READY once, answers each request
//! - **Host**: Document and cross-origin messaging primitive ([`Host`])
//!
//! Key design principles:
//!
//! - One connection per origin, one hidden frame per origin
//! - Responses are matched by `(origin, id)`, never by arrival order
//! - Messages that do not belong to the bridge are ignored, not surfaced
//! - No built-in timeout or reconnection unless configured
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use webext_bridge::{Bridge, RelayServer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Wait for the browser-side shim to dial in
//!     let server = RelayServer::bind_localhost().await?;
//!     println!("Shim should connect to {}", server.ws_url());
//!     let host = server.accept().await?;
//!
//!     // Connect to the extension and issue a request
//!     let bridge = Bridge::new(host);
//!     let connection = bridge.connect("https://ext.example")?.await?;
//!     let reply = connection.call(json!({ "op": "ping" })).await?;
//!     println!("Reply: {reply}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`], [`Connection`] and their futures |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Bridge and relay message types |
//! | [`transport`] | [`Host`] trait and its implementations |

// ============================================================================
// Modules
// ============================================================================

/// Page-side bridge: connection registry, handshake, requests.
///
/// Use [`Bridge::new()`] or [`Bridge::builder()`] to create a bridge.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for origins, requests, windows and frames.
pub mod identifiers;

/// Bridge message types and relay envelopes.
pub mod protocol;

/// Host abstraction over the document and messaging primitive.
///
/// Includes an in-process host and a WebSocket relay host.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    Bridge, BridgeBuilder, BridgeOptions, Connection, PendingConnection, PendingResponse,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{FrameId, Origin, RequestId, WindowId};

// Protocol types
pub use protocol::Message;

// Transport types
pub use transport::{ChannelHost, HiddenFrame, Host, HostEvent, MessageEvent, RelayHost, RelayServer};
