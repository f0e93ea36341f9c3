//! Wire message types.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ready` | Extension → Page | Frame loaded, accepts requests |
//! | `request` | Page → Extension | Request with connection-scoped id |
//! | `response` | Extension → Page | `body` on success, `err` on failure |
//!
//! Messages travel through the host's cross-document messaging primitive.
//! When the host is the WebSocket relay, each host operation is additionally
//! wrapped in an [`Envelope`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Relay envelopes |
//! | `message` | Bridge messages |

// ============================================================================
// Submodules
// ============================================================================

/// Relay envelope types.
pub mod envelope;

/// Bridge message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::Envelope;
pub use message::{Message, Request, Response};
