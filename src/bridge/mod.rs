//! Page-side bridge.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Owned bridge state and entry point ([`Bridge::connect`]) |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Entry path, pending bound, default timeout |
//! | [`PendingConnection`] | Per-origin connection future |
//! | [`Connection`] | Issues requests to one extension frame |
//! | [`PendingResponse`] | Future of one request's response |
//!
//! # Lifecycle
//!
//! 1. `connect(origin)` - listener installed, hidden frame inserted
//! 2. Extension frame posts `{type: "ready"}` - slot settles
//! 3. `request(body)` - id allocated, `{type: "request"}` posted
//! 4. Extension posts `{type: "response"}` - matching future completes

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for bridge configuration.
pub mod builder;

/// Connection handle and response future.
pub mod connection;

/// Core bridge implementation.
pub mod core;

/// Inbound message dispatcher.
mod listener;

/// Bridge options.
pub mod options;

/// Pending-request table.
mod pending;

/// Connection registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use connection::{Connection, PendingResponse};
pub use core::Bridge;
pub use options::{BridgeOptions, DEFAULT_ENTRY_PATH};
pub use registry::PendingConnection;
