//! Bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::borrow::Cow;
//! use std::time::Duration;
//! use webext_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_entry_path("wallet/embed.html")
//!     .with_max_pending(256)
//!     .with_request_timeout(Duration::from_secs(60));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default path of the extension entry page under its origin.
pub const DEFAULT_ENTRY_PATH: &str = "embed.html";

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Entry page loaded into the hidden frame, relative to the origin.
    pub entry_path: Cow<'static, str>,

    /// Upper bound on outstanding requests across all connections.
    ///
    /// `None` keeps every unanswered request until the bridge is dropped.
    pub max_pending: Option<usize>,

    /// Default timeout applied by [`Connection::call`](crate::Connection::call).
    ///
    /// `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entry_path: Cow::Borrowed(DEFAULT_ENTRY_PATH),
            max_pending: None,
            request_timeout: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the entry page path.
    #[inline]
    #[must_use]
    pub fn with_entry_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.entry_path = path.into();
        self
    }

    /// Bounds the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Sets the default request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
