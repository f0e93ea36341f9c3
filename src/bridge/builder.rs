//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for configuring and creating [`Bridge`] instances.
//!
//! # Example
//!
//! ```ignore
//! use webext_bridge::{Bridge, transport::ChannelHost};
//!
//! let (host, _events) = ChannelHost::new();
//! let bridge = Bridge::builder()
//!     .entry_path("embed.html")
//!     .max_pending(128)
//!     .build(host)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::identifiers::Origin;
use crate::transport::Host;

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct BridgeBuilder {
    options: BridgeOptions,
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry page loaded into the hidden frame.
    ///
    /// # Arguments
    ///
    /// * `path` - Path relative to the extension origin (e.g. "embed.html")
    #[inline]
    #[must_use]
    pub fn entry_path(mut self, path: impl Into<String>) -> Self {
        self.options.entry_path = Cow::Owned(path.into());
        self
    }

    /// Bounds the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max: usize) -> Self {
        self.options.max_pending = Some(max);
        self
    }

    /// Sets the default timeout used by [`Connection::call`](crate::Connection::call).
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = Some(timeout);
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the bridge on top of `host` with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the entry path is empty or not a relative URL
    /// - [`Error::Config`] if `max_pending` or `request_timeout` is zero
    pub fn build<H>(self, host: H) -> Result<Bridge>
    where
        H: Host + 'static,
    {
        self.validate()?;
        Ok(Bridge::with_options(host, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeBuilder {
    /// Validates the configured options.
    fn validate(&self) -> Result<()> {
        let path = self.options.entry_path.trim();
        if path.is_empty() {
            return Err(Error::config(
                "Entry path is required. Use .entry_path() to set it.\n\
                 Example: Bridge::builder().entry_path(\"embed.html\")",
            ));
        }

        // The entry page must stay under the extension origin.
        let probe = Origin::parse("https://origin.invalid")?;
        let url = probe
            .join(path)
            .map_err(|e| Error::config(format!("Invalid entry path '{path}': {e}")))?;
        if url.origin().ascii_serialization() != probe.as_str() {
            return Err(Error::config(format!(
                "Entry path '{path}' must be relative to the extension origin"
            )));
        }

        if self.options.max_pending == Some(0) {
            return Err(Error::config("max_pending must be greater than zero"));
        }

        if self.options.request_timeout == Some(Duration::ZERO) {
            return Err(Error::config("request_timeout must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
