//! Type-safe identifier wrappers.
//!
//! Newtypes keep origins, request ids, window handles and frame ids from
//! being mixed up at compile time.
//!
//! | Type | Wraps | Source |
//! |------|-------|--------|
//! | [`Origin`] | ASCII origin serialization | [`Origin::parse`] |
//! | [`RequestId`] | `u64` | per-connection counter |
//! | [`WindowId`] | opaque string | inbound READY `source` |
//! | [`FrameId`] | UUID v4 | [`FrameId::generate`] |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// Origin
// ============================================================================

/// Scheme + host + port identity of an extension frame.
///
/// Always stored in its ASCII serialization, e.g. `https://ext.example`
/// (no path, no trailing slash, default port elided). Opaque origins are
/// rejected since they cannot be addressed by `postMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Origin(String);

impl Origin {
    /// Parses and normalizes an origin.
    ///
    /// Any URL is accepted; only its origin is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrigin`] if the input is not a URL or has an
    /// opaque origin.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::invalid_origin(input, e.to_string()))?;
        let origin = url.origin();

        if !origin.is_tuple() {
            return Err(Error::invalid_origin(input, "opaque origin"));
        }

        Ok(Self(origin.ascii_serialization()))
    }

    /// Returns the serialized origin.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves `path` against this origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `path` cannot be joined.
    pub fn join(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&self.0)?.join(path)?)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Origin {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

impl TryFrom<String> for Origin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Identifier of a request on one connection.
///
/// Allocated from a per-connection counter starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// WindowId
// ============================================================================

/// Opaque handle to the extension frame's window proxy.
///
/// Only ever obtained from an inbound message's `source`; callers never
/// mint one for a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    /// Wraps a host-specific window handle.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw handle.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WindowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// FrameId
// ============================================================================

/// Identifier of a hidden frame inserted by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(Uuid);

impl FrameId {
    /// Generates a fresh random frame id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
