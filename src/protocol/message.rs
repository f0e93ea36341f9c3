//! Bridge message types.
//!
//! Defines the three messages exchanged across the frame boundary.
//!
//! # Format
//!
//! ```json
//! { "type": "ready" }
//! { "type": "request",  "id": 0, "body": { ... } }
//! { "type": "response", "id": 0, "body": { ... } }
//! { "type": "response", "id": 0, "err":  { ... } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::RequestId;

// ============================================================================
// Message
// ============================================================================

/// A bridge message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Extension frame has loaded and accepts requests.
    Ready,
    /// Page → extension request.
    Request(Request),
    /// Extension → page response.
    Response(Response),
}

impl Message {
    /// Creates a READY message.
    #[inline]
    #[must_use]
    pub const fn ready() -> Self {
        Self::Ready
    }

    /// Creates a REQUEST message.
    #[inline]
    #[must_use]
    pub fn request(id: RequestId, body: Value) -> Self {
        Self::Request(Request { id, body })
    }

    /// Creates a successful RESPONSE message.
    #[inline]
    #[must_use]
    pub fn response_ok(id: RequestId, body: Value) -> Self {
        Self::Response(Response {
            id,
            body: Some(body),
            err: None,
        })
    }

    /// Creates a failed RESPONSE message.
    #[inline]
    #[must_use]
    pub fn response_err(id: RequestId, err: Value) -> Self {
        Self::Response(Response {
            id,
            body: None,
            err: Some(err),
        })
    }

    /// Parses an inbound value.
    ///
    /// Returns `None` for anything that is not a bridge message; the shared
    /// listener sees unrelated traffic, so this is not an error.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Serializes the message for posting.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the body cannot be represented as JSON.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Returns the message kind as it appears on the wire.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Request(_) => "request",
            Self::Response(_) => "response",
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Body of a REQUEST message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Connection-scoped request id.
    pub id: RequestId,

    /// Opaque request body.
    #[serde(default)]
    pub body: Value,
}

// ============================================================================
// Response
// ============================================================================

/// Body of a RESPONSE message.
///
/// Exactly one of `body` / `err` is expected. If both arrive, `err` wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Error value (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.err.is_some()
    }

    /// Splits the response into its body or its error value.
    ///
    /// A missing body resolves to `null`.
    pub fn into_result(self) -> StdResult<Value, Value> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.body.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
