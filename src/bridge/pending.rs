//! Pending-request table.
//!
//! Correlates `(origin, request id)` with the single-shot completion slot
//! of the caller awaiting that response. Entries are inserted by
//! [`Connection::request`](crate::Connection::request) and removed by the
//! listener when the matching response arrives (or by a caller timeout).

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::{Origin, RequestId};

// ============================================================================
// Types
// ============================================================================

/// Completion slot for one request: `Ok(body)` or `Err(err)`.
pub(crate) type Responder = oneshot::Sender<StdResult<Value, Value>>;

// ============================================================================
// PendingTable
// ============================================================================

/// Outstanding requests, grouped by origin.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    /// Origin → request id → responder.
    entries: FxHashMap<Origin, FxHashMap<RequestId, Responder>>,
    /// Total number of entries across origins.
    len: usize,
}

impl PendingTable {
    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `max` entries are already outstanding
    /// or the key is already taken.
    pub(crate) fn insert(
        &mut self,
        origin: &Origin,
        id: RequestId,
        responder: Responder,
        max: Option<usize>,
    ) -> Result<()> {
        if let Some(max) = max
            && self.len >= max
        {
            warn!(pending = self.len, max, "Too many pending requests");
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                self.len, max
            )));
        }

        let slice = self.entries.entry(origin.clone()).or_default();
        if slice.contains_key(&id) {
            return Err(Error::protocol(format!(
                "Request {id} already pending for {origin}"
            )));
        }

        slice.insert(id, responder);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the entry for `(origin, id)`.
    pub(crate) fn take(&mut self, origin: &str, id: RequestId) -> Option<Responder> {
        let slice = self.entries.get_mut(origin)?;
        let responder = slice.remove(&id)?;

        if slice.is_empty() {
            self.entries.remove(origin);
        }

        self.len -= 1;
        Some(responder)
    }

    /// Removes the entry for `(origin, id)`, returning whether it existed.
    pub(crate) fn remove(&mut self, origin: &str, id: RequestId) -> bool {
        self.take(origin, id).is_some()
    }

    /// Returns `true` if `(origin, id)` is outstanding.
    #[must_use]
    pub(crate) fn contains(&self, origin: &str, id: RequestId) -> bool {
        self.entries
            .get(origin)
            .is_some_and(|slice| slice.contains_key(&id))
    }

    /// Returns the total number of outstanding entries.
    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of outstanding entries for `origin`.
    #[must_use]
    pub(crate) fn len_for(&self, origin: &str) -> usize {
        self.entries.get(origin).map_or(0, |slice| slice.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
