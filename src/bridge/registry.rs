//! Connection registry.
//!
//! Maps each extension origin to exactly one connection slot. The first
//! [`Bridge::connect`] for an origin creates the slot and asks the host for
//! the hidden frame; every later call shares that slot. A slot settles once,
//! when the listener sees READY from the origin, and is never torn down.
//!
//! Frame insertion is serialized per slot. A caller that finds a slot whose
//! frame is still being inserted waits for that attempt; if it failed, the
//! slot is discarded and the caller starts over with a fresh one, so a
//! handle is only ever returned for a slot whose frame was inserted.
//!
//! A missing extension leaves the slot pending forever. Callers that need a
//! bounded wait use [`PendingConnection::wait_timeout`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::Origin;
use crate::transport::HiddenFrame;

use super::connection::{Connection, ConnectionState};
use super::core::{Bridge, BridgeInner};
use super::listener;

// ============================================================================
// FrameStatus
// ============================================================================

/// Progress of a slot's hidden frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStatus {
    /// Not inserted yet; the first caller to lock the slot inserts it.
    Pending,
    /// Host accepted the frame.
    Inserted,
    /// Insertion failed and the slot was removed from the registry.
    Abandoned,
}

// ============================================================================
// ConnectionSlot
// ============================================================================

/// Single-settlement cell for one origin's connection.
pub(crate) struct ConnectionSlot {
    /// Origin this slot belongs to.
    origin: Origin,
    /// Held across the host call while the frame is inserted.
    frame: Mutex<FrameStatus>,
    /// `None` while pending, `Some` once READY was observed.
    tx: watch::Sender<Option<Arc<ConnectionState>>>,
}

impl ConnectionSlot {
    /// Creates a pending slot.
    pub(crate) fn new(origin: Origin) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            origin,
            frame: Mutex::new(FrameStatus::Pending),
            tx,
        }
    }

    /// Returns the slot's origin.
    #[inline]
    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Settles the slot, returning `false` if it was already settled.
    pub(crate) fn settle(&self, state: Arc<ConnectionState>) -> bool {
        let mut state = Some(state);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = state.take();
            true
        })
    }

    /// Returns the settled state, if any.
    pub(crate) fn current(&self) -> Option<Arc<ConnectionState>> {
        self.tx.borrow().clone()
    }

    /// Returns `true` once settled.
    #[inline]
    pub(crate) fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Subscribes to settlement.
    fn subscribe(&self) -> watch::Receiver<Option<Arc<ConnectionState>>> {
        self.tx.subscribe()
    }
}

// ============================================================================
// PendingConnection
// ============================================================================

/// The per-origin connection future returned by [`Bridge::connect`].
///
/// Every `connect` call for the same origin yields a handle to the same
/// slot (see [`PendingConnection::same_slot`]). Awaiting it yields the
/// [`Connection`] once the extension frame signals readiness.
#[derive(Clone)]
#[must_use = "the connection is only obtained by awaiting it"]
pub struct PendingConnection {
    /// Bridge internals, handed to the resulting connection.
    bridge: Arc<BridgeInner>,
    /// Shared slot for the origin.
    slot: Arc<ConnectionSlot>,
}

impl fmt::Debug for PendingConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingConnection")
            .field("origin", &self.slot.origin)
            .field("settled", &self.slot.is_settled())
            .finish()
    }
}

impl PendingConnection {
    /// Returns the origin being connected to.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Origin {
        self.slot.origin()
    }

    /// Returns `true` if both handles share one slot.
    #[inline]
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Returns `true` once the extension frame has signalled readiness.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }

    /// Returns the connection without waiting, if already settled.
    #[must_use]
    pub fn try_get(&self) -> Option<Connection> {
        self.slot
            .current()
            .map(|state| Connection::from_parts(Arc::clone(&self.bridge), state))
    }

    /// Waits until the extension frame signals readiness.
    ///
    /// Never completes if the extension never loads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the slot is dropped while
    /// waiting, which cannot happen while this handle is alive.
    pub async fn wait(&self) -> Result<Connection> {
        let mut rx = self.slot.subscribe();

        let state = {
            let settled = rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| Error::ConnectionClosed)?;
            Option::clone(&settled)
        };

        state
            .map(|state| Connection::from_parts(Arc::clone(&self.bridge), state))
            .ok_or(Error::ConnectionClosed)
    }

    /// Waits at most `connect_timeout` for readiness.
    ///
    /// Expiry does not disturb the slot; a later wait may still succeed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if the frame did not signal
    /// readiness in time.
    pub async fn wait_timeout(&self, connect_timeout: Duration) -> Result<Connection> {
        timeout(connect_timeout, self.wait()).await.map_err(|_| {
            Error::connection_timeout(
                self.slot.origin.as_str(),
                connect_timeout.as_millis() as u64,
            )
        })?
    }
}

impl IntoFuture for PendingConnection {
    type Output = Result<Connection>;
    type IntoFuture = BoxFuture<'static, Result<Connection>>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.wait().await }.boxed()
    }
}

// ============================================================================
// Bridge - Connect
// ============================================================================

impl Bridge {
    /// Connects to the extension frame served from `origin`.
    ///
    /// The first call for an origin installs the message listener (once per
    /// bridge), registers the origin's slot and asks the host to insert a
    /// hidden frame at `origin/<entry_path>`. Later calls return a handle to
    /// the same slot without touching the host.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOrigin`] if `origin` cannot be parsed
    /// - any error from [`Host::insert_hidden_frame`](crate::transport::Host::insert_hidden_frame);
    ///   the slot is removed so a later call retries
    pub fn connect(&self, origin: impl AsRef<str>) -> Result<PendingConnection> {
        let origin = Origin::parse(origin.as_ref())?;

        listener::ensure_installed(&self.inner);

        loop {
            let slot = {
                let mut state = self.inner.state.lock();
                Arc::clone(
                    state
                        .slots
                        .entry(origin.clone())
                        .or_insert_with(|| Arc::new(ConnectionSlot::new(origin.clone()))),
                )
            };

            // Slot lock before state lock, never the reverse
            let mut frame = slot.frame.lock();
            match *frame {
                FrameStatus::Inserted => {}
                FrameStatus::Abandoned => {
                    debug!(origin = %origin, "Slot abandoned during connect, retrying");
                    continue;
                }
                FrameStatus::Pending => {
                    if let Err(e) = self.insert_frame(&origin) {
                        *frame = FrameStatus::Abandoned;
                        self.remove_slot(&origin, &slot);
                        debug!(origin = %origin, error = %e, "Frame insertion failed");
                        return Err(e);
                    }
                    *frame = FrameStatus::Inserted;
                }
            }
            drop(frame);

            return Ok(PendingConnection {
                bridge: Arc::clone(&self.inner),
                slot,
            });
        }
    }

    /// Asks the host for the origin's hidden frame.
    fn insert_frame(&self, origin: &Origin) -> Result<()> {
        let frame = HiddenFrame::new(origin.clone(), &self.inner.options.entry_path)?;
        self.inner.host.insert_hidden_frame(&frame)?;

        info!(origin = %origin, frame_id = %frame.id, src = %frame.src, "Connecting to extension");
        Ok(())
    }

    /// Removes `slot` from the registry if it is still the origin's slot.
    fn remove_slot(&self, origin: &Origin, slot: &Arc<ConnectionSlot>) {
        let mut state = self.inner.state.lock();
        if state
            .slots
            .get(origin)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            state.slots.remove(origin);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    use std::sync::mpsc as std_mpsc;
    use std::thread;

    use serde_json::Value;

    use crate::identifiers::WindowId;
    use crate::transport::{
        ChannelHost, Host, HostEvent, Listeners, MessageEvent, MessageListener,
    };

    const ORIGIN: &str = "https://ext.example";

    /// Host whose first frame insertion blocks until released, then fails.
    #[derive(Clone)]
    struct GatedHost {
        listeners: Listeners,
        entered: Arc<Mutex<Option<std_mpsc::Sender<()>>>>,
        release: Arc<Mutex<Option<std_mpsc::Receiver<()>>>>,
        inserted: Arc<Mutex<Vec<HiddenFrame>>>,
    }

    impl GatedHost {
        fn new(entered: std_mpsc::Sender<()>, release: std_mpsc::Receiver<()>) -> Self {
            Self {
                listeners: Listeners::default(),
                entered: Arc::new(Mutex::new(Some(entered))),
                release: Arc::new(Mutex::new(Some(release))),
                inserted: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Host for GatedHost {
        fn insert_hidden_frame(&self, frame: &HiddenFrame) -> Result<()> {
            let gate = self.release.lock().take();
            if let Some(release) = gate {
                if let Some(entered) = self.entered.lock().take() {
                    let _ = entered.send(());
                }
                let _ = release.recv();
                return Err(Error::host("frame insertion refused"));
            }

            self.inserted.lock().push(frame.clone());
            Ok(())
        }

        fn post_message(&self, _target: &WindowId, _origin: &Origin, _data: Value) -> Result<()> {
            Ok(())
        }

        fn add_message_listener(&self, listener: MessageListener) {
            self.listeners.add(listener);
        }
    }

    fn ready(origin: &str, window: &str) -> MessageEvent {
        MessageEvent::new(
            origin,
            Some(WindowId::from(window)),
            json!({ "type": "ready" }),
        )
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (host, mut events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let first = bridge.connect(ORIGIN).expect("connect");
        let second = bridge.connect("https://ext.example/").expect("connect");

        assert!(first.same_slot(&second));
        assert_eq!(host.frames().len(), 1);
        assert_eq!(host.listener_count(), 1);
        assert_eq!(bridge.slot_count(), 1);

        assert!(matches!(events.try_recv(), Ok(HostEvent::FrameInserted(_))));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_frame_points_at_entry_path() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::builder()
            .entry_path("wallet/embed.html")
            .build(host.clone())
            .expect("build");

        let _pending = bridge.connect(ORIGIN).expect("connect");

        let frames = host.frames();
        assert_eq!(frames[0].src.as_str(), "https://ext.example/wallet/embed.html");
        assert_eq!(frames[0].origin.as_str(), ORIGIN);
    }

    #[test]
    fn test_distinct_origins_get_distinct_slots() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let a = bridge.connect("https://a.example").expect("connect");
        let b = bridge.connect("https://b.example").expect("connect");

        assert!(!a.same_slot(&b));
        assert_eq!(host.frames().len(), 2);
        assert_eq!(host.listener_count(), 1);
    }

    #[test]
    fn test_invalid_origin_inserts_nothing() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let err = bridge.connect("not an origin").unwrap_err();
        assert!(matches!(err, Error::InvalidOrigin { .. }));
        assert!(host.frames().is_empty());
        assert_eq!(bridge.slot_count(), 0);
    }

    #[test]
    fn test_failed_insertion_allows_retry() {
        let (host, events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        drop(events);

        assert!(bridge.connect(ORIGIN).is_err());
        assert_eq!(bridge.slot_count(), 0);
        assert!(bridge.connect(ORIGIN).is_err());
        assert_eq!(bridge.slot_count(), 0);
    }

    #[test]
    fn test_connect_during_failed_insertion_gets_live_slot() {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let host = GatedHost::new(entered_tx, release_rx);
        let bridge = Bridge::new(host.clone());

        let first = thread::spawn({
            let bridge = bridge.clone();
            move || bridge.connect(ORIGIN).map(|_| ())
        });
        entered_rx.recv().expect("first insertion started");

        // Second caller arrives while the first insertion is in flight.
        let second = thread::spawn({
            let bridge = bridge.clone();
            move || bridge.connect(ORIGIN)
        });
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).expect("release");

        let err = first.join().expect("first thread").unwrap_err();
        assert!(matches!(err, Error::Host { .. }));
        let second = second
            .join()
            .expect("second thread")
            .expect("second caller inserts its own frame");

        assert_eq!(host.inserted.lock().len(), 1);
        assert_eq!(bridge.slot_count(), 1);

        host.listeners.dispatch(ready(ORIGIN, "w1"));
        assert!(second.is_settled());

        let later = bridge.connect(ORIGIN).expect("connect");
        assert!(later.same_slot(&second));
        assert_eq!(host.inserted.lock().len(), 1);
    }

    #[test]
    fn test_ready_settles_every_handle() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let first = bridge.connect(ORIGIN).expect("connect");
        let second = bridge.connect(ORIGIN).expect("connect");
        let mut waiting = task::spawn(first.clone().into_future());
        assert_pending!(waiting.poll());

        host.deliver(ready(ORIGIN, "w1"));

        assert!(waiting.is_woken());
        let connection = assert_ready!(waiting.poll()).expect("connected");
        assert_eq!(connection.target(), &WindowId::from("w1"));

        let again = second.try_get().expect("settled");
        assert!(connection.same_connection(&again));
        assert!(first.is_settled());
    }

    #[test]
    fn test_never_ready_stays_pending() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let pending = bridge.connect(ORIGIN).expect("connect");
        let mut waiting = task::spawn(pending.clone().into_future());

        host.deliver(ready("https://other.example", "w9"));
        host.deliver(MessageEvent::new(ORIGIN, None, json!({ "type": "ready" })));
        host.deliver(MessageEvent::new(ORIGIN, Some(WindowId::from("w1")), json!("noise")));

        assert_pending!(waiting.poll());
        assert!(!pending.is_settled());
    }

    #[test]
    fn test_connect_after_ready_returns_settled() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());

        let _first = bridge.connect(ORIGIN).expect("connect");
        host.deliver(ready(ORIGIN, "w1"));

        let later = bridge.connect(ORIGIN).expect("connect");
        assert!(later.is_settled());
        assert_eq!(host.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_keeps_slot() {
        let (host, _events) = ChannelHost::new();
        let bridge = Bridge::new(host.clone());
        let pending = bridge.connect(ORIGIN).expect("connect");

        let err = pending
            .wait_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionTimeout { .. }));

        host.deliver(ready(ORIGIN, "w1"));
        let connection = pending
            .wait_timeout(Duration::from_millis(10))
            .await
            .expect("settled");
        assert_eq!(connection.origin().as_str(), ORIGIN);
    }

    #[test]
    fn test_slot_settles_once() {
        let origin = Origin::parse(ORIGIN).expect("valid");
        let slot = ConnectionSlot::new(origin.clone());

        let first = Arc::new(ConnectionState::new(origin.clone(), WindowId::from("w1")));
        let second = Arc::new(ConnectionState::new(origin, WindowId::from("w2")));

        assert!(slot.settle(Arc::clone(&first)));
        assert!(!slot.settle(second));
        assert!(slot.current().is_some_and(|state| Arc::ptr_eq(&state, &first)));
    }
}
