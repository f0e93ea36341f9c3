//! WebSocket relay host and event loop.
//!
//! A browser-side shim owns the real document. It connects to a
//! [`RelayServer`](super::RelayServer), performs the frame insertions and
//! `postMessage` calls it is told to, and forwards every message event the
//! page window observes.
//!
//! # Event Loop
//!
//! The host spawns a tokio task that handles:
//!
//! - Outgoing envelopes from the bridge (`insertFrame`, `postMessage`)
//! - Incoming `message` envelopes, dispatched to the listeners in order
//! - Shutdown when the socket closes or [`RelayHost::shutdown`] is called

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Origin, WindowId};
use crate::protocol::Envelope;

use super::{HiddenFrame, Host, Listeners, MessageListener};

// ============================================================================
// RelayCommand
// ============================================================================

/// Internal commands for the event loop.
enum RelayCommand {
    /// Write an envelope to the shim.
    Send(Envelope),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// RelayHost
// ============================================================================

/// Host backed by a WebSocket connection to a browser-side shim.
///
/// # Thread Safety
///
/// `RelayHost` is `Send + Sync`; clones share the same socket.
/// All operations are non-blocking.
#[derive(Clone)]
pub struct RelayHost {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<RelayCommand>,
    /// Listeners shared with the event loop.
    listeners: Listeners,
    /// Set once the event loop has terminated.
    closed: Arc<AtomicBool>,
}

impl RelayHost {
    /// Creates a relay host from an accepted WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let listeners = Listeners::default();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            listeners.clone(),
            Arc::clone(&closed),
        ));

        Self {
            command_tx,
            listeners,
            closed,
        }
    }

    /// Returns `true` once the socket has closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the socket.
    ///
    /// Host operations fail with [`Error::ConnectionClosed`] from this point
    /// on, even before the event loop has finished closing.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(RelayCommand::Shutdown);
    }

    /// Queues an envelope for the shim.
    fn send(&self, envelope: Envelope) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        self.command_tx
            .send(RelayCommand::Send(envelope))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<RelayCommand>,
        listeners: Listeners,
        closed: Arc<AtomicBool>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming envelopes from the shim
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &listeners);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Relay closed by shim");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Relay WebSocket error");
                            break;
                        }

                        None => {
                            debug!("Relay stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Outgoing envelopes from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(RelayCommand::Send(envelope)) => {
                            let json = match to_string(&envelope) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to serialize envelope");
                                    continue;
                                }
                            };

                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                error!(error = %e, "Failed to write envelope");
                                break;
                            }

                            trace!("Envelope sent");
                        }

                        Some(RelayCommand::Shutdown) => {
                            debug!("Relay shutdown requested");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Relay command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Fail later sends before reporting what was still queued
        closed.store(true, Ordering::SeqCst);
        command_rx.close();

        let mut dropped = 0usize;
        while let Ok(command) = command_rx.try_recv() {
            if matches!(command, RelayCommand::Send(_)) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "Envelopes dropped after relay closed");
        }

        debug!("Relay event loop terminated");
    }

    /// Handles an incoming text frame from the shim.
    fn handle_incoming_message(text: &str, listeners: &Listeners) {
        match from_str::<Envelope>(text) {
            Ok(Envelope::Message(event)) => listeners.dispatch(event),
            Ok(other) => {
                warn!(?other, "Unexpected envelope from shim");
            }
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse envelope");
            }
        }
    }
}

impl Host for RelayHost {
    fn insert_hidden_frame(&self, frame: &HiddenFrame) -> Result<()> {
        debug!(frame_id = %frame.id, src = %frame.src, "Relaying frame insertion");
        self.send(Envelope::insert_frame(frame))
    }

    fn post_message(&self, target: &WindowId, target_origin: &Origin, data: Value) -> Result<()> {
        self.send(Envelope::post_message(target, target_origin, data))
    }

    fn add_message_listener(&self, listener: MessageListener) {
        self.listeners.add(listener);
    }
}

// ============================================================================
// Tests
// ============================================================================
