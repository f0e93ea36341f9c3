//! WebSocket server for the browser-side shim.
//!
//! # Connection Flow
//!
//! 1. Rust binds the relay server to `localhost:0` (random port)
//! 2. The page loads the shim script with the relay URL
//! 3. The shim connects to the relay server
//! 4. [`RelayServer::accept`] yields a [`RelayHost`]
//! 5. A [`Bridge`](crate::Bridge) is built on top of the host

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::RelayHost;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for waiting for the shim to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// RelayServer
// ============================================================================

/// A relay server that is bound but not yet connected.
///
/// Represents the state between binding to a port and accepting the shim.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use webext_bridge::transport::RelayServer;
///
/// let server = RelayServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Hand ws_url to the shim...
///
/// let host = server.accept().await?;
/// let bridge = Bridge::builder().build(host)?;
/// ```
pub struct RelayServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the server is bound to.
    port: u16,
}

impl RelayServer {
    /// Binds a relay server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "Relay server bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Binds to `127.0.0.1` on a random port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind_localhost() -> Result<Self> {
        Self::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Accepts the shim connection with the default 30s timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the shim doesn't connect in time
    /// - [`Error::WebSocket`] if the WebSocket upgrade fails
    pub async fn accept(self) -> Result<RelayHost> {
        self.accept_with_timeout(CONNECTION_TIMEOUT).await
    }

    /// Accepts the shim connection with a custom timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the shim doesn't connect in time
    /// - [`Error::WebSocket`] if the WebSocket upgrade fails
    pub async fn accept_with_timeout(self, accept_timeout: Duration) -> Result<RelayHost> {
        let (stream, addr) = timeout(accept_timeout, self.listener.accept())
            .await
            .map_err(|_| {
                Error::connection_timeout(self.ws_url(), accept_timeout.as_millis() as u64)
            })??;

        debug!(?addr, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .inspect_err(|e| warn!(error = %e, "WebSocket upgrade failed"))?;

        info!(port = self.port, "Relay connection established");

        Ok(RelayHost::new(ws_stream))
    }
}

// ============================================================================
// Tests
// ============================================================================
