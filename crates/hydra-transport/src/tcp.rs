//! TCP listener transport.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::TransportError;

/// A TCP listener that accepts raw connected sockets.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    /// Binds synchronously, for callers that aren't on a runtime yet.
    ///
    /// The returned listener is switched to non-blocking mode and can be
    /// handed to [`TcpTransport::from_std`] on the reactor.
    pub fn bind_std(addr: &str) -> Result<std::net::TcpListener, TransportError> {
        let listener =
            std::net::TcpListener::bind(addr).map_err(TransportError::BindFailed)?;
        listener
            .set_nonblocking(true)
            .map_err(TransportError::BindFailed)?;
        Ok(listener)
    }

    /// Wraps an already bound, non-blocking standard listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_std(listener: std::net::TcpListener) -> Result<Self, TransportError> {
        let listener =
            TcpListener::from_std(listener).map_err(TransportError::BindFailed)?;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "TCP transport listening");
        }
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next connection and turns Nagle's algorithm off on it.
    ///
    /// The listener closes when the transport is dropped.
    pub async fn accept(&mut self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }
        tracing::debug!(%addr, "accepted TCP connection");
        Ok((stream, addr))
    }
}
