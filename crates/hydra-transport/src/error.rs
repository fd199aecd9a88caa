/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to the remote peer failed and won't be retried.
    #[error("connect failed after {attempts} attempt(s): {source}")]
    ConnectFailed {
        /// How many connection attempts were made.
        attempts: u32,
        /// The error from the last attempt.
        #[source]
        source: std::io::Error,
    },

    /// The reactor thread could not be started.
    #[error("reactor failed to start: {0}")]
    Reactor(#[source] std::io::Error),
}
