use thiserror::Error;

/// Errors produced by sockets, listeners, clients and bus adapters.
#[derive(Error, Debug)]
pub enum Error {
    /// The socket was closed; no further messages will be delivered.
    ///
    /// This is the end-of-stream signal and is distinct from a decode
    /// failure. Use [`Error::is_eof`] to test for it.
    #[error("end of stream")]
    Eof,

    /// Waiting for a message on the bus timed out.
    #[error("receive timed out")]
    Timeout,

    /// Message encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Establishing the bus connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Registering a subscription on the bus failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The subscription was torn down while a receive was pending.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// Any other bus-level failure (publish on a closed connection, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// No factory is registered under the requested transport name.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),

    /// A required configuration value was not provided.
    #[error("missing config: {0}")]
    MissingConfig(String),

    /// Builder settings contradict each other.
    #[error("config conflict: {0}")]
    ConfigConflict(String),
}

impl Error {
    /// Returns `true` for the end-of-stream signal of a closed socket.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }

    /// Returns `true` when a bus receive timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

/// Result type alias for socket and transport operations
pub type Result<T> = std::result::Result<T, Error>;
