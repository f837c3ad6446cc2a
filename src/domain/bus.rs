// src/domain/bus.rs

//! Bus domain abstractions.
//!
//! This module defines the interface the socket layer consumes from a
//! publish-subscribe message bus. It intentionally avoids any reference to
//! concrete brokers or client libraries.
//!
//! The bus is responsible only for delivering opaque frames to subscribers
//! of a subject. Sessions, buffering and reply routing are built on top of
//! it by the listener, socket and client layers.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::{ConnectOptions, Result};

/// A bus subject.
///
/// An `Address` names the subject a frame is published to, the subject a
/// subscription listens on, and, for inbound requests, the reply subject
/// that identifies a session.
///
/// Addresses are immutable, cheap to clone, and safe to share across threads.
/// The domain layer makes no assumptions about subject syntax or wildcards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub Arc<str>);

impl Address {
    /// Borrow the subject as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A frame as delivered by the bus.
///
/// The `reply` subject is overloaded as the session key by the listener:
/// every frame carrying the same reply subject belongs to the same socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Subject the frame was published to.
    pub subject: Address,

    /// Reply subject set by the publisher, if any.
    pub reply: Option<Address>,

    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame without a reply subject.
    pub fn new(subject: impl Into<Address>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            payload: payload.into(),
        }
    }

    /// Set the reply subject.
    pub fn with_reply(mut self, reply: impl Into<Address>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

/// A synchronous subscription on a single subject.
///
/// Frames are buffered by the bus until pulled with
/// [`next_frame`](BusSubscription::next_frame).
#[async_trait::async_trait]
pub trait BusSubscription: Send {
    // ---
    /// Subject this subscription is bound to.
    fn subject(&self) -> &Address;

    /// Wait up to `timeout` for the next frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`](crate::Error::Timeout) if nothing arrived in time.
    ///   Callers may poll again.
    /// - [`Error::SubscriptionClosed`](crate::Error::SubscriptionClosed) or
    ///   [`Error::Transport`](crate::Error::Transport) if the subscription can
    ///   no longer deliver; these are fatal.
    async fn next_frame(&mut self, timeout: Duration) -> Result<Frame>;

    /// Remove the subscription from the bus.
    async fn unsubscribe(&mut self) -> Result<()>;
}

/// Owned, type-erased subscription.
pub type SubscriptionPtr = Box<dyn BusSubscription>;

/// One connection to a publish-subscribe bus.
///
/// Implementations must ensure that:
/// - Once `subscribe_sync()` returns, frames published *after* that point
///   to the same subject are deliverable to the subscription.
/// - `publish()` never waits on subscribers.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Bus: Send + Sync {
    // ---
    /// Identifier of this connection, used as a logging prefix.
    fn bus_id(&self) -> &str;

    /// Publish `payload` to `subject` with no reply subject.
    async fn publish(&self, subject: &Address, payload: Bytes) -> Result<()>;

    /// Publish `payload` to `subject`, asking for replies on `reply`.
    async fn publish_with_reply(&self, subject: &Address, reply: &Address, payload: Bytes)
        -> Result<()>;

    /// Open a synchronous subscription on `subject`.
    async fn subscribe_sync(&self, subject: &Address) -> Result<SubscriptionPtr>;

    /// Generate a subject that is unique on this bus.
    fn new_inbox(&self) -> Address;

    /// Close the connection.
    async fn close(&self) -> Result<()>;
}

/// Shared bus connection pointer.
///
/// Clones share the same underlying connection; sockets created by a
/// listener hold one so they can keep replying after the listener stops.
pub type BusPtr = Arc<dyn Bus>;

/// Establishes bus connections.
///
/// A connector is the seam between the transport factory and a concrete
/// bus implementation (in-memory hub, NATS, ...).
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    // ---
    /// Short name of the bus flavour, e.g. `"nats"` or `"memory"`.
    fn name(&self) -> &str;

    /// Open a new connection to one of `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`](crate::Error::Connect) when no connection
    /// could be established. No retries are attempted.
    async fn connect(&self, endpoints: &[String], opts: &ConnectOptions) -> Result<BusPtr>;
}

/// Shared connector pointer.
pub type ConnectorPtr = Arc<dyn Connector>;
