//! Connection-oriented request/reply sockets over a publish-subscribe bus.
//!
//! A message bus delivers each message to every subscriber of a subject and
//! knows nothing about sessions. This crate synthesizes sessions on top of
//! it: a [`Client`] publishes requests with a private reply subject, and a
//! [`Listener`] groups inbound requests by that reply subject into
//! per-session [`Socket`]s with ordered, awaitable `recv` and `send`.
//!
//! ```
//! use mom_socket::{DialOptions, ListenOptions, MemoryHub, Message, Transport, TransportBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> mom_socket::Result<()> {
//! let transport = TransportBuilder::new().memory(MemoryHub::new()).build()?;
//!
//! let listener = transport.listen("greeter", ListenOptions::default()).await?;
//! let server = listener.clone();
//! tokio::spawn(async move {
//!     server
//!         .accept(|socket| async move {
//!             if let Ok(req) = socket.recv().await {
//!                 let _ = socket.send(&Message::new(req.body)).await;
//!             }
//!             let _ = socket.close();
//!         })
//!         .await
//! });
//!
//! let client = transport.dial(listener.addr(), DialOptions::default()).await?;
//! let reply = client.request(&Message::new("hello")).await?;
//! assert_eq!(&reply.body[..], b"hello");
//!
//! client.close().await?;
//! listener.close().await?;
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

mod client;
mod domain;
mod server;
mod transport;

mod options;
mod registry;
mod socket_transport;
mod transport_builder;

mod error;

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Guarded state in this crate (routing tables, socket backlogs, idle
/// subscription slots) holds no invariant spanning a panic: a poisoned
/// guard still holds valid data.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// Re-export main types
pub use client::Client;
pub use server::{Listener, Socket};

pub use error::{Error, Result};

pub use options::{
    //
    ConnectOptions,
    DialOptions,
    ListenOptions,
    TlsConfig,
    TransportOptions,
    DEFAULT_DIAL_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
    DEFAULT_RECV_TIMEOUT,
};

pub use registry::{connector_factory, TransportFactory, TransportRegistry};
pub use socket_transport::{
    //
    normalize_endpoints,
    BusTransport,
    Transport,
    TransportPtr,
    DEFAULT_ENDPOINT,
};
pub use transport_builder::TransportBuilder;

pub use transport::{create_memory_connector, create_nats_connector, MemoryHub};

// --- public re-exports
pub use domain::{
    //
    Address,
    Bus,
    BusPtr,
    BusSubscription,
    Connector,
    ConnectorPtr,
    Frame,
    Message,
    SubscriptionPtr,
};
