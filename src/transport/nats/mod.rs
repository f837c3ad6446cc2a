//! NATS bus implementation based on `async-nats`.
//!
//! This module adapts the async-nats client to the domain-level `Bus` and
//! `Connector` traits without leaking NATS types upward.
//!
//! # Usage
//!
//! Enable the `transport_nats` feature in your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! mom-socket = { version = "0.1", features = ["transport_nats"] }
//! ```

#[cfg(feature = "transport_nats")]
mod transport;

#[cfg(feature = "transport_nats")]
pub use transport::create_connector as create_nats_connector;

#[cfg(not(feature = "transport_nats"))]
pub fn create_nats_connector() -> crate::Result<crate::ConnectorPtr> {
    Err(crate::Error::Transport(
        "transport_nats feature is not enabled".into(),
    ))
}
