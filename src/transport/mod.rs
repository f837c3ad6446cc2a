//! Bus implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Bus` and `Connector` traits. Broker-backed buses are hidden behind
//! feature flags and exposed only through constructor functions.
//!
//! Domain code must not depend on bus-specific types.

mod connection;
mod memory;
mod nats;

pub(crate) use connection::ConnectionState;

pub use memory::create_connector as create_memory_connector;
pub use memory::MemoryHub;

pub use nats::create_nats_connector;
