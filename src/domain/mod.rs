//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! concrete bus implementations or client libraries.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod bus;
mod message;

// --- Bus domain re-exports ---

pub use bus::{
    //
    Address,
    Bus,
    BusPtr,
    BusSubscription,
    Connector,
    ConnectorPtr,
    Frame,
    SubscriptionPtr,
};

// --- Message domain re-exports ---

pub use message::Message;

pub(crate) use message::{decode, encode};
