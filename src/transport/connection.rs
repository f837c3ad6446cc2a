// src/transport/connection.rs

//! Open/closed state shared by bus adapters.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// Tracks whether a bus connection has been closed.
///
/// Every adapter checks [`ensure_open`](ConnectionState::ensure_open) before
/// publishing or subscribing, so a closed connection fails the same way on
/// every bus.
pub(crate) struct ConnectionState {
    // ---
    bus_id: String,
    closed: AtomicBool,
}

impl ConnectionState {
    pub(crate) fn new(bus_id: String) -> Self {
        Self {
            bus_id,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn bus_id(&self) -> &str {
        &self.bus_id
    }

    /// `Error::Transport` once the connection is closed.
    pub(crate) fn ensure_open(&self) -> Result<()> {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!(
                "{}: connection closed",
                self.bus_id
            )));
        }
        Ok(())
    }

    /// Mark the connection closed. Returns `true` only for the first call,
    /// which owns the teardown.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_open_until_marked_closed() {
        // ---
        let state = ConnectionState::new("bus-1".into());
        assert!(state.ensure_open().is_ok());

        assert!(state.mark_closed());

        let err = state.ensure_open().unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("bus-1")));
    }

    #[test]
    fn test_only_first_close_owns_teardown() {
        // ---
        let state = ConnectionState::new("bus-2".into());
        assert!(state.mark_closed());
        assert!(!state.mark_closed());
        assert!(!state.mark_closed());
    }
}
