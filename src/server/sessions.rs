// src/server/sessions.rs

//! Listener registry: reply subject → socket.
//!
//! Routing is split from the accept loop so the demultiplexing rules can be
//! exercised without a running loop or spawned handlers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

use super::Socket;
use crate::{Address, BusPtr, Frame};

/// Outcome of routing one inbound frame.
#[derive(Debug)]
pub(crate) enum Route {
    /// First frame of a new session; the socket was registered and seeded.
    Opened(Socket),

    /// Frame appended to a live session.
    Delivered,

    /// The session under this reply subject is closed; frame discarded.
    Dropped(Address),

    /// The frame carries no reply subject and cannot belong to a session.
    Unroutable(Address),
}

pub(crate) struct SessionTable {
    // ---
    bus: BusPtr,
    sockets: RwLock<HashMap<Address, Socket>>,
}

impl SessionTable {
    // ---
    pub(crate) fn new(bus: BusPtr) -> Self {
        Self {
            bus,
            sockets: RwLock::new(HashMap::new()),
        }
    }

    /// Route `frame` to the socket registered under its reply subject,
    /// creating and registering one on first sight.
    pub(crate) async fn route(&self, frame: Frame) -> Route {
        // ---
        let Some(reply) = frame.reply.clone() else {
            return Route::Unroutable(frame.subject);
        };

        let existing = self.sockets.read().await.get(&reply).cloned();

        let (socket, opened) = match existing {
            Some(socket) => (socket, false),
            None => {
                let mut sockets = self.sockets.write().await;
                match sockets.entry(reply.clone()) {
                    Entry::Occupied(entry) => (entry.get().clone(), false),
                    Entry::Vacant(entry) => {
                        let socket = Socket::new(self.bus.clone(), reply.clone());
                        entry.insert(socket.clone());
                        (socket, true)
                    }
                }
            }
        };

        if socket.is_closed() {
            return Route::Dropped(reply);
        }

        socket.deliver(frame);

        if opened {
            Route::Opened(socket)
        } else {
            Route::Delivered
        }
    }

    /// Delete the registry entry for `socket`.
    ///
    /// Only removes the entry if it still refers to this very socket, so a
    /// late cleanup never evicts a newer session reusing the subject.
    pub(crate) async fn remove(&self, socket: &Socket) -> bool {
        // ---
        let mut sockets = self.sockets.write().await;

        match sockets.get(socket.reply_to()) {
            Some(current) if current.same_session(socket) => {
                sockets.remove(socket.reply_to());
                true
            }
            _ => false,
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.sockets.read().await.len()
    }

    pub(crate) async fn contains(&self, reply: &Address) -> bool {
        self.sockets.read().await.contains_key(reply)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::encode;
    use crate::{create_memory_connector, ConnectOptions, MemoryHub, Message};
    use bytes::Bytes;

    async fn table() -> SessionTable {
        // ---
        let opts = ConnectOptions {
            secure: false,
            tls: None,
            timeout: None,
        };
        let bus = create_memory_connector(MemoryHub::new())
            .connect(&[], &opts)
            .await
            .unwrap();
        SessionTable::new(bus)
    }

    fn frame(reply: &str, body: &str) -> Frame {
        // ---
        Frame::new("listen", encode(&Message::new(body.to_string())).unwrap()).with_reply(reply)
    }

    #[tokio::test]
    async fn test_first_frame_opens_session() {
        // ---
        let table = table().await;

        let route = table.route(frame("a", "one")).await;
        let Route::Opened(socket) = route else {
            panic!("expected a new session, got {route:?}");
        };

        assert_eq!(socket.reply_to(), &Address::from("a"));
        assert_eq!(table.len().await, 1);
        assert_eq!(socket.recv().await.unwrap().body, Bytes::from("one"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        // ---
        let table = table().await;

        let Route::Opened(a) = table.route(frame("a", "a1")).await else {
            panic!("session a not opened");
        };
        let Route::Opened(b) = table.route(frame("b", "b1")).await else {
            panic!("session b not opened");
        };
        assert!(matches!(table.route(frame("b", "b2")).await, Route::Delivered));
        assert!(matches!(table.route(frame("a", "a2")).await, Route::Delivered));

        assert_eq!(a.recv().await.unwrap().body, Bytes::from("a1"));
        assert_eq!(a.recv().await.unwrap().body, Bytes::from("a2"));
        assert_eq!(b.recv().await.unwrap().body, Bytes::from("b1"));
        assert_eq!(b.recv().await.unwrap().body, Bytes::from("b2"));
        assert_eq!(a.backlog_len() + b.backlog_len(), 0);
    }

    #[tokio::test]
    async fn test_frame_for_closed_session_is_dropped() {
        // ---
        let table = table().await;

        let Route::Opened(socket) = table.route(frame("a", "first")).await else {
            panic!("session not opened");
        };
        socket.close().unwrap();

        let route = table.route(frame("a", "late")).await;
        assert!(matches!(route, Route::Dropped(ref reply) if reply.as_str() == "a"));
        assert_eq!(table.len().await, 1);
        assert_eq!(socket.backlog_len(), 0);
    }

    #[tokio::test]
    async fn test_removed_subject_opens_fresh_session() {
        // ---
        let table = table().await;

        let Route::Opened(old) = table.route(frame("a", "first")).await else {
            panic!("session not opened");
        };
        old.close().unwrap();
        assert!(table.remove(&old).await);
        assert!(!table.contains(&Address::from("a")).await);

        let Route::Opened(new) = table.route(frame("a", "again")).await else {
            panic!("subject was not reusable");
        };
        assert!(!new.same_session(&old));
        assert!(!new.is_closed());
        assert_eq!(new.recv().await.unwrap().body, Bytes::from("again"));

        // A stale cleanup for the old socket must not evict the new one.
        assert!(!table.remove(&old).await);
        assert!(table.contains(&Address::from("a")).await);
    }

    #[tokio::test]
    async fn test_frame_without_reply_is_unroutable() {
        // ---
        let table = table().await;

        let route = table.route(Frame::new("listen", Bytes::new())).await;
        assert!(matches!(route, Route::Unroutable(_)));
        assert_eq!(table.len().await, 0);
    }
}
