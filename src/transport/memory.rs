//! In-memory bus implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Bus` trait. It is intended primarily for testing, local execution, and
//! as a reference for bus semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory bus defines the **reference behavior** the socket layer is
//! written against. Other bus adapters are expected to approximate this
//! behavior as closely as their underlying systems allow and to document any
//! unavoidable deviations.
//!
//! - Once `subscribe_sync()` returns, frames published *after* that point to
//!   the same subject are deliverable.
//! - A subject matches a subscription only on exact string equality.
//! - Frames are buffered per subscription without bound; publishers never
//!   wait on slow subscribers.
//! - Frames from one publisher to one subject arrive in publish order.
//!
//! ## Non-Goals
//!
//! This bus does not emulate the failure modes, persistence, or delivery
//! guarantees of any specific broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    transport::ConnectionState,
    Address,
    Bus,
    BusPtr,
    BusSubscription,
    ConnectOptions,
    Connector,
    ConnectorPtr,
    Error,
    Frame,
    Result,
    SubscriptionPtr,
};

/// Prefix of subjects returned by `new_inbox()`.
const INBOX_PREFIX: &str = "_INBOX.";

struct SubscriberEntry {
    // ---
    id: u64,
    conn_id: u64,
    tx: mpsc::UnboundedSender<Frame>,
}

/// Shared message bus for in-memory connections.
///
/// Simulates a broker within a single process. Every connection opened from
/// the same hub can publish to and receive from every other one, exactly as
/// clients of a real broker would. Hubs share nothing with each other, so
/// tests construct one per case.
///
/// ```
/// # use mom_socket::{create_memory_connector, MemoryHub};
/// let hub = MemoryHub::new();
/// let connector = create_memory_connector(hub.clone());
/// assert_eq!(connector.name(), "memory");
/// ```
pub struct MemoryHub {
    // ---
    subscriptions: Mutex<HashMap<Address, Vec<SubscriberEntry>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    /// Refuse all future connections and drop every live subscription.
    ///
    /// Pending `next_frame()` calls observe
    /// [`Error::SubscriptionClosed`].
    pub fn shutdown(&self) {
        // ---
        self.shut_down.store(true, Ordering::SeqCst);
        lock_ignore_poison(&self.subscriptions).clear();
    }

    /// Whether [`shutdown`](MemoryHub::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `subject`.
    pub fn subscriber_count(&self, subject: &Address) -> usize {
        // ---
        lock_ignore_poison(&self.subscriptions)
            .get(subject)
            .map_or(0, Vec::len)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn deliver(&self, frame: Frame) {
        // ---
        let mut subs = lock_ignore_poison(&self.subscriptions);

        if let Some(entries) = subs.get_mut(&frame.subject) {
            // A closed receiver means the subscription handle was dropped
            // without unsubscribing; evict it.
            entries.retain(|entry| entry.tx.send(frame.clone()).is_ok());

            if entries.is_empty() {
                subs.remove(&frame.subject);
            }
        }
    }

    fn register(&self, conn_id: u64, subject: &Address) -> (u64, mpsc::UnboundedReceiver<Frame>) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id();

        lock_ignore_poison(&self.subscriptions)
            .entry(subject.clone())
            .or_default()
            .push(SubscriberEntry { id, conn_id, tx });

        (id, rx)
    }

    fn unregister(&self, subject: &Address, id: u64) {
        // ---
        let mut subs = lock_ignore_poison(&self.subscriptions);

        if let Some(entries) = subs.get_mut(subject) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                subs.remove(subject);
            }
        }
    }

    fn unregister_connection(&self, conn_id: u64) {
        // ---
        let mut subs = lock_ignore_poison(&self.subscriptions);

        subs.retain(|_, entries| {
            entries.retain(|entry| entry.conn_id != conn_id);
            !entries.is_empty()
        });
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }
}

/// One connection to a [`MemoryHub`].
struct MemoryBus {
    // ---
    state: ConnectionState,
    conn_id: u64,
    hub: Arc<MemoryHub>,
}

impl MemoryBus {
    fn ensure_open(&self) -> Result<()> {
        // ---
        self.state.ensure_open()?;
        if self.hub.is_shut_down() {
            return Err(Error::Transport(format!(
                "{}: memory hub is shut down",
                self.state.bus_id()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Bus for MemoryBus {
    // ---
    fn bus_id(&self) -> &str {
        self.state.bus_id()
    }

    async fn publish(&self, subject: &Address, payload: Bytes) -> Result<()> {
        // ---
        self.ensure_open()?;
        log_debug!("{}: publish to {subject}", self.bus_id());

        self.hub.deliver(Frame {
            subject: subject.clone(),
            reply: None,
            payload,
        });
        Ok(())
    }

    async fn publish_with_reply(
        &self,
        subject: &Address,
        reply: &Address,
        payload: Bytes,
    ) -> Result<()> {
        // ---
        self.ensure_open()?;
        log_debug!("{}: publish to {subject} reply {reply}", self.bus_id());

        self.hub.deliver(Frame {
            subject: subject.clone(),
            reply: Some(reply.clone()),
            payload,
        });
        Ok(())
    }

    /// Register a subscription on the shared hub.
    ///
    /// Once this returns, any later publish to `subject` is deliverable to
    /// the returned subscription.
    async fn subscribe_sync(&self, subject: &Address) -> Result<SubscriptionPtr> {
        // ---
        self.ensure_open()
            .map_err(|err| Error::Subscribe(err.to_string()))?;
        log_debug!("{}: subscribe to {subject}", self.bus_id());

        let (id, rx) = self.hub.register(self.conn_id, subject);

        Ok(Box::new(MemorySubscription {
            id,
            subject: subject.clone(),
            hub: Arc::clone(&self.hub),
            inbox: rx,
            active: true,
        }))
    }

    fn new_inbox(&self) -> Address {
        Address::from(format!("{INBOX_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Close the connection.
    ///
    /// Drops every subscription opened through this connection. Other
    /// connections on the same hub are unaffected.
    async fn close(&self) -> Result<()> {
        // ---
        if self.state.mark_closed() {
            log_debug!("{}: closing connection", self.bus_id());
            self.hub.unregister_connection(self.conn_id);
        }
        Ok(())
    }
}

struct MemorySubscription {
    // ---
    id: u64,
    subject: Address,
    hub: Arc<MemoryHub>,
    inbox: mpsc::UnboundedReceiver<Frame>,
    active: bool,
}

#[async_trait::async_trait]
impl BusSubscription for MemorySubscription {
    // ---
    fn subject(&self) -> &Address {
        &self.subject
    }

    async fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        // ---
        match tokio::time::timeout(timeout, self.inbox.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(Error::SubscriptionClosed),
            Err(_elapsed) => Err(Error::Timeout),
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        // ---
        if self.active {
            self.active = false;
            self.hub.unregister(&self.subject, self.id);
            self.inbox.close();
        }
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if self.active {
            self.hub.unregister(&self.subject, self.id);
        }
    }
}

/// Connects to a [`MemoryHub`]; endpoints are ignored.
struct MemoryConnector {
    // ---
    hub: Arc<MemoryHub>,
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    // ---
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self, _endpoints: &[String], _opts: &ConnectOptions) -> Result<BusPtr> {
        // ---
        if self.hub.is_shut_down() {
            return Err(Error::Connect("memory hub is shut down".into()));
        }

        let conn_id = self.hub.next_id();
        let bus_id = format!("memory-{conn_id}");
        log_debug!("{bus_id}: connected");

        Ok(Arc::new(MemoryBus {
            state: ConnectionState::new(bus_id),
            conn_id,
            hub: Arc::clone(&self.hub),
        }))
    }
}

/// Create a connector that opens connections on `hub`.
///
/// Every bus returned by the connector shares the hub, so a listener and a
/// client built from the same connector can reach each other.
pub fn create_connector(hub: Arc<MemoryHub>) -> ConnectorPtr {
    // ---
    Arc::new(MemoryConnector { hub })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn opts() -> ConnectOptions {
        ConnectOptions {
            secure: false,
            tls: None,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_exact_subject_only() {
        // ---
        let hub = MemoryHub::new();
        let bus = create_connector(hub.clone())
            .connect(&[], &opts())
            .await
            .unwrap();

        let mut a = bus.subscribe_sync(&Address::from("a")).await.unwrap();
        let mut ab = bus.subscribe_sync(&Address::from("a.b")).await.unwrap();

        bus.publish_with_reply(&Address::from("a"), &Address::from("r"), Bytes::from("x"))
            .await
            .unwrap();

        let frame = a.next_frame(Duration::from_millis(100)).await.unwrap();
        assert_eq!(frame.reply, Some(Address::from("r")));
        assert_eq!(frame.payload, Bytes::from("x"));

        let err = ab.next_frame(Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_subscription() {
        // ---
        let hub = MemoryHub::new();
        let bus = create_connector(hub.clone())
            .connect(&[], &opts())
            .await
            .unwrap();
        let subject = Address::from("s");

        let mut sub = bus.subscribe_sync(&subject).await.unwrap();
        assert_eq!(hub.subscriber_count(&subject), 1);

        sub.unsubscribe().await.unwrap();
        assert_eq!(hub.subscriber_count(&subject), 0);

        let err = sub.next_frame(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, Error::SubscriptionClosed));
    }

    #[tokio::test]
    async fn test_close_drops_only_own_subscriptions() {
        // ---
        let hub = MemoryHub::new();
        let connector = create_connector(hub.clone());
        let one = connector.connect(&[], &opts()).await.unwrap();
        let two = connector.connect(&[], &opts()).await.unwrap();
        let subject = Address::from("shared");

        let _s1 = one.subscribe_sync(&subject).await.unwrap();
        let _s2 = two.subscribe_sync(&subject).await.unwrap();
        assert_eq!(hub.subscriber_count(&subject), 2);

        one.close().await.unwrap();
        assert_eq!(hub.subscriber_count(&subject), 1);

        let err = one.publish(&subject, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_connections() {
        // ---
        let hub = MemoryHub::new();
        hub.shutdown();

        let result = create_connector(hub).connect(&[], &opts()).await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_inboxes_are_unique() {
        // ---
        let bus = create_connector(MemoryHub::new())
            .connect(&[], &opts())
            .await
            .unwrap();

        let a = bus.new_inbox();
        let b = bus.new_inbox();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(INBOX_PREFIX));
    }
}
