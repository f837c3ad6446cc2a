// src/client/mod.rs
//! Client side of a session.
//!
//! # Architecture
//!
//! A [`Client`] owns one bus connection, a private inbox subject generated by
//! the bus, and a synchronous subscription on that inbox. Every request is
//! published to the server subject with the inbox as reply subject, so the
//! listener files all of a client's requests under the same session.
//!
//! Replies are returned strictly in arrival order. The client does not
//! correlate replies with requests; callers pairing `send`/`recv` get FIFO
//! semantics and nothing more.

use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::domain::{decode, encode};
use crate::{
    // ---
    log_debug,
    Address,
    BusPtr,
    Message,
    Result,
    SubscriptionPtr,
};

/// Dialed connection to a listener.
pub struct Client {
    // ---
    bus: BusPtr,
    remote: Address,
    reply: Address,
    recv_timeout: Duration,
    subscription: Mutex<SubscriptionPtr>,
}

impl Client {
    // ---
    /// Allocate an inbox on `bus` and subscribe to it.
    ///
    /// On failure the connection is closed before the error is returned.
    pub(crate) async fn open(bus: BusPtr, remote: Address, recv_timeout: Duration) -> Result<Self> {
        // ---
        let reply = bus.new_inbox();

        let subscription = match bus.subscribe_sync(&reply).await {
            Ok(sub) => sub,
            Err(err) => {
                let _ = bus.close().await;
                return Err(err);
            }
        };

        log_debug!("{}: dialed {remote}, replies on {reply}", bus.bus_id());

        Ok(Self {
            bus,
            remote,
            reply,
            recv_timeout,
            subscription: Mutex::new(subscription),
        })
    }

    /// Subject requests are published to.
    pub fn remote(&self) -> &Address {
        &self.remote
    }

    /// Private inbox replies arrive on.
    pub fn reply_to(&self) -> &Address {
        &self.reply
    }

    /// Publish `msg` to the server with this client's inbox as reply subject.
    pub async fn send(&self, msg: &Message) -> Result<()> {
        // ---
        let payload = encode(msg)?;
        self.bus
            .publish_with_reply(&self.remote, &self.reply, payload)
            .await
    }

    /// Wait for the next reply on the inbox.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`](crate::Error::Timeout) if nothing arrives within
    ///   the receive timeout fixed at dial time. Not retried.
    /// - [`Error::Serialization`](crate::Error::Serialization) if the reply
    ///   does not decode.
    pub async fn recv(&self) -> Result<Message> {
        // ---
        let frame = {
            let mut sub = self.subscription.lock().await;
            sub.next_frame(self.recv_timeout).await?
        };
        decode(&frame.payload)
    }

    /// Send `msg` and wait for the next reply.
    ///
    /// Shorthand for [`send`](Client::send) followed by
    /// [`recv`](Client::recv); the reply is whatever arrives next on the
    /// inbox.
    pub async fn request(&self, msg: &Message) -> Result<Message> {
        // ---
        self.send(msg).await?;
        self.recv().await
    }

    /// Unsubscribe the inbox and close the connection.
    ///
    /// Using the client afterwards returns whatever errors the bus reports.
    pub async fn close(&self) -> Result<()> {
        // ---
        let unsubscribed = self.subscription.lock().await.unsubscribe().await;
        self.bus.close().await?;
        unsubscribed
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("remote", &self.remote)
            .field("reply", &self.reply)
            .field("recv_timeout", &self.recv_timeout)
            .finish_non_exhaustive()
    }
}
