// src/transport/nats/transport.rs

//! NATS bus implementation.
//!
//! Each [`NatsBus`] wraps one `async_nats::Client`. The client already
//! multiplexes its own IO task, so unlike actor-based broker adapters no
//! command channel is needed here: publishes and subscriptions go straight
//! to the client.
//!
//! ## Delivery semantics
//!
//! - Subjects are passed to the server verbatim; wildcard subjects behave
//!   as NATS defines them.
//! - Subscriptions buffer messages client-side; `next_frame()` pulls from
//!   that buffer with a timeout.
//! - A slow consumer may lose messages if the server drops them. This is a
//!   deviation from the in-memory reference bus.

use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ServerAddr, Subscriber};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::{
    //
    log_debug,
    log_error,
    log_info,
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

/// One NATS client connection.
struct NatsBus {
    // ---
    state: ConnectionState,
    client: Client,
}

#[async_trait::async_trait]
impl Bus for NatsBus {
    // ---
    fn bus_id(&self) -> &str {
        self.state.bus_id()
    }

    async fn publish(&self, subject: &Address, payload: Bytes) -> Result<()> {
        // ---
        self.state.ensure_open()?;
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|err| {
                log_error!("{}: publish to {subject} failed: {err}", self.bus_id());
                Error::Transport(err.to_string())
            })
    }

    async fn publish_with_reply(
        &self,
        subject: &Address,
        reply: &Address,
        payload: Bytes,
    ) -> Result<()> {
        // ---
        self.state.ensure_open()?;
        self.client
            .publish_with_reply(subject.to_string(), reply.to_string(), payload)
            .await
            .map_err(|err| {
                log_error!("{}: publish to {subject} failed: {err}", self.bus_id());
                Error::Transport(err.to_string())
            })
    }

    async fn subscribe_sync(&self, subject: &Address) -> Result<SubscriptionPtr> {
        // ---
        self.state
            .ensure_open()
            .map_err(|err| Error::Subscribe(err.to_string()))?;

        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|err| Error::Subscribe(err.to_string()))?;

        log_debug!("{}: subscribed to {subject}", self.bus_id());

        Ok(Box::new(NatsSubscription {
            subject: subject.clone(),
            subscriber,
        }))
    }

    fn new_inbox(&self) -> Address {
        Address::from(self.client.new_inbox())
    }

    /// Drain and close the connection.
    ///
    /// Pending publishes are flushed, every subscription is drained and the
    /// client shuts down. Later publishes and subscribes on this bus return
    /// an error, matching the in-memory bus.
    async fn close(&self) -> Result<()> {
        // ---
        if !self.state.mark_closed() {
            return Ok(());
        }

        log_debug!("{}: closing connection", self.bus_id());

        self.client
            .drain()
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}

struct NatsSubscription {
    // ---
    subject: Address,
    subscriber: Subscriber,
}

#[async_trait::async_trait]
impl BusSubscription for NatsSubscription {
    // ---
    fn subject(&self) -> &Address {
        &self.subject
    }

    async fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        // ---
        match tokio::time::timeout(timeout, self.subscriber.next()).await {
            Ok(Some(msg)) => Ok(Frame {
                subject: Address::from(msg.subject.as_str()),
                reply: msg.reply.map(|reply| Address::from(reply.as_str())),
                payload: msg.payload,
            }),
            Ok(None) => Err(Error::SubscriptionClosed),
            Err(_elapsed) => Err(Error::Timeout),
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        // ---
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}

struct NatsConnector;

#[async_trait::async_trait]
impl Connector for NatsConnector {
    // ---
    fn name(&self) -> &str {
        "nats"
    }

    async fn connect(&self, endpoints: &[String], opts: &ConnectOptions) -> Result<BusPtr> {
        // ---
        let servers = endpoints
            .iter()
            .map(|endpoint| {
                endpoint
                    .parse::<ServerAddr>()
                    .map_err(|err| Error::Connect(format!("invalid endpoint {endpoint}: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut options = async_nats::ConnectOptions::new().require_tls(opts.secure);

        if let Some(timeout) = opts.timeout {
            options = options.connection_timeout(timeout);
        }

        if let Some(tls) = &opts.tls {
            if let Some(ca) = &tls.root_certificates {
                options = options.add_root_certificates(ca.clone());
            }
            if let Some((cert, key)) = &tls.client_cert {
                options = options.add_client_certificate(cert.clone(), key.clone());
            }
        }

        let client = options.connect(servers).await.map_err(|err| {
            log_error!("nats: connect to {endpoints:?} failed: {err}");
            Error::Connect(err.to_string())
        })?;

        let bus_id = format!("nats-{}", uuid::Uuid::new_v4().simple());
        log_info!("{bus_id}: connected to {endpoints:?}");

        Ok(Arc::new(NatsBus {
            state: ConnectionState::new(bus_id),
            client,
        }))
    }
}

/// Create a connector that opens NATS client connections.
///
/// # Errors
///
/// Infallible when the `transport_nats` feature is enabled; the signature
/// matches the disabled stub.
pub fn create_connector() -> Result<ConnectorPtr> {
    // ---
    Ok(Arc::new(NatsConnector))
}
