//! Transport factory.
//!
//! A [`Transport`] turns bus endpoints into [`Client`]s and [`Listener`]s.
//! [`BusTransport`] is the implementation over any [`Connector`](crate::Connector); it keeps
//! nothing but configuration and opens a fresh bus connection for every
//! `dial` and `listen`.
//!
//! # Listen subjects
//!
//! By default `listen` ignores the requested address and listens on a
//! unique inbox generated by the bus; callers advertise
//! [`Listener::addr`] to their clients. Set
//! [`ListenOptions::bind_requested`] to listen on the literal address
//! instead.

use std::fmt;
use std::sync::Arc;

use crate::{
    // ---
    log_debug,
    Address,
    Client,
    ConnectOptions,
    ConnectorPtr,
    DialOptions,
    Error,
    ListenOptions,
    Listener,
    Result,
    TransportOptions,
};

/// Endpoint used when no usable address is configured.
pub const DEFAULT_ENDPOINT: &str = "nats://127.0.0.1:4222";

/// Scheme prepended to endpoints that carry none.
const DEFAULT_SCHEME: &str = "nats://";

/// Normalize configured endpoints to URL form.
///
/// Blank entries are skipped and `nats://` is prepended to entries without
/// a scheme. An empty result falls back to [`DEFAULT_ENDPOINT`].
///
/// ```
/// use mom_socket::normalize_endpoints;
///
/// let endpoints = normalize_endpoints(["10.0.0.1:4222", "", "tls://bus:4443"]);
/// assert_eq!(endpoints, vec!["nats://10.0.0.1:4222", "tls://bus:4443"]);
///
/// assert_eq!(normalize_endpoints(Vec::<String>::new()), vec!["nats://127.0.0.1:4222"]);
/// ```
pub fn normalize_endpoints<I, S>(addrs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // ---
    let mut endpoints: Vec<String> = addrs
        .into_iter()
        .filter_map(|addr| {
            let addr = addr.as_ref().trim();
            if addr.is_empty() {
                None
            } else if addr.contains("://") {
                Some(addr.to_string())
            } else {
                Some(format!("{DEFAULT_SCHEME}{addr}"))
            }
        })
        .collect();

    if endpoints.is_empty() {
        endpoints.push(DEFAULT_ENDPOINT.to_string());
    }

    endpoints
}

/// Connection-oriented transport over a message bus.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Name the transport is registered under, e.g. `"nats"`.
    fn name(&self) -> &str;

    /// Connect a client to the listener at `addr`.
    ///
    /// # Errors
    ///
    /// Connect or subscribe failures, returned as-is. No retries.
    async fn dial(&self, addr: &str, opts: DialOptions) -> Result<Client>;

    /// Open a listener.
    ///
    /// # Errors
    ///
    /// Connect or subscribe failures, returned as-is. No retries.
    async fn listen(&self, addr: &str, opts: ListenOptions) -> Result<Listener>;
}

/// Shared transport pointer.
pub type TransportPtr = Arc<dyn Transport>;

/// [`Transport`] over the buses produced by a [`Connector`](crate::Connector).
pub struct BusTransport {
    // ---
    endpoints: Vec<String>,
    options: TransportOptions,
    connector: ConnectorPtr,
}

impl BusTransport {
    /// Create a transport; `addrs` are normalized with [`normalize_endpoints`].
    pub fn new<I, S>(addrs: I, options: TransportOptions, connector: ConnectorPtr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // ---
        Self {
            endpoints: normalize_endpoints(addrs),
            options,
            connector,
        }
    }

    /// Normalized bus endpoints.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Transport-wide options.
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }
}

#[async_trait::async_trait]
impl Transport for BusTransport {
    // ---
    fn name(&self) -> &str {
        self.connector.name()
    }

    async fn dial(&self, addr: &str, opts: DialOptions) -> Result<Client> {
        // ---
        if addr.is_empty() {
            return Err(Error::MissingConfig("dial address".into()));
        }

        let connect = ConnectOptions::resolve(
            &self.options,
            opts.secure,
            opts.tls.as_ref(),
            Some(opts.timeout),
        );
        let bus = self.connector.connect(&self.endpoints, &connect).await?;

        Client::open(bus, Address::from(addr), opts.recv_timeout).await
    }

    async fn listen(&self, addr: &str, opts: ListenOptions) -> Result<Listener> {
        // ---
        let connect = ConnectOptions::resolve(&self.options, opts.secure, opts.tls.as_ref(), None);
        let bus = self.connector.connect(&self.endpoints, &connect).await?;

        let subject = if opts.bind_requested {
            if addr.is_empty() {
                let _ = bus.close().await;
                return Err(Error::MissingConfig("listen address".into()));
            }
            Address::from(addr)
        } else {
            let inbox = bus.new_inbox();
            log_debug!("{}: requested {addr:?}, listening on {inbox}", bus.bus_id());
            inbox
        };

        match Listener::bind(bus.clone(), subject, opts.poll_interval).await {
            Ok(listener) => Ok(listener),
            Err(err) => {
                let _ = bus.close().await;
                Err(err)
            }
        }
    }
}

impl fmt::Display for BusTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.connector.name())
    }
}

impl fmt::Debug for BusTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusTransport")
            .field("name", &self.connector.name())
            .field("endpoints", &self.endpoints)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_normalize_adds_scheme_and_skips_blank() {
        // ---
        let endpoints = normalize_endpoints(["127.0.0.1:4222", "  ", "nats://a:1"]);
        assert_eq!(endpoints, vec!["nats://127.0.0.1:4222", "nats://a:1"]);
    }

    #[test]
    fn test_normalize_defaults_when_empty() {
        // ---
        assert_eq!(normalize_endpoints([""]), vec![DEFAULT_ENDPOINT]);
    }

    #[test]
    fn test_normalize_keeps_other_schemes() {
        // ---
        let endpoints = normalize_endpoints(["tls://secure:4443", "ws://edge:8080"]);
        assert_eq!(endpoints, vec!["tls://secure:4443", "ws://edge:8080"]);
    }
}
