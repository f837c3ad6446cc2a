//! Public, bus-agnostic transport options.
//!
//! These types intentionally contain no client-library concepts. Connectors
//! are responsible for interpreting them into concrete connection settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for establishing a client connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a client waits for a reply in [`Client::recv`](crate::Client::recv).
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between listener subscription polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// TLS material handed to the bus connector.
///
/// Paths are passed through untouched; loading and validating them is the
/// connector's job.
///
/// # Example
///
/// ```
/// use mom_socket::TlsConfig;
///
/// let tls = TlsConfig::default()
///     .with_root_certificates("/etc/nats/ca.pem")
///     .with_client_certificate("/etc/nats/client.pem", "/etc/nats/client.key");
/// assert!(tls.client_cert.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file with additional trusted root certificates.
    pub root_certificates: Option<PathBuf>,

    /// Client certificate and private key (PEM), for mutual TLS.
    pub client_cert: Option<(PathBuf, PathBuf)>,
}

impl TlsConfig {
    /// Trust the root certificates in `path`.
    pub fn with_root_certificates(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificates = Some(path.into());
        self
    }

    /// Present a client certificate.
    pub fn with_client_certificate(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert = Some((cert.into(), key.into()));
        self
    }
}

/// Options shared by every connection a transport opens.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    // ---
    /// Require an encrypted connection.
    pub secure: bool,

    /// TLS material. Setting it implies `secure`.
    pub tls: Option<TlsConfig>,
}

impl TransportOptions {
    /// Require (or stop requiring) an encrypted connection.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Use the given TLS material.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Per-call options for [`Transport::dial`](crate::Transport::dial).
#[derive(Debug, Clone)]
pub struct DialOptions {
    // ---
    /// Upper bound on establishing the bus connection.
    ///
    /// Default: 5 seconds
    pub timeout: Duration,

    /// How long [`Client::recv`](crate::Client::recv) waits for a reply.
    ///
    /// Fixed for the lifetime of the client.
    ///
    /// Default: 10 seconds
    pub recv_timeout: Duration,

    /// Require an encrypted connection, in addition to the transport-wide flag.
    pub secure: bool,

    /// TLS material overriding the transport-wide configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DIAL_TIMEOUT,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            secure: false,
            tls: None,
        }
    }
}

impl DialOptions {
    /// Set the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the client receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Require an encrypted connection.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Use the given TLS material for this connection.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Per-call options for [`Transport::listen`](crate::Transport::listen).
#[derive(Debug, Clone)]
pub struct ListenOptions {
    // ---
    /// Interval at which the accept loop wakes up when the bus is idle.
    ///
    /// Default: 60 seconds
    pub poll_interval: Duration,

    /// Listen on the requested address instead of a fresh unique inbox.
    ///
    /// Default: `false`. The listener reports its actual subject through
    /// [`Listener::addr`](crate::Listener::addr) either way.
    pub bind_requested: bool,

    /// Require an encrypted connection, in addition to the transport-wide flag.
    pub secure: bool,

    /// TLS material overriding the transport-wide configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            bind_requested: false,
            secure: false,
            tls: None,
        }
    }
}

impl ListenOptions {
    /// Set the accept loop poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bind the literal address passed to `listen`.
    pub fn with_bind_requested(mut self, bind: bool) -> Self {
        self.bind_requested = bind;
        self
    }

    /// Require an encrypted connection.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Use the given TLS material for this connection.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Resolved settings for a single bus connection, handed to a
/// [`Connector`](crate::Connector).
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Require an encrypted connection.
    pub secure: bool,

    /// TLS material, if any.
    pub tls: Option<TlsConfig>,

    /// Connect timeout; `None` leaves the connector default in place.
    pub timeout: Option<Duration>,
}

impl ConnectOptions {
    /// Merge transport-wide and per-call security settings.
    ///
    /// Per-call TLS wins over the transport-wide one. Any TLS material
    /// forces `secure`.
    pub(crate) fn resolve(
        transport: &TransportOptions,
        secure: bool,
        tls: Option<&TlsConfig>,
        timeout: Option<Duration>,
    ) -> Self {
        // ---
        let tls = tls.or(transport.tls.as_ref()).cloned();
        let secure = transport.secure || secure || tls.is_some();

        Self {
            secure,
            tls,
            timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_tls_forces_secure() {
        // ---
        let transport = TransportOptions::default().with_tls(TlsConfig::default());
        let opts = ConnectOptions::resolve(&transport, false, None, None);

        assert!(opts.secure);
        assert_eq!(opts.tls, Some(TlsConfig::default()));
    }

    #[test]
    fn test_call_tls_overrides_transport_tls() {
        // ---
        let transport = TransportOptions::default()
            .with_tls(TlsConfig::default().with_root_certificates("/transport/ca.pem"));
        let call = TlsConfig::default().with_root_certificates("/call/ca.pem");

        let opts = ConnectOptions::resolve(&transport, false, Some(&call), None);

        assert_eq!(opts.tls, Some(call));
    }

    #[test]
    fn test_plain_by_default() {
        // ---
        let dial = DialOptions::default();
        let opts = ConnectOptions::resolve(
            &TransportOptions::default(),
            dial.secure,
            dial.tls.as_ref(),
            Some(dial.timeout),
        );

        assert!(!opts.secure);
        assert!(opts.tls.is_none());
        assert_eq!(opts.timeout, Some(DEFAULT_DIAL_TIMEOUT));
    }
}
