//! Transport builder.
//!
//! Provides a fluent builder API for constructing a [`BusTransport`] with
//! clear separation between required and optional configuration.

use std::sync::Arc;

use crate::{
    // ---
    create_memory_connector,
    create_nats_connector,
    BusTransport,
    ConnectorPtr,
    Error,
    MemoryHub,
    Result,
    TlsConfig,
    TransportOptions,
};

/// Builder for [`BusTransport`].
///
/// Exactly one bus must be chosen, either with a sugar method
/// ([`memory`](TransportBuilder::memory), [`nats`](TransportBuilder::nats))
/// or with an explicit [`connector`](TransportBuilder::connector).
///
/// # Examples
///
/// ## In-process bus
/// ```
/// use mom_socket::{MemoryHub, Transport, TransportBuilder};
///
/// # fn example() -> mom_socket::Result<()> {
/// let transport = TransportBuilder::new()
///     .memory(MemoryHub::new())
///     .build()?;
/// assert_eq!(transport.name(), "memory");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
///
/// ## NATS cluster
/// ```no_run
/// use mom_socket::TransportBuilder;
///
/// # fn example() -> mom_socket::Result<()> {
/// let transport = TransportBuilder::new()
///     .address("nats-1:4222")
///     .address("nats-2:4222")
///     .secure(true)
///     .nats()
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct TransportBuilder {
    addresses: Vec<String>,
    options: TransportOptions,
    connector: Option<ConnectorPtr>,

    // Track which sugar methods were called (conflicts detected at build())
    memory_hub: Option<Arc<MemoryHub>>,
    called_nats: bool,
}

impl TransportBuilder {
    /// Create a new transport builder.
    pub fn new() -> Self {
        Self {
            addresses: Vec::new(),
            options: TransportOptions::default(),
            connector: None,
            memory_hub: None,
            called_nats: false,
        }
    }

    /// Add a bus endpoint, e.g. `"127.0.0.1:4222"` or `"nats://bus:4222"`.
    pub fn address(mut self, addr: impl Into<String>) -> Self {
        self.addresses.push(addr.into());
        self
    }

    /// Add several bus endpoints.
    pub fn addresses<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses.extend(addrs.into_iter().map(Into::into));
        self
    }

    /// Require encrypted connections.
    pub fn secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Use the given TLS material for every connection (implies `secure`).
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.options.tls = Some(tls);
        self
    }

    /// Use an explicit connector.
    ///
    /// Cannot be used together with [`memory`](TransportBuilder::memory) or
    /// [`nats`](TransportBuilder::nats).
    pub fn connector(mut self, connector: ConnectorPtr) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Connect through an in-process [`MemoryHub`] (sugar method).
    pub fn memory(mut self, hub: Arc<MemoryHub>) -> Self {
        self.memory_hub = Some(hub);
        self
    }

    /// Connect to NATS servers (sugar method).
    ///
    /// Requires the `transport_nats` feature; `build()` fails without it.
    pub fn nats(mut self) -> Self {
        self.called_nats = true;
        self
    }

    /// Build the transport (consumes self).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No bus was chosen
    /// - More than one bus was chosen
    /// - The chosen bus is not compiled in
    pub fn build(self) -> Result<BusTransport> {
        // ---
        let chosen = [
            self.connector.is_some(),
            self.memory_hub.is_some(),
            self.called_nats,
        ]
        .iter()
        .filter(|&&x| x)
        .count();

        if chosen > 1 {
            return Err(Error::ConfigConflict(
                "choose exactly one of connector(), memory(), nats()".into(),
            ));
        }

        let connector = match (self.connector, self.memory_hub, self.called_nats) {
            (Some(connector), _, _) => connector,
            (None, Some(hub), _) => create_memory_connector(hub),
            (None, None, true) => create_nats_connector()?,
            (None, None, false) => {
                return Err(Error::MissingConfig(
                    "a bus: connector(), memory() or nats()".into(),
                ));
            }
        };

        Ok(BusTransport::new(self.addresses, self.options, connector))
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Transport, DEFAULT_ENDPOINT};

    #[test]
    fn test_memory_build() {
        // ---
        let transport = TransportBuilder::new()
            .address("bus:4222")
            .memory(MemoryHub::new())
            .build()
            .unwrap();

        assert_eq!(transport.name(), "memory");
        assert_eq!(transport.to_string(), "memory");
        assert_eq!(transport.endpoints(), ["nats://bus:4222".to_string()]);
    }

    #[test]
    fn test_no_bus_is_missing_config() {
        // ---
        let result = TransportBuilder::new().build();
        assert!(matches!(result, Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_two_buses_conflict() {
        // ---
        let hub = MemoryHub::new();
        let result = TransportBuilder::new()
            .memory(hub.clone())
            .connector(create_memory_connector(hub))
            .build();

        assert!(matches!(result, Err(Error::ConfigConflict(_))));
    }

    #[test]
    fn test_tls_is_carried() {
        // ---
        let transport = TransportBuilder::new()
            .tls(TlsConfig::default().with_root_certificates("/ca.pem"))
            .memory(MemoryHub::new())
            .build()
            .unwrap();

        assert!(transport.options().tls.is_some());
        assert_eq!(transport.endpoints(), [DEFAULT_ENDPOINT.to_string()]);
    }

    #[cfg(not(feature = "transport_nats"))]
    #[test]
    fn test_nats_without_feature_fails() {
        // ---
        let result = TransportBuilder::new().nats().build();
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
