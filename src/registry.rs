//! Explicit transport registry.
//!
//! Maps transport names to factories. The registry is an ordinary value:
//! the application's composition root builds one, registers the transports
//! it wants, and passes it wherever a transport is chosen by name. Nothing
//! is registered at load time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    // ---
    BusTransport,
    ConnectorPtr,
    Error,
    Result,
    TransportOptions,
    TransportPtr,
};

/// Builds a transport from endpoint addresses and options.
pub type TransportFactory =
    Arc<dyn Fn(Vec<String>, TransportOptions) -> Result<TransportPtr> + Send + Sync>;

/// Factory producing [`BusTransport`]s over `connector`.
pub fn connector_factory(connector: ConnectorPtr) -> TransportFactory {
    // ---
    Arc::new(move |addrs, options| {
        let transport = BusTransport::new(addrs, options, Arc::clone(&connector));
        Ok(Arc::new(transport) as TransportPtr)
    })
}

/// Name → factory table.
///
/// ```
/// use mom_socket::{connector_factory, create_memory_connector, MemoryHub, TransportOptions,
///     TransportRegistry};
///
/// let registry = TransportRegistry::new()
///     .register("memory", connector_factory(create_memory_connector(MemoryHub::new())));
///
/// let transport = registry
///     .create("memory", vec!["bus:4222".into()], TransportOptions::default())
///     .unwrap();
/// assert_eq!(transport.name(), "memory");
/// assert!(registry.create("carrier-pigeon", vec![], TransportOptions::default()).is_err());
/// ```
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(mut self, name: impl Into<String>, factory: TransportFactory) -> Self {
        self.insert(name, factory);
        self
    }

    /// In-place variant of [`register`](TransportRegistry::register).
    pub fn insert(&mut self, name: impl Into<String>, factory: TransportFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the transport registered under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTransport`] if nothing is registered under `name`,
    /// otherwise whatever the factory returns.
    pub fn create(
        &self,
        name: &str,
        addrs: Vec<String>,
        options: TransportOptions,
    ) -> Result<TransportPtr> {
        // ---
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownTransport(name.to_string()))?;

        factory(addrs, options)
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("names", &self.names())
            .finish()
    }
}
