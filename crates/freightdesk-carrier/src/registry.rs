//! Carrier registry.
//!
//! Maps carriers to configuration and lazily constructed adapter
//! instances. The registry is built by the application and passed down
//! to whatever needs an adapter; there are no process-wide singletons,
//! so tests and multi-tenant deployments can hold several registries
//! with different settings side by side.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::adapters::{DhlAdapter, FedexAdapter, UpsAdapter, UspsAdapter};
use crate::config::CarrierConfig;
use crate::error::{CarrierError, CarrierResult};
use crate::traits::CarrierAdapter;
use crate::types::CarrierType;

/// Registry of configured carriers and their adapter instances.
///
/// Adapters are built on first use and cached. Reconfiguring a carrier
/// evicts its cached adapter so the next lookup reflects the new
/// settings.
pub struct CarrierRegistry {
    configs: RwLock<HashMap<CarrierType, CarrierConfig>>,
    adapters: RwLock<HashMap<CarrierType, Arc<dyn CarrierAdapter>>>,
}

impl CarrierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a carrier's configuration.
    ///
    /// Any cached adapter for the carrier is evicted; the next
    /// [`get_adapter`](Self::get_adapter) call rebuilds it with the new
    /// settings.
    pub async fn configure(&self, carrier: CarrierType, config: CarrierConfig) -> CarrierResult<()> {
        config.validate()?;

        self.configs.write().await.insert(carrier, config);
        if self.adapters.write().await.remove(&carrier).is_some() {
            debug!(carrier = %carrier, "Evicted cached adapter after reconfiguration");
        }
        Ok(())
    }

    /// Register a pre-built adapter instance.
    ///
    /// Used for adapters constructed outside the registry, for example
    /// instrumented test doubles. The carrier is marked as configured
    /// with default settings if it was not configured before.
    pub async fn register_adapter(&self, adapter: Arc<dyn CarrierAdapter>) {
        let carrier = adapter.carrier_type();
        self.configs
            .write()
            .await
            .entry(carrier)
            .or_insert_with(CarrierConfig::default);
        self.adapters.write().await.insert(carrier, adapter);
    }

    /// Get the adapter for a carrier, building it on first use.
    ///
    /// Fails with [`CarrierError::UnsupportedCarrier`] when the carrier
    /// has no registered configuration.
    pub async fn get_adapter(&self, carrier: CarrierType) -> CarrierResult<Arc<dyn CarrierAdapter>> {
        if let Some(adapter) = self.adapters.read().await.get(&carrier) {
            return Ok(adapter.clone());
        }

        let config = self
            .configs
            .read()
            .await
            .get(&carrier)
            .cloned()
            .ok_or_else(|| CarrierError::unsupported(carrier.as_str()))?;

        let built = Self::build_adapter(carrier, config);
        let mut cache = self.adapters.write().await;
        // A concurrent caller may have built one in the meantime
        let adapter = cache.entry(carrier).or_insert(built).clone();
        Ok(adapter)
    }

    /// Get the stored configuration for a carrier.
    pub async fn config_for(&self, carrier: CarrierType) -> Option<CarrierConfig> {
        self.configs.read().await.get(&carrier).cloned()
    }

    /// Carriers with a registered configuration, in declaration order.
    pub async fn configured_carriers(&self) -> Vec<CarrierType> {
        let configs = self.configs.read().await;
        CarrierType::all()
            .into_iter()
            .filter(|c| configs.contains_key(c))
            .collect()
    }

    /// Probe every configured carrier concurrently.
    ///
    /// A probe failure, or an adapter that cannot be built, records
    /// `false` for that carrier; one broken carrier never aborts the
    /// sweep.
    pub async fn check_all_availability(&self) -> HashMap<CarrierType, bool> {
        let mut probes = Vec::new();
        for carrier in self.configured_carriers().await {
            match self.get_adapter(carrier).await {
                Ok(adapter) => {
                    probes.push((
                        carrier,
                        Some(tokio::spawn(async move { adapter.is_available().await })),
                    ));
                }
                Err(e) => {
                    warn!(carrier = %carrier, error = %e, "Could not build adapter for probe");
                    probes.push((carrier, None));
                }
            }
        }

        let mut results = HashMap::new();
        for (carrier, probe) in probes {
            let available = match probe {
                Some(handle) => handle.await.unwrap_or(false),
                None => false,
            };
            results.insert(carrier, available);
        }
        results
    }

    /// Drop all cached adapters. Configurations are kept.
    pub async fn clear_cache(&self) {
        self.adapters.write().await.clear();
    }

    fn build_adapter(carrier: CarrierType, config: CarrierConfig) -> Arc<dyn CarrierAdapter> {
        match carrier {
            CarrierType::Ups => Arc::new(UpsAdapter::new(config)),
            CarrierType::Fedex => Arc::new(FedexAdapter::new(config)),
            CarrierType::Dhl => Arc::new(DhlAdapter::new(config)),
            CarrierType::Usps => Arc::new(UspsAdapter::new(config)),
        }
    }
}

impl Default for CarrierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
