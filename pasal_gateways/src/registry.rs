use std::{collections::HashMap, sync::Arc, time::Duration};

use log::*;

use crate::{EsewaApi, GatewayAdapter, GatewayConfig, GatewayError, KhaltiApi, ManualGateway};

/// The one place provider selection happens. Everything else addresses gateways by slug.
#[derive(Clone)]
pub struct GatewayRegistry {
    adapters: HashMap<&'static str, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    /// Builds the standard set of adapters: Khalti, eSewa, COD and bank transfer.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let mut registry = Self { adapters: HashMap::new() };
        registry.register(Arc::new(KhaltiApi::new(config.khalti.clone(), &config.base_url, timeout)?));
        registry.register(Arc::new(EsewaApi::new(config.esewa.clone(), &config.base_url, timeout)?));
        registry.register(Arc::new(ManualGateway::cash_on_delivery()));
        registry.register(Arc::new(ManualGateway::bank_transfer()));
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn GatewayAdapter>) {
        debug!("🔌️ Registered payment gateway '{}'", adapter.slug());
        self.adapters.insert(adapter.slug(), adapter);
    }

    pub fn get(&self, slug: &str) -> Result<Arc<dyn GatewayAdapter>, GatewayError> {
        self.adapters.get(slug).cloned().ok_or_else(|| GatewayError::UnknownGateway(slug.to_string()))
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.adapters.contains_key(slug)
    }

    pub fn slugs(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_registry_knows_all_providers() {
        let registry = GatewayRegistry::from_config(&GatewayConfig::default()).unwrap();
        for slug in ["khalti", "esewa", "cod", "bank_transfer"] {
            assert!(registry.contains(slug), "missing {slug}");
        }
        assert!(registry.get("paypal").is_err());
        assert!(registry.get("khalti").unwrap().is_digital());
        assert!(!registry.get("cod").unwrap().is_digital());
    }
}
