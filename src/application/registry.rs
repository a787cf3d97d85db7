use crate::domain::gateway::{GatewayConfig, PaymentGateway};
use crate::error::{PaymentError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One configured gateway: its static config plus the app handle that
/// executes actions.
#[derive(Clone)]
pub struct GatewayEntry {
    pub config: GatewayConfig,
    pub app: Arc<dyn PaymentGateway>,
}

/// Read-mostly configuration store keyed by gateway identifier.
///
/// Loaded once at startup and replaced wholesale by `refresh`; request
/// handling never mutates it.
#[derive(Default)]
pub struct GatewayRegistry {
    entries: RwLock<HashMap<String, GatewayEntry>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the full set of configured gateways. Used for both the
    /// initial load and explicit refreshes.
    pub async fn refresh(&self, gateways: Vec<(GatewayConfig, Arc<dyn PaymentGateway>)>) {
        let mut entries = self.entries.write().await;
        entries.clear();
        for (config, app) in gateways {
            entries.insert(config.gateway_id.clone(), GatewayEntry { config, app });
        }
        tracing::debug!(count = entries.len(), "gateway registry refreshed");
    }

    pub async fn get(&self, gateway_id: &str) -> Result<GatewayEntry> {
        let entries = self.entries.read().await;
        entries
            .get(gateway_id)
            .cloned()
            .ok_or_else(|| PaymentError::UnknownGateway(gateway_id.to_string()))
    }

    pub async fn config(&self, gateway_id: &str) -> Result<GatewayConfig> {
        Ok(self.get(gateway_id).await?.config)
    }

    pub async fn supports_currency(&self, gateway_id: &str, currency: &str) -> Result<bool> {
        Ok(self.config(gateway_id).await?.supports_currency(currency))
    }

    pub async fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
