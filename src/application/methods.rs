use crate::application::registry::GatewayRegistry;
use crate::domain::gateway::{DeleteRequest, DeleteResponse, PaymentMethodData};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A gateway that failed to answer a listing request. The rest of the
/// listing is still returned.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayListingError {
    pub gateway_id: String,
    pub message: String,
}

/// Merged listing across every configured gateway.
#[derive(Debug, Clone, Default)]
pub struct MethodListing {
    pub methods: Vec<PaymentMethodData>,
    pub failures: Vec<GatewayListingError>,
}

/// Cached projection of gateway-owned tokenized payment methods.
///
/// The gateways own the instruments; this store only caches what they report,
/// keyed by user and channel, and invalidates on a confirmed deletion, never
/// optimistically.
pub struct PaymentMethodStore {
    registry: Arc<GatewayRegistry>,
    cache: RwLock<HashMap<(String, String), Vec<PaymentMethodData>>>,
}

impl PaymentMethodStore {
    pub fn new(registry: Arc<GatewayRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Lists the user's tokenized methods across all configured gateways.
    /// A single failing gateway is reported in `failures` and does not fail
    /// the listing.
    pub async fn list(&self, user_id: &str, channel: &str) -> Result<MethodListing> {
        let key = (user_id.to_string(), channel.to_string());
        if let Some(cached) = self.cache.read().await.get(&key) {
            return Ok(MethodListing {
                methods: cached.clone(),
                failures: Vec::new(),
            });
        }

        let mut listing = MethodListing::default();
        for gateway_id in self.registry.ids().await {
            let entry = self.registry.get(&gateway_id).await?;
            match entry.app.list_payment_methods(user_id, channel).await {
                Ok(methods) => listing.methods.extend(methods),
                Err(err) => {
                    tracing::warn!(%gateway_id, error = %err, "payment method listing failed");
                    listing.failures.push(GatewayListingError {
                        gateway_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        // Only a complete listing is worth caching.
        if listing.failures.is_empty() {
            self.cache
                .write()
                .await
                .insert(key, listing.methods.clone());
        }
        Ok(listing)
    }

    /// Delegates deletion to the owning gateway. The cached projection is
    /// dropped only after the gateway confirms success.
    pub async fn request_deletion(&self, request: DeleteRequest) -> Result<DeleteResponse> {
        let entry = self.registry.get(&request.gateway_id).await?;
        let key = (request.user_id.clone(), request.channel.clone());
        let response = entry.app.delete_payment_method(request).await?;
        if response.success {
            self.cache.write().await.remove(&key);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{GatewayConfig, PaymentGateway};
    use crate::gateways::mock::{MockBehavior, MockGateway};

    fn method(id: &str, gateway_id: &str) -> PaymentMethodData {
        PaymentMethodData {
            id: id.to_string(),
            r#type: "card".to_string(),
            external_id: format!("ext-{id}"),
            gateway_id: gateway_id.to_string(),
            supported_flows: vec!["interactive".to_string()],
            credit_card_info: None,
            name: Some("Visa •••• 4242".to_string()),
            data: None,
        }
    }

    async fn store_with(gateways: Vec<MockGateway>) -> PaymentMethodStore {
        let registry = Arc::new(GatewayRegistry::new());
        registry
            .refresh(
                gateways
                    .into_iter()
                    .map(|gateway| {
                        let id = gateway.id().to_string();
                        (
                            GatewayConfig::new(&id, &id, &["USD"]),
                            Arc::new(gateway) as Arc<dyn crate::domain::gateway::PaymentGateway>,
                        )
                    })
                    .collect(),
            )
            .await;
        PaymentMethodStore::new(registry)
    }

    #[tokio::test]
    async fn test_listing_merges_gateways() {
        let a = MockGateway::new("a", MockBehavior::Succeed)
            .with_payment_methods(vec![method("m1", "a")]);
        let b = MockGateway::new("b", MockBehavior::Succeed)
            .with_payment_methods(vec![method("m2", "b")]);
        let store = store_with(vec![a, b]).await;

        let listing = store.list("user-1", "default").await.unwrap();
        assert_eq!(listing.methods.len(), 2);
        assert!(listing.failures.is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_gateway_does_not_fail_the_listing() {
        let a = MockGateway::new("a", MockBehavior::Succeed)
            .with_payment_methods(vec![method("m1", "a")]);
        let b = MockGateway::new("b", MockBehavior::Succeed).with_failing_listing();
        let store = store_with(vec![a, b]).await;

        let listing = store.list("user-1", "default").await.unwrap();
        assert_eq!(listing.methods.len(), 1);
        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].gateway_id, "b");
    }

    #[tokio::test]
    async fn test_deletion_invalidates_cache_on_success_only() {
        let gateway = MockGateway::new("a", MockBehavior::Succeed)
            .with_payment_methods(vec![method("m1", "a"), method("m2", "a")]);
        let store = store_with(vec![gateway]).await;

        // Prime the cache.
        store.list("user-1", "default").await.unwrap();
        assert_eq!(store.cache.read().await.len(), 1);

        let response = store
            .request_deletion(DeleteRequest {
                payment_method_id: "m1".to_string(),
                gateway_id: "a".to_string(),
                user_id: "user-1".to_string(),
                channel: "default".to_string(),
            })
            .await
            .unwrap();
        assert!(response.success);
        assert!(store.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_deletion_keeps_cache() {
        let gateway = MockGateway::new("a", MockBehavior::Succeed)
            .with_payment_methods(vec![method("m1", "a")])
            .with_failing_deletion();
        let store = store_with(vec![gateway]).await;

        store.list("user-1", "default").await.unwrap();
        let response = store
            .request_deletion(DeleteRequest {
                payment_method_id: "m1".to_string(),
                gateway_id: "a".to_string(),
                user_id: "user-1".to_string(),
                channel: "default".to_string(),
            })
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(store.cache.read().await.len(), 1);
    }
}
