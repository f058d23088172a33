//! Account provider registry abstraction

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::AccountProvider;

/// Registry of known account providers, indexed by provider id.
///
/// Provides a default in-memory implementation, `InMemoryProviderRegistry`.
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Look up a provider by its id URI.
    async fn find(&self, provider_id: &str) -> Option<AccountProvider>;

    /// Insert a provider description, keeping whichever of the new and the
    /// existing description is newer. Returns the retained description.
    async fn update_provider(&self, provider: AccountProvider) -> AccountProvider;

    /// Every registered provider, in id order.
    async fn providers(&self) -> Vec<AccountProvider>;
}

/// In-memory provider registry
#[derive(Clone, Default)]
pub struct InMemoryProviderRegistry {
    providers: Arc<RwLock<HashMap<String, AccountProvider>>>,
}

impl InMemoryProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `providers`.
    #[must_use]
    pub fn with_providers(providers: impl IntoIterator<Item = AccountProvider>) -> Self {
        let map = providers
            .into_iter()
            .map(|p| (p.id.to_string(), p))
            .collect();
        Self {
            providers: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl ProviderRegistry for InMemoryProviderRegistry {
    async fn find(&self, provider_id: &str) -> Option<AccountProvider> {
        self.providers.read().await.get(provider_id).cloned()
    }

    async fn update_provider(&self, provider: AccountProvider) -> AccountProvider {
        let mut providers = self.providers.write().await;
        match providers.get(provider.id.as_str()) {
            Some(existing) if !provider.is_newer_than(existing) => existing.clone(),
            _ => {
                providers.insert(provider.id.to_string(), provider.clone());
                provider
            }
        }
    }

    async fn providers(&self) -> Vec<AccountProvider> {
        let mut all: Vec<_> = self.providers.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        all
    }
}
