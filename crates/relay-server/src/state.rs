use std::sync::Arc;

use relay::failover::ModelFailureCache;
use relay::providers::catalog::ProviderCatalog;
use relay::rate_limit::RateLimiter;
use relay::resolver::AgentRegistry;

/// Shared application state. The two caches are constructed here and handed
/// to the request pipeline as dependencies; nothing routing-related lives in
/// module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub catalog: Arc<ProviderCatalog>,
    pub rate_limiter: Arc<RateLimiter>,
    pub failures: Arc<ModelFailureCache>,
    pub storage_url: String,
}

impl AppState {
    pub fn new(registry: AgentRegistry, rate_ceiling: u32, storage_url: String) -> Self {
        Self {
            registry: Arc::new(registry),
            catalog: Arc::new(ProviderCatalog::standard()),
            rate_limiter: Arc::new(RateLimiter::new(
                rate_ceiling,
                RateLimiter::DEFAULT_WINDOW,
            )),
            failures: Arc::new(ModelFailureCache::new()),
            storage_url,
        }
    }
}
