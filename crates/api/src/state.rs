//! Shared application state: the guarded marketplace document, the
//! signing key registry, and the runtime configuration every handler
//! needs.

use std::sync::Arc;

use swapgraph_core::config::RetryConfig;
use swapgraph_core::signing::KeyRegistry;
use swapgraph_marketplace::matcher::{CanaryState, CanaryThresholds, MatcherConfig};
use swapgraph_policy::ConsentVerificationConfig;
use swapgraph_store::{JsonFileBackend, SqliteBackend, StateBackend, Store};
use tokio::sync::Mutex;

use crate::config::{ServerConfig, StoreBackend};

pub struct AppState {
    pub store: Store<swapgraph_marketplace::MarketplaceState>,
    pub keys: KeyRegistry,
    pub config: ServerConfig,
    pub retry: RetryConfig,
    pub matcher: MatcherConfig,
    pub canary: Mutex<CanaryState>,
    pub canary_thresholds: CanaryThresholds,
    pub consent_config: ConsentVerificationConfig,
    pub version: String,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Result<Self, swapgraph_store::StoreError> {
        let store = match config.store_backend.0 {
            StoreBackend::Json => {
                let backend: Arc<dyn StateBackend<swapgraph_marketplace::MarketplaceState>> =
                    Arc::new(JsonFileBackend::new(&config.state_path));
                Store::open(backend, swapgraph_marketplace::MarketplaceState::default()).await?
            }
            StoreBackend::Sqlite => {
                let url = format!("sqlite://{}?mode=rwc", config.state_path);
                let backend: Arc<dyn StateBackend<swapgraph_marketplace::MarketplaceState>> =
                    Arc::new(SqliteBackend::connect(&url).await?);
                Store::open(backend, swapgraph_marketplace::MarketplaceState::default()).await?
            }
        };

        let mut keys = KeyRegistry::new();
        keys.generate_active("active-1");

        Ok(Self {
            store,
            keys,
            config,
            retry: RetryConfig::default(),
            matcher: MatcherConfig::default(),
            canary: Mutex::new(CanaryState::new()),
            canary_thresholds: CanaryThresholds::default(),
            consent_config: ConsentVerificationConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
