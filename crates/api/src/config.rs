//! Environment-driven server configuration, built on
//! `swapgraph_core::config::load_from_env`'s `config`-crate loader.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Json,
    Sqlite,
}

impl StoreBackend {
    pub fn persistence_mode(self) -> &'static str {
        match self {
            StoreBackend::Json => "json_file",
            StoreBackend::Sqlite => "sqlite_wal",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Json => "json",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

/// Per-stream export checkpoint retention: independent TTLs so one
/// stream's checkpoint going stale never affects another's continuity
/// chain (spec design-notes Open Question ii).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExportRetentionConfig {
    #[serde(default = "default_policy_audit_ttl_days")]
    pub policy_audit_ttl_days: i64,
    #[serde(default = "default_transparency_ttl_days")]
    pub transparency_ttl_days: i64,
    #[serde(default = "default_liquidity_ttl_days")]
    pub liquidity_ttl_days: i64,
}

fn default_policy_audit_ttl_days() -> i64 {
    90
}
fn default_transparency_ttl_days() -> i64 {
    30
}
fn default_liquidity_ttl_days() -> i64 {
    7
}

impl Default for ExportRetentionConfig {
    fn default() -> Self {
        Self {
            policy_audit_ttl_days: default_policy_audit_ttl_days(),
            transparency_ttl_days: default_transparency_ttl_days(),
            liquidity_ttl_days: default_liquidity_ttl_days(),
        }
    }
}

impl ExportRetentionConfig {
    pub fn ttl_for(self, stream: &str) -> chrono::Duration {
        match stream {
            "policy_audit" => chrono::Duration::days(self.policy_audit_ttl_days),
            "transparency_log" => chrono::Duration::days(self.transparency_ttl_days),
            "liquidity" => chrono::Duration::days(self.liquidity_ttl_days),
            _ => chrono::Duration::days(default_transparency_ttl_days()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
    #[serde(default)]
    pub store_backend: StoreBackendOrDefault,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_deposit_window_minutes")]
    pub deposit_window_minutes: i64,
    #[serde(default = "default_proposal_ttl_minutes")]
    pub proposal_ttl_minutes: i64,
    #[serde(default)]
    pub export_retention: ExportRetentionConfig,
}

/// Wraps `StoreBackend` with a concrete serde default (`json`), since
/// `Default` on the backend enum itself would need to pick a winner with
/// no real justification — the wrapper documents that `json` is just the
/// zero-ops starting point, not some intrinsic default.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct StoreBackendOrDefault(pub StoreBackend);

impl Default for StoreBackendOrDefault {
    fn default() -> Self {
        Self(StoreBackend::Json)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_state_path() -> String {
    "./data/state.json".to_string()
}
fn default_deposit_window_minutes() -> i64 {
    30
}
fn default_proposal_ttl_minutes() -> i64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
            store_backend: StoreBackendOrDefault::default(),
            state_path: default_state_path(),
            deposit_window_minutes: default_deposit_window_minutes(),
            proposal_ttl_minutes: default_proposal_ttl_minutes(),
            export_retention: ExportRetentionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `SWAPGRAPH_*`-prefixed environment variables via the shared
    /// `config`-crate loader, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        swapgraph_core::config::load_from_env().unwrap_or_default()
    }
}
