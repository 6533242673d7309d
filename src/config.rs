use crate::sync::RetryPolicy;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub client: ClientConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Base URL advertised in presigned upload targets
    pub public_url: Option<String>,
    pub presign_expires_secs: u64,
}

impl HttpConfig {
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.bind, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Where uploaded chunk bytes are written
    pub uploads_dir: String,
    /// JSON snapshot for the persistent ledger; in-memory when unset
    pub ledger_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub request_timeout_secs: u64,
    /// Key-value preference file holding the resume flag
    pub preferences_path: String,
    pub probe_interval_secs: u64,
    pub keepalive_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub delays_ms: Vec<u64>,
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.delays_ms.iter().copied().map(Duration::from_millis).collect(),
            self.max_attempts,
        )
    }
}

impl Config {
    /// Load defaults, then `path` (any format the `config` crate knows, optional),
    /// then `CHUNK_SYNC__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "chunk-sync")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 3000)?
            .set_default("service.http.presign_expires_secs", 3600)?
            .set_default("storage.uploads_dir", "uploads")?
            .set_default("client.server_url", "http://127.0.0.1:3000")?
            .set_default("client.request_timeout_secs", 30)?
            .set_default("client.preferences_path", "recording_prefs.json")?
            .set_default("client.probe_interval_secs", 10)?
            .set_default("client.keepalive_interval_secs", 30)?
            .set_default("retry.delays_ms", vec![1000_i64, 2000, 5000])?
            .set_default("retry.max_attempts", 3)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CHUNK_SYNC")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
