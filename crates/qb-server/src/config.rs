//! API server configuration, loadable from environment variables or TOML.

use serde::Deserialize;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the analytics function registry.
    #[serde(default = "default_registry_base_url")]
    pub registry_base_url: String,
    /// How long a registry snapshot is served before a refresh is
    /// attempted.
    #[serde(default = "default_registry_ttl_secs")]
    pub registry_ttl_secs: u64,
    /// Timeout for one registry fetch. Kept short so a slow registry
    /// never stalls request handling.
    #[serde(default = "default_registry_fetch_timeout_secs")]
    pub registry_fetch_timeout_secs: u64,
    /// Directory holding the four classifier artifacts. Absence is a
    /// supported configuration (heuristic-only mode), not an error.
    #[serde(default)]
    pub classifier_dir: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_registry_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_registry_ttl_secs() -> u64 {
    300
}

fn default_registry_fetch_timeout_secs() -> u64 {
    3
}

impl ServerConfig {
    /// Load config from QB_* environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("QB_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("QB_PORT") {
            config.port = port;
        }
        if let Ok(url) = std::env::var("QB_REGISTRY_URL") {
            config.registry_base_url = url;
        }
        if let Some(ttl) = env_parse("QB_REGISTRY_TTL_SECS") {
            config.registry_ttl_secs = ttl;
        }
        if let Some(timeout) = env_parse("QB_REGISTRY_FETCH_TIMEOUT_SECS") {
            config.registry_fetch_timeout_secs = timeout;
        }
        if let Ok(dir) = std::env::var("QB_CLASSIFIER_DIR") {
            config.classifier_dir = Some(dir);
        }
        config
    }

    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            registry_base_url: default_registry_base_url(),
            registry_ttl_secs: default_registry_ttl_secs(),
            registry_fetch_timeout_secs: default_registry_fetch_timeout_secs(),
            classifier_dir: None,
        }
    }
}
