use crate::error::{LimiterError, Result};
use crate::rate_limit::key_schema::DEFAULT_KEY_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Rate limiting policy
    pub limiter: PolicyConfig,
    /// Key naming
    #[serde(default)]
    pub keys: KeysConfig,
    /// Backing store
    #[serde(default)]
    pub store: StoreConfig,
}

/// Sliding window policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Length of the trailing window in milliseconds
    pub window_size_ms: f64,
    /// Hits allowed per window
    pub max_hits: u64,
}

/// Key naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Prefix put in front of every key
    #[serde(default = "default_key_prefix")]
    pub prefix: String,
}

/// Backing store kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; state is lost on restart and not shared
    Memory,
    /// Redis sorted sets; shared by every process pointing at the server
    Redis,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which store to use
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// How often the in-memory store drops idle logs, in milliseconds
    #[serde(default = "default_purge_interval_ms")]
    pub purge_interval_ms: u64,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_purge_interval_ms() -> u64 {
    60_000
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            prefix: default_key_prefix(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_redis_url(),
            purge_interval_ms: default_purge_interval_ms(),
        }
    }
}

impl LimiterConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;

        info!(
            path = %path.display(),
            window_size_ms = config.limiter.window_size_ms,
            max_hits = config.limiter.max_hits,
            backend = ?config.store.backend,
            "Loaded limiter configuration"
        );

        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let window = self.limiter.window_size_ms;
        if !window.is_finite() || window <= 0.0 {
            return Err(LimiterError::Config(format!(
                "window_size_ms must be > 0, got {}",
                window
            )));
        }

        if self.limiter.max_hits == 0 {
            return Err(LimiterError::Config("max_hits must be > 0".to_string()));
        }

        if self.store.purge_interval_ms == 0 {
            return Err(LimiterError::Config(
                "purge_interval_ms must be > 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Redis
            && !self.store.url.starts_with("redis://")
            && !self.store.url.starts_with("rediss://")
        {
            return Err(LimiterError::Config(format!(
                "Redis URL must start with redis:// or rediss://, got: {}",
                self.store.url
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
limiter:
  window_size_ms: 1000
  max_hits: 3
keys:
  prefix: "app:"
store:
  backend: redis
  url: "redis://cache:6379"
"#;

        let config = LimiterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.window_size_ms, 1000.0);
        assert_eq!(config.limiter.max_hits, 3);
        assert_eq!(config.keys.prefix, "app:");
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.url, "redis://cache:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
limiter:
  window_size_ms: 250.5
  max_hits: 10
"#;

        let config = LimiterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.keys.prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.url, "redis://127.0.0.1:6379");
        assert_eq!(config.store.purge_interval_ms, 60_000);
    }

    #[test]
    fn test_missing_policy_is_parse_error() {
        let err = LimiterConfig::from_yaml("store:\n  backend: memory\n").unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let mut config =
            LimiterConfig::from_yaml("limiter:\n  window_size_ms: 0\n  max_hits: 1\n").unwrap();
        assert!(config.validate().is_err());

        config.limiter.window_size_ms = 1000.0;
        config.limiter.max_hits = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_purge_interval() {
        let mut config =
            LimiterConfig::from_yaml("limiter:\n  window_size_ms: 1000\n  max_hits: 1\n").unwrap();
        config.store.purge_interval_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_redis_url() {
        let mut config =
            LimiterConfig::from_yaml("limiter:\n  window_size_ms: 1000\n  max_hits: 1\n").unwrap();
        config.store.backend = StoreBackend::Redis;
        config.store.url = "http://localhost:6379".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "limiter:\n  window_size_ms: 60000\n  max_hits: 100").unwrap();

        let config = LimiterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.limiter.max_hits, 100);

        let err = LimiterConfig::from_file("/nonexistent/limiter.yaml").unwrap_err();
        assert!(matches!(err, LimiterError::Io(_)));
    }
}
