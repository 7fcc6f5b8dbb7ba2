//! Configuration parsing and structures

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::env;
use crate::hub::http::DEFAULT_ENDPOINT;
use crate::path::RepoType;

/// Default read block size
pub const DEFAULT_BLOCK_SIZE: usize = 5 * 1024 * 1024;

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Hub connection
    #[serde(default)]
    pub hub: RawHubConfig,

    /// Read and listing caches
    #[serde(default)]
    pub cache: RawCacheConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub http: RawHttpConfig,
}

/// Hub section; missing values fall back to the environment
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHubConfig {
    /// Hub endpoint (e.g., "https://huggingface.co")
    pub endpoint: Option<String>,

    /// Access token
    pub token: Option<String>,

    /// Revision used when a path does not name one
    pub revision: Option<String>,

    /// Repo type for paths using the explicit `:/` form without a type
    pub repo_type: Option<RepoType>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCacheConfig {
    /// Read block size (e.g., "5MB")
    pub block_size: Option<String>,

    /// How long directory listings stay valid (e.g., "30s"); forever when unset
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub listings_ttl: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHttpConfig {
    /// Request timeout (e.g., "60s")
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Retry attempts for transient failures
    pub max_retries: Option<usize>,
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    pub hub: HubConfig,

    pub cache: CacheConfig,

    pub http: HttpConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Hub connection (resolved)
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Endpoint without trailing slash
    pub endpoint: String,

    /// Explicit token; `None` defers to the stored token lookup
    pub token: Option<String>,

    pub revision: Option<String>,

    pub repo_type: RepoType,
}

/// Cache settings (resolved)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub block_size: usize,
    pub listings_ttl: Option<Duration>,
}

/// HTTP settings (resolved)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: usize,
}

// =============================================================================
// Resolution Logic
// =============================================================================

impl RawConfig {
    /// Resolve raw config into final config, filling gaps from the environment
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let config = self.resolve_with(env::hub_endpoint(), env::hub_token());
        config.validate()?;
        Ok(config)
    }

    fn resolve_with(self, env_endpoint: Option<String>, env_token: Option<String>) -> Config {
        let RawConfig {
            logging,
            hub,
            cache,
            http,
        } = self;

        let endpoint = hub
            .endpoint
            .or(env_endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Config {
            logging,
            hub: HubConfig {
                endpoint,
                token: hub.token.filter(|t| !t.is_empty()).or(env_token),
                revision: hub.revision,
                repo_type: hub.repo_type.unwrap_or_default(),
            },
            cache: CacheConfig {
                // invalid sizes are reported by validate()
                block_size: cache
                    .block_size
                    .as_deref()
                    .map(|s| parse_size(s).unwrap_or(0) as usize)
                    .unwrap_or(DEFAULT_BLOCK_SIZE),
                listings_ttl: cache.listings_ttl,
            },
            http: HttpConfig {
                timeout: http.timeout.unwrap_or(Duration::from_secs(60)),
                max_retries: http.max_retries.unwrap_or(5),
            },
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string, substituting `${VAR}` references
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = env::substitute_env_vars(content)?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }

    /// Load from `path`, else `$HFFS_CONFIG`, else defaults plus environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(env::config_path) {
            Some(path) => Self::from_file(&path),
            None => RawConfig::default().resolve(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hub.endpoint.starts_with("http://") && !self.hub.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "Hub endpoint must be an http(s) URL: {}",
                self.hub.endpoint
            )));
        }

        if self.cache.block_size == 0 {
            return Err(ConfigError::ValidationError(
                "cache.block_size must be a positive size such as \"5MB\"".to_string(),
            ));
        }

        if matches!(&self.hub.revision, Some(rev) if rev.is_empty()) {
            return Err(ConfigError::ValidationError(
                "hub.revision cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse size string like "5MB" to bytes
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (num_part, suffix) = if s.ends_with("GB") {
        (&s[..s.len() - 2], 1024 * 1024 * 1024)
    } else if s.ends_with("MB") {
        (&s[..s.len() - 2], 1024 * 1024)
    } else if s.ends_with("KB") {
        (&s[..s.len() - 2], 1024)
    } else if s.ends_with('B') {
        (&s[..s.len() - 1], 1)
    } else {
        (s.as_str(), 1)
    };

    num_part.trim().parse::<u64>().ok()?.checked_mul(suffix)
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::error::HffsError {
    fn from(err: ConfigError) -> Self {
        crate::error::HffsError::Config(err.to_string())
    }
}
