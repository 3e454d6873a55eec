//! w3s.toml parsing and validation

use std::time::Duration;

use serde::{Deserialize, Serialize};
use w3s_core::error::StorageError;

use crate::ConfigResult;

/// Default API endpoint root
pub const DEFAULT_API_URL: &str = "https://api.web3.storage/";

/// Default gateway URL, `{cid}` is replaced by the content identifier
pub const DEFAULT_GATEWAY_TEMPLATE: &str = "https://{cid}.ipfs.w3s.link";

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the HTTP API, endpoints are joined onto it
    pub api_url: String,

    /// Gateway URL pattern containing `{cid}`
    pub gateway_template: String,

    /// Request timeout in seconds, 0 disables it
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Retry settings for `upload_with_retry`
    pub retry: RetrySection,
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for each following retry
    pub base_delay_ms: u64,
}

/// One layer of configuration as written in a file, every key optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub api_url: Option<String>,
    pub gateway_template: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub retry: RetryLayer,
}

/// Optional retry keys of a [`ConfigLayer`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryLayer {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            gateway_template: DEFAULT_GATEWAY_TEMPLATE.to_string(),
            timeout_secs: 30,
            user_agent: concat!("w3s/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetrySection::default(),
        }
    }
}

impl ClientConfig {
    /// Overwrite every key the layer sets
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(api_url) = layer.api_url {
            self.api_url = api_url;
        }
        if let Some(gateway_template) = layer.gateway_template {
            self.gateway_template = gateway_template;
        }
        if let Some(timeout_secs) = layer.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(user_agent) = layer.user_agent {
            self.user_agent = user_agent;
        }
        if let Some(max_attempts) = layer.retry.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = layer.retry.base_delay_ms {
            self.retry.base_delay_ms = base_delay_ms;
        }
    }

    /// Request timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Delay before the first retry
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }

    /// Build the URL of an API endpoint such as `status/{cid}`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Build the gateway URL for a content identifier
    pub fn gateway_url(&self, cid: &str) -> String {
        self.gateway_template.replace("{cid}", cid)
    }
}

/// Parse a w3s.toml document into a layer
pub fn parse_layer(content: &str) -> ConfigResult<ConfigLayer> {
    toml::from_str(content).map_err(|e| StorageError::ConfigValidation {
        field: "toml".to_string(),
        reason: format!("TOML parsing error: {}", e),
    })
}

/// Parse a complete config, missing keys take their defaults
pub fn parse_client_toml(content: &str) -> ConfigResult<ClientConfig> {
    let mut config = ClientConfig::default();
    config.apply(parse_layer(content)?);
    validate_config(&config)?;
    Ok(config)
}

/// Serialize a config back to TOML
pub fn serialize_client_toml(config: &ClientConfig) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| StorageError::ConfigValidation {
        field: "toml".to_string(),
        reason: format!("TOML serialization error: {}", e),
    })
}

/// Validate configuration values
pub fn validate_config(config: &ClientConfig) -> ConfigResult<()> {
    let api_url = url::Url::parse(&config.api_url).map_err(|e| StorageError::ConfigValidation {
        field: "api_url".to_string(),
        reason: format!("'{}' is not a valid URL: {}", config.api_url, e),
    })?;
    if !matches!(api_url.scheme(), "http" | "https") {
        return Err(StorageError::ConfigValidation {
            field: "api_url".to_string(),
            reason: format!("unsupported scheme '{}'", api_url.scheme()),
        });
    }

    if !config.gateway_template.contains("{cid}") {
        return Err(StorageError::ConfigValidation {
            field: "gateway_template".to_string(),
            reason: "must contain the {cid} placeholder".to_string(),
        });
    }

    if config.retry.max_attempts == 0 {
        return Err(StorageError::ConfigValidation {
            field: "retry.max_attempts".to_string(),
            reason: "at least one attempt is required".to_string(),
        });
    }

    Ok(())
}

/// Load a layer from a TOML file
pub async fn load_from_file(path: &camino::Utf8Path) -> ConfigResult<ConfigLayer> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(format!("Failed to read {}", path), e))?;

    parse_layer(&content).map_err(|e| match e {
        StorageError::ConfigValidation { field, reason } => StorageError::ConfigValidation {
            field,
            reason: format!("In file {}: {}", path, reason),
        },
        other => other,
    })
}
