//! Configuration layering, directory walk-up and environment overrides

use std::collections::HashMap;

use camino::Utf8PathBuf;
use tracing::debug;
use w3s_core::error::StorageError;

use crate::file::{self, ClientConfig};
use crate::ConfigResult;

/// Project config file name
pub const PROJECT_CONFIG_FILE: &str = "w3s.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "W3S_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Global config location, `None` disables the global layer
    global_path: Option<Utf8PathBuf>,
}

/// Applies environment overrides on top of file layers
pub struct ConfigLayering;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Built-in defaults
    Defaults,
    /// Global config file
    Global(Utf8PathBuf),
    /// Project w3s.toml file
    Project(Utf8PathBuf),
    /// Environment variable
    Environment(String),
}

impl ConfigLoader {
    /// Create a loader rooted at `cwd` using the platform config directory
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let global_path = dirs::config_dir()
            .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
            .map(|dir| dir.join("w3s").join("config.toml"));
        Self { cwd, global_path }
    }

    /// Override the global config location
    pub fn with_global_path(mut self, global_path: Option<Utf8PathBuf>) -> Self {
        self.global_path = global_path;
        self
    }

    /// Load defaults, then the global file, then the project file, then
    /// `W3S_*` environment variables
    pub async fn load(&self) -> ConfigResult<(ClientConfig, Vec<ConfigSource>)> {
        self.load_with_env(&ConfigLayering::collect_env_overrides()).await
    }

    /// Same as [`load`](Self::load) with explicit environment overrides
    pub async fn load_with_env(
        &self,
        env_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(ClientConfig, Vec<ConfigSource>)> {
        let mut config = ClientConfig::default();
        let mut sources = vec![ConfigSource::Defaults];

        if let Some(global_path) = self.global_path.as_ref().filter(|p| p.exists()) {
            config.apply(file::load_from_file(global_path).await?);
            sources.push(ConfigSource::Global(global_path.clone()));
        }

        if let Some(project_path) = self.find_project_config() {
            config.apply(file::load_from_file(&project_path).await?);
            sources.push(ConfigSource::Project(project_path));
        }

        sources.extend(ConfigLayering::apply_env_overrides(&mut config, env_overrides)?);

        file::validate_config(&config)?;
        debug!(api_url = %config.api_url, layers = sources.len(), "Loaded client configuration");

        Ok((config, sources))
    }

    /// Find w3s.toml in the working directory or any parent
    pub fn find_project_config(&self) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(PROJECT_CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }
            current = dir.parent();
        }

        None
    }
}

impl ConfigLayering {
    /// Apply `W3S_*` overrides, returning the variables that were used
    pub fn apply_env_overrides(
        config: &mut ClientConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<Vec<ConfigSource>> {
        let mut used = Vec::new();
        let mut keys: Vec<&String> = overrides.keys().collect();
        keys.sort();

        for key in keys {
            let value = &overrides[key];
            match key.as_str() {
                "W3S_API_URL" => {
                    config.api_url = value.clone();
                }
                "W3S_GATEWAY_TEMPLATE" => {
                    config.gateway_template = value.clone();
                }
                "W3S_USER_AGENT" => {
                    config.user_agent = value.clone();
                }
                "W3S_TIMEOUT_SECS" => {
                    config.timeout_secs = parse_number(key, value)?;
                }
                "W3S_MAX_ATTEMPTS" => {
                    config.retry.max_attempts = parse_number(key, value)?;
                }
                "W3S_BASE_DELAY_MS" => {
                    config.retry.base_delay_ms = parse_number(key, value)?;
                }
                _ => continue,
            }
            used.push(ConfigSource::Environment(key.clone()));
        }

        Ok(used)
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| StorageError::ConfigValidation {
        field: key.to_string(),
        reason: format!("Invalid number '{}': {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[tokio::test]
    async fn test_defaults_only() {
        let (_guard, root) = temp_root();
        let loader = ConfigLoader::new(root).with_global_path(None);

        let (config, sources) = loader.load_with_env(&HashMap::new()).await.unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(sources, vec![ConfigSource::Defaults]);
    }

    #[tokio::test]
    async fn test_project_config_found_in_parent() {
        let (_guard, root) = temp_root();
        let nested = root.join("a").join("b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(root.join("w3s.toml"), "api_url = \"http://localhost:3000/\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(nested).with_global_path(None);
        assert_eq!(loader.find_project_config(), Some(root.join("w3s.toml")));

        let (config, sources) = loader.load_with_env(&HashMap::new()).await.unwrap();
        assert_eq!(config.api_url, "http://localhost:3000/");
        assert!(matches!(sources.last(), Some(ConfigSource::Project(_))));
    }

    #[tokio::test]
    async fn test_layer_precedence() {
        let (_guard, root) = temp_root();
        let global = root.join("global.toml");
        tokio::fs::write(&global, "timeout_secs = 5\nuser_agent = \"global\"\n")
            .await
            .unwrap();
        tokio::fs::write(root.join("w3s.toml"), "timeout_secs = 10\n")
            .await
            .unwrap();

        let mut env = HashMap::new();
        env.insert("W3S_MAX_ATTEMPTS".to_string(), "5".to_string());
        env.insert("UNRELATED".to_string(), "ignored".to_string());

        let loader = ConfigLoader::new(root.clone()).with_global_path(Some(global.clone()));
        let (config, sources) = loader.load_with_env(&env).await.unwrap();

        assert_eq!(config.user_agent, "global");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            sources,
            vec![
                ConfigSource::Defaults,
                ConfigSource::Global(global),
                ConfigSource::Project(root.join("w3s.toml")),
                ConfigSource::Environment("W3S_MAX_ATTEMPTS".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        let mut env = HashMap::new();
        env.insert("W3S_API_URL".to_string(), "http://127.0.0.1:1/".to_string());
        env.insert("W3S_GATEWAY_TEMPLATE".to_string(), "http://gw/{cid}".to_string());
        env.insert("W3S_BASE_DELAY_MS".to_string(), "20".to_string());
        env.insert("W3S_USER_AGENT".to_string(), "uploader/2.0".to_string());

        let used = ConfigLayering::apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(used.len(), 4);
        assert_eq!(config.user_agent, "uploader/2.0");
        assert_eq!(config.api_url, "http://127.0.0.1:1/");
        assert_eq!(config.gateway_url("abc"), "http://gw/abc");
        assert_eq!(config.retry.base_delay_ms, 20);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut config = ClientConfig::default();
        let mut env = HashMap::new();
        env.insert("W3S_TIMEOUT_SECS".to_string(), "soon".to_string());

        match ConfigLayering::apply_env_overrides(&mut config, &env).unwrap_err() {
            StorageError::ConfigValidation { field, .. } => assert_eq!(field, "W3S_TIMEOUT_SECS"),
            other => panic!("Expected ConfigValidation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_merged_config_rejected() {
        let (_guard, root) = temp_root();
        let mut env = HashMap::new();
        env.insert("W3S_GATEWAY_TEMPLATE".to_string(), "https://gw.example".to_string());

        let loader = ConfigLoader::new(root).with_global_path(None);
        assert!(loader.load_with_env(&env).await.is_err());
    }
}
