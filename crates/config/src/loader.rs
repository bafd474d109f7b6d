//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SWAPDESK";

/// Separator between section and field in environment variable names.
///
/// Field names already contain single underscores, so a double one marks
/// the nesting: `SWAPDESK_QUOTE__DEBOUNCE_MS=250`.
const ENV_SEPARATOR: &str = "__";

fn env_source(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), format = extension, "loading config file");

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}",
                extension
            ))),
        }
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from `SWAPDESK_*` environment variables
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Variables are named `PREFIX_SECTION__FIELD`, for example
    /// `SWAPDESK_PROVIDER__API_KEY=...`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        let config = Config::builder().add_source(env_source(prefix)).build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }

    /// Merge two configurations section by section, with overlay taking
    /// precedence. A storage path set only in the base survives.
    pub fn merge(base: AppConfig, overlay: AppConfig) -> AppConfig {
        AppConfig {
            environment: overlay.environment,
            logging: overlay.logging,
            provider: overlay.provider,
            quote: overlay.quote,
            tracking: overlay.tracking,
            storage: crate::StorageConfig {
                rate_lock_db: overlay.storage.rate_lock_db.or(base.storage.rate_lock_db),
            },
        }
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Overrides apply per field: an env var replaces only the key it names.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        Self::builder()
            .add_file(path, true)
            .add_env(env_prefix)
            .build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layering several configuration sources
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source; the format follows the extension
    /// (TOML when unknown)
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path).format(file_format(path)).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(env_source(prefix));
        self
    }

    /// Set a default value for a dotted key such as `quote.debounce_ms`
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            environment = "staging"

            [logging]
            level = "debug"
            json = true

            [provider]
            api_key = "abc"
            request_timeout_ms = 5000

            [quote]
            debounce_ms = 150
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.environment, crate::Environment::Staging);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.provider.request_timeout_ms, 5000);
        assert_eq!(config.quote.debounce_ms, 150);
        // untouched fields keep their defaults
        assert_eq!(config.quote.timeout_ms, 12_000);
        assert_eq!(config.tracking.poll_interval_secs, 30);
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
environment: production
provider:
  base_url: "https://api.example.com/v2"
  api_key: "key"
tracking:
  poll_interval_secs: 10
  transient_failure_threshold: 5
storage:
  rate_lock_db: "/var/lib/swapdesk/lock.db"
        "#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.environment, crate::Environment::Production);
        assert_eq!(config.provider.base_url, "https://api.example.com/v2");
        assert_eq!(config.tracking.transient_failure_threshold, 5);
        assert_eq!(
            config.storage.rate_lock_db.as_deref(),
            Some(Path::new("/var/lib/swapdesk/lock.db"))
        );
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"
{
  "environment": "local",
  "quote": { "timeout_ms": 8000, "debounce_ms": 200, "bounds_ttl_secs": 30 }
}
        "#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.quote.timeout_ms, 8000);
        assert_eq!(config.quote.bounds_ttl_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let toml = r#"
[logging]
level = "warn"
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new()
            .suffix(".ini")
            .tempfile()
            .unwrap();
        let err = ConfigLoader::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let err = ConfigLoader::from_toml(r#"environment = "mainnet""#).unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_merge_configs() {
        let base = AppConfig {
            storage: crate::StorageConfig {
                rate_lock_db: Some("base.db".into()),
            },
            ..Default::default()
        };

        let overlay = AppConfig {
            environment: crate::Environment::Staging,
            logging: crate::LoggingConfig {
                level: "debug".to_string(),
                json: true,
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge(base, overlay);
        assert_eq!(merged.logging.level, "debug");
        assert_eq!(merged.environment, crate::Environment::Staging);
        assert_eq!(
            merged.storage.rate_lock_db.as_deref(),
            Some(Path::new("base.db"))
        );
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigLoader::builder()
            .set_default("quote.debounce_ms", "120")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.quote.debounce_ms, 120);
        assert_eq!(config.quote.timeout_ms, 12_000);
    }
}
