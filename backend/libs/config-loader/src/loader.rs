use crate::{resolve_file_refs, ConfigLoaderError};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const ENV_SEPARATOR: &str = "__";

/// Layered configuration loader
///
/// Sources are applied in the order they are added; later sources override
/// earlier ones key by key. After merging, `file://` references are
/// replaced with file contents before the result is deserialized.
///
/// ```rust,no_run
/// use config_loader::ConfigLoader;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct AppConfig {
///     port: u16,
///     database_url: String,
/// }
///
/// let config: AppConfig = ConfigLoader::new()
///     .with_defaults(&AppConfig { port: 50051, ..Default::default() })
///     .with_optional_file("config/app.toml")
///     .with_env("APP")
///     .load()?;
/// # Ok::<(), config_loader::ConfigLoaderError>(())
/// ```
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
    sources: usize,
    error: Option<ConfigLoaderError>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            sources: 0,
            error: None,
        }
    }

    /// Use the serialized form of `defaults` as the lowest layer
    pub fn with_defaults<T: Serialize>(mut self, defaults: &T) -> Self {
        match Config::try_from(defaults) {
            Ok(config) => self.add(config),
            Err(e) => {
                self.error.get_or_insert(ConfigLoaderError::Build(e));
                self
            }
        }
    }

    /// Add a required file; the format follows the extension
    /// (toml, yaml, json, ...)
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref()).required(true);
        self.add(source)
    }

    /// Add a file that is skipped when it does not exist
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref()).required(false);
        self.add(source)
    }

    /// Add environment variables named `<PREFIX>_<KEY>`
    ///
    /// Nested keys are separated by a double underscore:
    /// `APP_DATABASE__MAX_CONNECTIONS` sets `database.max_connections`.
    pub fn with_env(self, prefix: &str) -> Self {
        let source = Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR);
        self.add(source)
    }

    /// Merge all sources, resolve `file://` references and deserialize
    pub fn load<T: DeserializeOwned>(self) -> Result<T, ConfigLoaderError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let merged: serde_json::Value = self
            .builder
            .build()?
            .try_deserialize()
            .map_err(ConfigLoaderError::Deserialize)?;
        let resolved = resolve_file_refs(merged)?;

        // Deserialize through `config` again so string values from the
        // environment still coerce into numbers and booleans
        let config = Config::try_from(&resolved)?;
        let value = config
            .try_deserialize()
            .map_err(ConfigLoaderError::Deserialize)?;

        tracing::debug!(sources = self.sources, "Configuration loaded");
        Ok(value)
    }

    fn add<S>(mut self, source: S) -> Self
    where
        S: config::Source + Send + Sync + 'static,
    {
        self.builder = self.builder.add_source(source);
        self.sources += 1;
        self
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Settings {
        name: String,
        port: u16,
        debug: bool,
    }

    #[test]
    fn test_defaults_only() {
        let defaults = Settings {
            name: "svc".to_string(),
            port: 8080,
            debug: false,
        };
        let loaded: Settings = ConfigLoader::new().with_defaults(&defaults).load().unwrap();
        assert_eq!(loaded, defaults);
    }

    #[test]
    fn test_missing_optional_file_is_skipped() {
        let loaded: Settings = ConfigLoader::new()
            .with_defaults(&Settings {
                port: 1,
                ..Default::default()
            })
            .with_optional_file("/nonexistent/app.toml")
            .load()
            .unwrap();
        assert_eq!(loaded.port, 1);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = ConfigLoader::new()
            .with_file("/nonexistent/app.toml")
            .load::<Settings>();
        assert!(matches!(result, Err(ConfigLoaderError::Build(_))));
    }

    #[test]
    fn test_empty_loader_uses_serde_defaults() {
        let loaded: Settings = ConfigLoader::new().load().unwrap();
        assert_eq!(loaded, Settings::default());
    }
}
