//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the root configuration
//! from the configuration file (~/.config/searchify/config.toml) and applies
//! environment overrides.

use crate::paths::SearchifyPaths;
use searchify_core::config::SearchifyConfig;
use searchify_core::error::{Result, SearchifyError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Environment variable overriding `service.base_url`.
pub const ENV_API_URL: &str = "SEARCHIFY_API_URL";
/// Environment variable overriding `service.api_token`.
pub const ENV_API_TOKEN: &str = "SEARCHIFY_API_TOKEN";

/// Configuration service that loads and caches the root configuration.
///
/// Priority: environment variables > config.toml > built-in defaults.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Explicit config file; the platform default is used when `None`.
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<SearchifyConfig>>>,
}

impl ConfigService {
    /// Creates a ConfigService reading the default config file.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a ConfigService reading the given file instead of the default.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the root configuration, loading from file if not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn get_config(&self) -> Result<SearchifyConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let mut loaded = self.load_from_file()?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());

        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => SearchifyPaths::config_file().map_err(|e| SearchifyError::config(e.to_string())),
        }
    }

    fn load_from_file(&self) -> Result<SearchifyConfig> {
        let path = self.config_path()?;
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] No config file at {}, using defaults",
                path.display()
            );
            return Ok(SearchifyConfig::default());
        }
        tracing::debug!("[ConfigService] Loading config from {}", path.display());
        read_config_file(&path)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and parses a TOML config file.
pub fn read_config_file(path: &Path) -> Result<SearchifyConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SearchifyError::io(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(toml::from_str(&content)?)
}

/// Applies environment overrides on top of a loaded configuration.
///
/// `lookup` abstracts the environment so callers can inject values.
pub fn apply_env_overrides<F>(config: &mut SearchifyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.service.base_url = url;
    }
    if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
        config.service.api_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::with_path(dir.path().join("absent.toml"));

        let config = service.load_from_file().unwrap();
        assert_eq!(config, SearchifyConfig::default());
    }

    #[test]
    fn test_reads_file_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[service]\nbase_url = \"http://research.local:9000\"\n\n[sync.polling]\ntimeout_ms = 1000\n",
        )
        .unwrap();

        let service = ConfigService::with_path(&path);
        let first = service.load_from_file().unwrap();
        assert_eq!(first.sync.polling.timeout_ms, 1000);

        // Cached value survives the file being removed
        let cached = service.get_config().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(service.get_config().unwrap().sync, cached.sync);

        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().sync, SearchifyConfig::default().sync);
    }

    #[test]
    fn test_invalid_toml_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service\nbase_url = ").unwrap();

        let err = ConfigService::with_path(&path).get_config().unwrap_err();
        assert!(matches!(err, SearchifyError::Serialization { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://api.searchify.example"),
            (ENV_API_TOKEN, "secret-token"),
        ]);
        let mut config = SearchifyConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.service.base_url, "https://api.searchify.example");
        assert_eq!(config.service.api_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = SearchifyConfig::default();
        apply_env_overrides(&mut config, |_| Some("  ".to_string()));
        assert_eq!(config.service.base_url, "http://localhost:8000");
        assert_eq!(config.service.api_token, None);
    }
}
