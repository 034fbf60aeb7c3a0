//! Path management for searchify configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/searchify/         # Config directory (XDG on Linux, platform default elsewhere)
//! └── config.toml              # Service and sync configuration
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for searchify.
pub struct SearchifyPaths;

impl SearchifyPaths {
    const APP_DIR: &'static str = "searchify";

    /// Returns the searchify configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/searchify/`)
    /// - `Err(PathError::ConfigDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(Self::APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_under_config_dir() {
        // Skip on hosts without a resolvable home directory.
        let Ok(config_dir) = SearchifyPaths::config_dir() else {
            return;
        };
        assert!(config_dir.ends_with("searchify"));

        let config_file = SearchifyPaths::config_file().unwrap();
        assert!(config_file.ends_with("config.toml"));
        assert!(config_file.starts_with(&config_dir));
    }
}
