//! TOML-based configuration for the pagegrid client.
//!
//! Reads and writes [`PagegridConfig`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Pagegrid\config.toml`
//! - Linux:    `~/.config/pagegrid/config.toml`
//! - macOS:    `~/Library/Application Support/Pagegrid/config.toml`
//!
//! Example:
//!
//! ```toml
//! [session]
//! autosave_delay_ms = 1500
//! log_level = "info"
//!
//! [cache]
//! namespace = "pagegrid"
//! enabled = true
//! ```
//!
//! Every field has a `#[serde(default = "...")]`, so a missing file, a missing
//! section, or a file written by an older version all load cleanly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PagegridConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Edit-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Quiet period after the last edit before the layout is auto-saved.
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Local fallback cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Prefix of every cache key (`"<namespace>/<pageKey>"`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Where cache files go.  Defaults to `cache/` under the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// When `false`, sessions built by the CLI run without a local cache.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_autosave_delay_ms() -> u64 {
    1500
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_namespace() -> String {
    "pagegrid".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: default_autosave_delay_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            directory: None,
            enabled: default_true(),
        }
    }
}

impl SessionConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }
}

impl CacheConfig {
    /// The configured cache directory, or `cache/` under the config directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] when no directory is
    /// configured and the platform directory cannot be determined.
    pub fn resolved_directory(&self) -> Result<PathBuf, ConfigError> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_dir()?.join("cache")),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path, returning defaults if the file
/// does not exist yet.
pub fn load_config() -> Result<PagegridConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<PagegridConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PagegridConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_config(config: &PagegridConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Writes `config` to `path`, creating parent directories as needed.
pub fn save_config_to(path: &Path, config: &PagegridConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Pagegrid"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pagegrid"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Pagegrid")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config_values() {
        let cfg = PagegridConfig::default();

        assert_eq!(cfg.session.autosave_delay(), Duration::from_millis(1500));
        assert_eq!(cfg.session.log_level, "info");
        assert_eq!(cfg.cache.namespace, "pagegrid");
        assert!(cfg.cache.enabled);
        assert!(cfg.cache.directory.is_none());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        let cfg: PagegridConfig = toml::from_str("[session]\nautosave_delay_ms = 250\n").unwrap();

        assert_eq!(cfg.session.autosave_delay_ms, 250);
        assert_eq!(cfg.session.log_level, "info");
        assert_eq!(cfg.cache, CacheConfig::default());
    }

    #[test]
    fn test_empty_toml_is_the_default_config() {
        let cfg: PagegridConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, PagegridConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("pagegrid-bad-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[session\n").unwrap();

        let err = load_config_from(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir().join(format!("pagegrid-missing-{}.toml", Uuid::new_v4()));
        assert_eq!(load_config_from(&path).unwrap(), PagegridConfig::default());
    }

    #[test]
    fn test_save_then_load_from_explicit_path() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("pagegrid-config-{}", Uuid::new_v4()));
        let path = dir.join("nested").join("config.toml");
        let mut cfg = PagegridConfig::default();
        cfg.cache.directory = Some(PathBuf::from("/var/cache/pagegrid"));
        cfg.session.log_level = "debug".to_string();

        // Act
        save_config_to(&path, &cfg).unwrap();
        let restored = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        assert_eq!(
            restored.cache.resolved_directory().unwrap(),
            PathBuf::from("/var/cache/pagegrid")
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
