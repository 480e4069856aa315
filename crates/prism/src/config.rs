//! Config file discovery, loading, and environment variable overlay.
//!
//! Load order: system config, user XDG config, local `prism.toml` (or the
//! CLI `--config` path, which replaces the local file). The last file loaded
//! wins; `PRISM_*` environment variables win over everything.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PrismConfig {
    pub host: String,
    pub port: u16,
    pub max_image_size: u32,
    pub max_frames_per_request: usize,
    pub cache_capacity: usize,
    pub request_timeout_ms: u64,
    pub defaults: RenderDefaults,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderDefaults {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl Default for PrismConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_image_size: 4096,
            max_frames_per_request: 64,
            cache_capacity: 256,
            request_timeout_ms: 30_000,
            defaults: RenderDefaults::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            quality: 95,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Where config values came from, for startup logging.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, in load order.
/// Only returns files that exist.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/prism/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("prism/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over the local file
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("prism.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from discovered files plus the environment.
pub fn load(cli_path: Option<&Path>) -> Result<(PrismConfig, ConfigSources), ConfigError> {
    let mut config = PrismConfig::default();
    let mut sources = ConfigSources::default();

    for path in discover_config_files(cli_path) {
        config = load_from_file(&path)?;
        sources.files.push(path);
    }

    apply_env_overrides(&mut config, &mut sources);
    Ok((config, sources))
}

pub fn load_from_file(path: &Path) -> Result<PrismConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `PRISM_*` environment variable overrides.
pub fn apply_env_overrides(config: &mut PrismConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("PRISM_HOST") {
        config.host = v;
        sources.env_overrides.push("PRISM_HOST".to_string());
    }
    if let Ok(v) = env::var("PRISM_PORT") {
        if let Ok(port) = v.parse() {
            config.port = port;
            sources.env_overrides.push("PRISM_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("PRISM_MAX_IMAGE_SIZE") {
        if let Ok(size) = v.parse() {
            config.max_image_size = size;
            sources.env_overrides.push("PRISM_MAX_IMAGE_SIZE".to_string());
        }
    }
    if let Ok(v) = env::var("PRISM_MAX_FRAMES_PER_REQUEST") {
        if let Ok(frames) = v.parse() {
            config.max_frames_per_request = frames;
            sources
                .env_overrides
                .push("PRISM_MAX_FRAMES_PER_REQUEST".to_string());
        }
    }
    if let Ok(v) = env::var("PRISM_CACHE_CAPACITY") {
        if let Ok(capacity) = v.parse() {
            config.cache_capacity = capacity;
            sources.env_overrides.push("PRISM_CACHE_CAPACITY".to_string());
        }
    }
    if let Ok(v) = env::var("PRISM_REQUEST_TIMEOUT_MS") {
        if let Ok(timeout) = v.parse() {
            config.request_timeout_ms = timeout;
            sources
                .env_overrides
                .push("PRISM_REQUEST_TIMEOUT_MS".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = PrismConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_image_size, 4096);
        assert_eq!(config.max_frames_per_request, 64);
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.defaults.width, 1920);
        assert_eq!(config.defaults.height, 1080);
        assert_eq!(config.defaults.quality, 95);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\n\n[defaults]\nwidth = 640").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.defaults.width, 640);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.defaults.height, 1080);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prot = 9000").unwrap();
        assert!(load_from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_from_file(Path::new("/nonexistent/prism.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
