//! Configuration management for jobharvest.
//!
//! Configuration is read from `~/.config/jobharvest/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fetcher::FetchConfig;
use crate::pipeline::{PipelineConfig, SiteConfig};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/jobharvest/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("jobharvest").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# jobharvest configuration

[site]
# Relative detail links are resolved against this URL
base_url = "https://www.azstatejobs.gov"

# Search-results page listing all open postings
listing_url = "https://www.azstatejobs.gov/jobs/search"

[fetch]
# "http" for a plain HTTP client, "browser" for headless Chrome
backend = "http"

user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
locale = "en-US"

# Time zone emulated by the browser backend
timezone = "America/Phoenix"

connect_timeout_secs = 10

# Whole request (http) or page load (browser) timeout
timeout_secs = 30

# Browser only: wait after navigation for scripts to finish (milliseconds)
settle_ms = 3000

# Browser only: run without a visible window
headless = true

# Browser only: skip images, stylesheets and fonts
block_resources = true

[pipeline]
# Pause after each detail page fetch (milliseconds)
request_delay_ms = 1000

# Wait before reloading a bot-challenge page (milliseconds)
challenge_retry_delay_ms = 5000
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchBackend;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config = toml::from_str(Config::default_config_content())
            .expect("Default config should be valid TOML");

        assert_eq!(config.site.listing_url, "https://www.azstatejobs.gov/jobs/search");
        assert_eq!(config.fetch.backend, FetchBackend::Http);
        assert_eq!(config.fetch.user_agent, FetchConfig::default().user_agent);
        assert_eq!(config.pipeline.request_delay_ms, 1000);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[fetch]
backend = "browser"
settle_ms = 500
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.fetch.backend, FetchBackend::Browser);
        assert_eq!(config.fetch.settle_ms, 500);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.pipeline.challenge_retry_delay_ms, 5000);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.site.base_url, "https://www.azstatejobs.gov");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.pipeline.request_delay_ms, 1000);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.site.base_url, config.site.base_url);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fetch]\nbackend = \"carrier-pigeon\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
