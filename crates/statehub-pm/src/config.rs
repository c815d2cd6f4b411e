//! Package manager configuration
//!
//! A single typed record describing where state lives and how the HTTP
//! client behaves. Built once at the boundary and passed by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default well-known catalog
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/statehub-server/official-sources/refs/heads/main/sources.0.json";

/// Maximum size for a single response body (50 MB)
pub const MAX_CONTENT_SIZE: u64 = 50 * 1024 * 1024;

/// Errors that can occur while building the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Home directory could not be determined
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// State root is empty
    #[error("State directory must not be empty")]
    EmptyHome,

    /// Default source is not an HTTPS URL
    #[error("Default source must be an HTTPS URL: {0}")]
    InsecureDefaultSource(String),

    /// Response size limit is zero
    #[error("Maximum content size must be greater than zero")]
    ZeroContentSize,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout; `None` keeps the client default
    pub timeout: Option<Duration>,

    /// User agent sent with every request
    pub user_agent: String,

    /// Upper bound on a response body, in bytes
    pub max_content_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("statehub-pm/{}", env!("CARGO_PKG_VERSION")),
            max_content_size: MAX_CONTENT_SIZE,
        }
    }
}

/// Package manager configuration
///
/// Directory structure under `home`:
/// ```text
/// ~/.config/statehub/
/// ├── cache/
/// │   └── source.<N>.json
/// ├── modules/
/// │   ├── <name>/
/// │   └── @<namespace>/<name>/
/// └── settings.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmConfig {
    /// State root directory
    pub home: PathBuf,

    /// Staging directory for downloads and backups
    pub temp_dir: PathBuf,

    /// Catalog added by the one-time bootstrap
    pub default_source_url: String,

    /// HTTP client settings
    pub http: HttpConfig,
}

impl PmConfig {
    /// Create a configuration rooted at `home` with defaults for everything else
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            temp_dir: std::env::temp_dir(),
            default_source_url: DEFAULT_SOURCE_URL.to_string(),
            http: HttpConfig::default(),
        }
    }

    /// Create a configuration rooted at `~/.config/statehub`
    pub fn from_home_dir() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::with_home(home.join(".config").join("statehub")))
    }

    /// Override the staging directory
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Override the default catalog URL
    pub fn with_default_source(mut self, url: impl Into<String>) -> Self {
        self.default_source_url = url.into();
        self
    }

    /// Check the configuration once before it is handed to components
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.home.as_os_str().is_empty() {
            return Err(ConfigError::EmptyHome);
        }

        match url::Url::parse(&self.default_source_url) {
            Ok(url) if url.scheme() == "https" => {}
            _ => {
                return Err(ConfigError::InsecureDefaultSource(
                    self.default_source_url.clone(),
                ))
            }
        }

        if self.http.max_content_size == 0 {
            return Err(ConfigError::ZeroContentSize);
        }

        Ok(())
    }

    /// Directory holding `source.<N>.json` files
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Root of installed modules
    pub fn modules_dir(&self) -> PathBuf {
        self.home.join("modules")
    }

    /// Path to `settings.json`
    pub fn settings_file(&self) -> PathBuf {
        self.home.join("settings.json")
    }

    /// State root
    pub fn home(&self) -> &Path {
        &self.home
    }
}
