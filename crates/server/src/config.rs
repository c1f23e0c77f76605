// Server configuration: `~/.vellum/config.toml` or an explicit path.
//
// Media root/URL and image bounds are plumbed from here into the ingestion
// pipeline at construction; nothing reads them ambiently.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root directory for Vellum global state: `~/.vellum/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".vellum"))
}

/// Path to the default config file: `~/.vellum/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Server configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Path to the sqlite database.
    pub db_path: PathBuf,
    /// Media settings.
    pub media: MediaConfig,
    /// Outbound fetch settings.
    pub fetch: FetchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_path: PathBuf::from("vellum.db"),
            media: MediaConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Local media storage and its public URL prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory localized images are written under.
    pub root: PathBuf,
    /// Public URL prefix the stored files are addressable at.
    pub url: String,
    /// Maximum stored image width in pixels.
    pub max_image_width: u32,
    /// Maximum stored image height in pixels.
    pub max_image_height: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            url: "/media/".to_string(),
            max_image_width: 1200,
            max_image_height: 1200,
        }
    }
}

/// Outbound HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds. Expiry counts as a fetch failure.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ServerConfig {
    /// Load from the default path. Returns defaults if the file doesn't
    /// exist or can't be parsed.
    pub fn load() -> Self {
        default_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

impl MediaConfig {
    /// Deterministic relative directory for a draft's localized images.
    pub fn draft_image_dir(&self, draft_pk: i64) -> String {
        format!("drafts/img/{draft_pk}")
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
