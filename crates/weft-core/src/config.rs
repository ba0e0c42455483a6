//! Configuration system
//!
//! TOML configuration with every section defaulted, so an empty or partial
//! file is valid.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Native shell protocol settings
    pub shell: ShellConfig,

    /// Grab behaviour
    pub grab: GrabConfig,

    /// XWayland window manager settings
    pub xwayland: XWaylandConfig,

    /// Logging
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(Self::find_config_file);

        match config_path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {:?}", path);
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                Self::from_toml(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))
            },
            Some(path) => {
                warn!("Config file not found at {:?}, using defaults", path);
                Ok(Self::default())
            },
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            },
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("weft/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/weft/config.toml")),
            Some(PathBuf::from("/etc/weft/config.toml")),
        ];

        candidates.into_iter().flatten().find(|p| p.exists())
    }

    /// Generate default configuration as a string
    pub fn default_config_string() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

/// Native shell protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// The only unstable protocol version accepted from clients
    pub unstable_version: u32,
    /// Name published on the WM-check window
    pub wm_name: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            unstable_version: 5,
            wm_name: "weft".to_string(),
        }
    }
}

/// Grab behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    /// A press outside the grabbing client this long after a popup grab
    /// began dismisses the popups even if the opening button is still held
    pub popup_dismiss_delay_ms: u32,
    /// Smallest size an interactive resize may produce
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            popup_dismiss_delay_ms: 500,
            min_width: 1,
            min_height: 1,
        }
    }
}

/// XWayland window manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XWaylandConfig {
    pub enabled: bool,
    /// Value written to `_NET_WM_DESKTOP` for mapped windows
    pub workspace: u32,
    /// Redirect root subwindows offscreen through Composite
    pub redirect_subwindows: bool,
}

impl Default for XWaylandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace: 0,
            redirect_subwindows: true,
        }
    }
}

/// Logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
