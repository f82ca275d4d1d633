//! Configuration loading and root folder resolution
//!
//! Bootstrap settings live in a small TOML file per module
//! (`~/.config/roster/<module>.toml` on Linux). A missing or unreadable file is
//! never fatal: a warning is logged and compiled defaults are used.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `ROSTER_ROOT_FOLDER`, then `ROSTER_ROOT`
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ROSTER_ROOT_FOLDER";
/// Shorter alias of [`ROOT_FOLDER_ENV`]
pub const ROOT_ENV: &str = "ROSTER_ROOT";
/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "ROSTER_CONFIG";

pub const DEFAULT_PORT: u16 = 5740;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Folder (under the root) holding the override store
const OVERRIDES_DIR: &str = "overrides";

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Bootstrap TOML file contents
///
/// Every field is optional; absent values fall back to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    /// Base URL of the live event feed
    pub live_feed_url: Option<String>,
    /// CSV snapshot used as fallback (and as the only source in demo mode)
    pub snapshot_path: Option<PathBuf>,
    pub demo_mode: bool,
    pub request_timeout_ms: Option<u64>,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn request_timeout_ms_or_default(&self) -> u64 {
        self.request_timeout_ms
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
    }
}

/// Compiled fallbacks for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/roster
        dirs::data_local_dir()
            .map(|d| d.join("roster"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/roster"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("roster"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/roster"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("roster"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\roster"))
    } else {
        PathBuf::from("./roster_data")
    }
}

/// Default config file path for `module`
pub fn module_config_path(module: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("roster").join(format!("{}.toml", module)))
}

/// Parse a TOML config file
///
/// # Errors
///
/// `Io` if the file cannot be read, `Config` if it is not valid TOML.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Load the config for `module`, degrading to defaults
///
/// Looks at `explicit` first, then `ROSTER_CONFIG`, then the module's default
/// path. Never fails.
pub fn load_module_config(module: &str, explicit: Option<&Path>) -> TomlConfig {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .or_else(|| module_config_path(module));

    let Some(path) = path else {
        warn!("Could not determine config directory; using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found; using defaults");
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded config");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Config file unusable; using defaults");
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder for a module
pub struct RootFolderResolver {
    module: String,
    cli_arg: Option<PathBuf>,
    config_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            cli_arg: None,
            config_root: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// `root_folder` from an already loaded config file (priority 3)
    pub fn with_config_root(mut self, path: Option<PathBuf>) -> Self {
        self.config_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module, path = %path.display(), "Root folder from command line");
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    debug!(module = %self.module, var, path = %value, "Root folder from environment");
                    return PathBuf::from(value);
                }
            }
        }

        if let Some(path) = &self.config_root {
            debug!(module = %self.module, path = %path.display(), "Root folder from config file");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Folder for the file-backed override store
    pub fn overrides_dir(&self) -> PathBuf {
        self.root_folder.join(OVERRIDES_DIR)
    }

    /// Create the root folder (and parents); idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!(path = %self.root_folder.display(), "Creating root folder");
        }
        fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}
