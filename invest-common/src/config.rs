//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Runtime tuning lives in the database `settings` table (see [`crate::db::settings`]).
//! A missing or malformed TOML file is never fatal: a warning is logged and
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "INVEST_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "invest.db";

/// Upload folder name inside the root folder
pub const UPLOADS_DIR: &str = "uploads";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional so that partial files are accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database and uploads
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP port for the approval application
    #[serde(default)]
    pub port: Option<u16>,

    /// HTTP port for the LLM microservice
    #[serde(default)]
    pub llm_port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Override for the OpenAI API base URL (proxies, tests)
    #[serde(default)]
    pub openai_base_url: Option<String>,

    /// Override for the Anthropic API base URL
    #[serde(default)]
    pub anthropic_base_url: Option<String>,

    /// Vector store used when a request does not name one
    #[serde(default)]
    pub default_vector_store_id: Option<String>,

    /// Shared key protecting the LLM microservice
    #[serde(default)]
    pub service_api_key: Option<String>,

    /// Administrator account created on first start when no users exist
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Initial administrator credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load the platform config file, falling back to defaults
    ///
    /// Never fails: a missing file is normal, a broken one is logged.
    pub fn load_or_default() -> Self {
        match config_file_path() {
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }
}

/// Locate the configuration file for the current platform
///
/// Linux checks `~/.config/invest/config.toml` then `/etc/invest/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("invest").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/invest/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub port: u16,
    pub llm_port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            port: 5800,
            llm_port: 5801,
        }
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("invest"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\invest"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("invest"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/invest"))
    } else {
        // ~/.local/share/invest (or /var/lib/invest for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("invest"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/invest"))
    }
}

/// Root folder resolution in priority order (CLI → ENV → TOML → default)
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Set the command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Set the value read from the TOML file
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder (compiled default): {}", path.display());
        path
    }
}

/// Creates the root folder layout on first run
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root and uploads directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root_folder.join(UPLOADS_DIR)
    }
}

/// Resolve a secret or endpoint value: environment wins over TOML
///
/// Blank values count as absent. Returns `None` when neither source has one.
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&String>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.filter(|v| !v.trim().is_empty()).cloned();

    if env_value.is_some() && toml_value.is_some() {
        warn!("{} found in environment and TOML config, using environment", name);
    }

    env_value.or(toml_value)
}
