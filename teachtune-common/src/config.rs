//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration lives in a small TOML file; everything that can
//! change at runtime lives in the database `settings` table
//! (see [`crate::db::RuntimeSettings`]).

use crate::time::SchedulingZone;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "TEACHTUNE_ROOT_FOLDER";

/// Shorter alias, consulted after [`ROOT_FOLDER_ENV`]
pub const ROOT_ENV: &str = "TEACHTUNE_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "teachtune.db";

/// Bootstrap configuration loaded from TOML
///
/// Cannot change while the service runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Zone used to interpret lesson slot times
    #[serde(default)]
    pub timezone: SchedulingZone,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
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

impl LoggingConfig {
    /// Open the configured log file for appending, creating its folder
    ///
    /// `Ok(None)` means no file is configured.
    pub fn open_file(&self) -> Result<Option<File>> {
        let Some(path) = &self.file else {
            return Ok(None);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Some(file))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the module's config file if one exists
    ///
    /// Returns `Ok(None)` when there is no file to read. Callers that start
    /// logging from this config report the error once logging is up.
    pub fn load_module(module_name: &str) -> Result<Option<Self>> {
        match config_file_path(module_name) {
            Some(path) if path.exists() => Self::load(&path).map(Some),
            Some(path) => {
                debug!("Config file {} not found; using defaults", path.display());
                Ok(None)
            }
            None => {
                debug!("No config directory on this platform; using defaults");
                Ok(None)
            }
        }
    }

    /// Load the module's config file, falling back to defaults
    ///
    /// A missing or unreadable file never stops startup; it is logged and
    /// the built-in defaults apply.
    pub fn load_or_default(module_name: &str) -> Self {
        match Self::load_module(module_name) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }
}

/// Platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/teachtune
            dirs::data_local_dir()
                .map(|d| d.join("teachtune"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/teachtune"))
        } else if cfg!(target_os = "macos") {
            // ~/Library/Application Support/teachtune
            dirs::data_dir()
                .map(|d| d.join("teachtune"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/teachtune"))
        } else if cfg!(target_os = "windows") {
            // %LOCALAPPDATA%\teachtune
            dirs::data_local_dir()
                .map(|d| d.join("teachtune"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\teachtune"))
        } else {
            PathBuf::from("./teachtune_data")
        };

        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Path of a module's config file: `<config dir>/teachtune/<module>.toml`
///
/// On Linux `/etc/teachtune/<module>.toml` is used when the per-user file
/// does not exist.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user = dirs::config_dir().map(|d| d.join("teachtune").join(&file_name));

    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/teachtune").join(&file_name);
        match user {
            Some(path) if path.exists() => Some(path),
            _ if system.exists() => Some(system),
            other => other,
        }
    } else {
        user
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `TEACHTUNE_ROOT_FOLDER`, then `TEACHTUNE_ROOT`
/// 3. TOML config file
/// 4. Platform default
#[derive(Debug, Clone)]
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

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an already-loaded TOML config instead of reading the file again
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        config_file_path(&self.module_name)
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }
        if let Some(path) = TomlConfig::load_or_default(&self.module_name).root_folder {
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the root folder and locates the database inside it
#[derive(Debug, Clone)]
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

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
