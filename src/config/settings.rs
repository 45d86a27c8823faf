//! Wrapper settings file support

use crate::config::store::{ConfigStore, FileStore};
use crate::error::WrapperError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backing store for service records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// `HKLM\SYSTEM\CurrentControlSet\Services\<id>\Parameters`
    Registry,
    /// `<store_root>/Services/<id>/Parameters.toml`
    File,
}

impl Default for StoreKind {
    fn default() -> Self {
        if cfg!(windows) {
            StoreKind::Registry
        } else {
            StoreKind::File
        }
    }
}

/// Wrapper settings loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory receiving per-start service logs (empty = platform default)
    pub log_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Interval between liveness polls in milliseconds
    pub poll_interval_ms: u64,

    /// Ceiling on the wait for a killed child to be reaped (absent = unbounded)
    pub stop_timeout_secs: Option<u64>,

    /// Where service records are read from
    pub store: StoreKind,

    /// Root of the file store (empty = platform default)
    pub store_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_root: None,
            log_level: "info".to_string(),
            poll_interval_ms: 1000,
            stop_timeout_secs: None,
            store: StoreKind::default(),
            store_root: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WrapperError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WrapperError::Settings(format!(
                "failed to read '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            WrapperError::Settings(format!(
                "failed to parse '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Load settings from default locations
    ///
    /// Searches in order:
    /// 1. Same directory as executable: svcwrap.toml
    /// 2. %PROGRAMDATA%\svcwrap\config.toml
    pub fn load_default() -> Result<Self, WrapperError> {
        // Try executable directory first
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let config_path = exe_dir.join("svcwrap.toml");
                if config_path.exists() {
                    return Self::load(&config_path);
                }
            }
        }

        // Try ProgramData
        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            let config_path = Path::new(&program_data).join("svcwrap").join("config.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        // Return default settings if no file found
        Ok(Self::default())
    }

    /// Save settings to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WrapperError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WrapperError::Settings(format!("failed to serialize: {}", e)))?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WrapperError::Settings(format!("failed to create '{}': {}", parent.display(), e))
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| {
            WrapperError::Settings(format!(
                "failed to write '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Directory receiving `<service>_<timestamp>.log` files
    pub fn log_root(&self) -> PathBuf {
        if let Some(root) = self.log_root.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            return root.clone();
        }

        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            return Path::new(&program_data).join("windows_service_logs");
        }

        dirs::data_local_dir()
            .map(|d| d.join("svcwrap").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    /// Root directory of the file-backed record store
    pub fn store_root(&self) -> PathBuf {
        if let Some(root) = self
            .store_root
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            return root.clone();
        }

        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            return Path::new(&program_data).join("svcwrap");
        }

        dirs::config_dir()
            .map(|d| d.join("svcwrap"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Liveness poll interval (never zero)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    /// Reap ceiling applied after a forced kill
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }

    /// Open the configured record store
    pub fn open_store(&self) -> Box<dyn ConfigStore + Send> {
        match self.store {
            #[cfg(windows)]
            StoreKind::Registry => Box::new(crate::config::RegistryStore::new()),
            #[cfg(not(windows))]
            StoreKind::Registry => {
                tracing::warn!("Registry store is only available on Windows, using file store");
                Box::new(FileStore::new(self.store_root()))
            }
            StoreKind::File => Box::new(FileStore::new(self.store_root())),
        }
    }

    /// Generate a sample settings file content
    pub fn sample() -> String {
        r#"# svcwrap settings
# Place next to svcwrap.exe as svcwrap.toml, or at %PROGRAMDATA%\svcwrap\config.toml

# Directory for per-start service logs
# (default: %PROGRAMDATA%\windows_service_logs)
# log_root = "C:\\ProgramData\\windows_service_logs"

# Log level: trace, debug, info, warn, error (default: info)
log_level = "info"

# How often the supervised process is checked for exit, in ms (default: 1000)
poll_interval_ms = 1000

# Give up waiting for a killed process after this many seconds
# (default: wait indefinitely)
# stop_timeout_secs = 30

# Where service records are read from: "registry" or "file"
store = "registry"

# Root of the file store, used when store = "file"
# store_root = "C:\\ProgramData\\svcwrap"
"#
        .to_string()
    }
}
