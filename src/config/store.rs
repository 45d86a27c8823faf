//! Persisted service records and the stores that hold them

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the required executable path entry
pub const FIELD_EXE_PATH: &str = "ExePath";
/// Name of the optional argument string entry
pub const FIELD_ARGS: &str = "Args";
/// Name of the optional working directory entry
pub const FIELD_WORKING_DIR: &str = "WorkingDir";
/// Name of the optional display name entry
pub const FIELD_DISPLAY_NAME: &str = "DisplayName";

/// Named string entries of one service record
pub type Parameters = BTreeMap<String, String>;

/// Description of the process a service instance supervises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Display name (falls back to the service identifier)
    pub name: String,
    /// Absolute path of the target executable
    pub exe_path: PathBuf,
    /// Raw whitespace-delimited argument string
    pub args: String,
    /// Working directory as stored (None = next to the executable)
    pub working_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Build a config from a record's entries, applying defaults
    ///
    /// Empty strings count as absent. A missing `ExePath` is an error,
    /// every other entry has a fallback.
    pub fn from_parameters(service_id: &str, params: &Parameters) -> Result<Self, ConfigError> {
        let field = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let exe_path = field(FIELD_EXE_PATH)
            .ok_or_else(|| ConfigError::malformed(service_id, "missing required ExePath"))?;

        Ok(Self {
            name: field(FIELD_DISPLAY_NAME).unwrap_or(service_id).to_string(),
            exe_path: PathBuf::from(exe_path),
            args: field(FIELD_ARGS).unwrap_or_default().to_string(),
            working_dir: field(FIELD_WORKING_DIR).map(PathBuf::from),
        })
    }

    /// Working directory the child is started in
    pub fn working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => self
                .exe_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Argument vector handed to the child
    pub fn argv(&self) -> Vec<String> {
        crate::process::tokenize_args(&self.args)
    }
}

/// Read-only lookup of service records
pub trait ConfigStore {
    /// Fetch the raw entries stored for a service
    fn read_parameters(&self, service_id: &str) -> Result<Parameters, ConfigError>;

    /// Load and validate the config for a service
    fn load(&self, service_id: &str) -> Result<ServiceConfig, ConfigError> {
        let params = self.read_parameters(service_id)?;
        let config = ServiceConfig::from_parameters(service_id, &params)?;
        debug!("Loaded config for '{}': {:?}", service_id, config);
        Ok(config)
    }
}

/// File-backed store laid out like the registry tree
///
/// Records live at `<root>/Services/<service_id>/Parameters.toml` as a flat
/// table of string entries.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the record file for a service
    pub fn record_path(&self, service_id: &str) -> PathBuf {
        self.root
            .join("Services")
            .join(service_id)
            .join("Parameters.toml")
    }
}

impl ConfigStore for FileStore {
    fn read_parameters(&self, service_id: &str) -> Result<Parameters, ConfigError> {
        let path = self.record_path(service_id);

        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound {
                service_id: service_id.to_string(),
            },
            ErrorKind::PermissionDenied => ConfigError::AccessDenied {
                service_id: service_id.to_string(),
            },
            _ => ConfigError::Io {
                path: path.to_string_lossy().to_string(),
                source: e,
            },
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::malformed(service_id, e.to_string()))
    }
}
