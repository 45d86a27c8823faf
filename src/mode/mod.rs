//! Classification of how the current process was invoked

mod elevation;

pub use elevation::is_elevated;

use crate::service::WRAPPER_FLAG;
use std::path::{Path, PathBuf};

/// Environment variable marking a development build
pub const ENV_DEV: &str = "SVCWRAP_DEV";

/// Environment variable suppressing the elevation requirement
pub const ENV_NO_ELEVATE: &str = "SVCWRAP_NO_ELEVATE";

/// How the process should behave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Interactive use from a shell
    NormalInteractive,
    /// Needs to be restarted with administrator rights
    ElevationRelaunchNeeded,
    /// Acting as the service with the given identifier
    ServiceWrapper(String),
}

/// Everything classification depends on
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Full argument vector including the program name
    pub args: Vec<String>,
    /// Path of the running executable
    pub exe_path: PathBuf,
    /// Value of [`ENV_DEV`]
    pub dev_marker: Option<String>,
    /// Value of [`ENV_NO_ELEVATE`]
    pub no_elevate_marker: Option<String>,
    /// Whether the process token is elevated
    pub elevated: bool,
}

impl Invocation {
    /// Capture the current process's invocation
    pub fn from_env() -> Self {
        Self {
            args: std::env::args().collect(),
            exe_path: std::env::current_exe().unwrap_or_default(),
            dev_marker: std::env::var(ENV_DEV).ok(),
            no_elevate_marker: std::env::var(ENV_NO_ELEVATE).ok(),
            elevated: is_elevated(),
        }
    }

    /// Service identifier when invoked as `<exe> --service-wrapper <id>`
    pub fn wrapper_service_id(&self) -> Option<&str> {
        match self.args.as_slice() {
            [_, flag, id, ..] if flag == WRAPPER_FLAG && !id.trim().is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    /// Whether this looks like a development run
    pub fn is_dev(&self) -> bool {
        is_dev_executable(&self.exe_path)
            || self.dev_marker.as_deref().is_some_and(|v| !v.is_empty())
            || self.no_elevate_marker.as_deref() == Some("1")
    }

    /// Decide the mode
    ///
    /// Precedence: the wrapper argument pattern, then elevation, then
    /// development markers.
    pub fn classify(&self) -> Mode {
        if let Some(id) = self.wrapper_service_id() {
            return Mode::ServiceWrapper(id.to_string());
        }
        if self.elevated || self.is_dev() {
            return Mode::NormalInteractive;
        }
        Mode::ElevationRelaunchNeeded
    }
}

fn is_dev_executable(exe: &Path) -> bool {
    exe.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().contains("-dev"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(args: &[&str], elevated: bool) -> Invocation {
        Invocation {
            args: args.iter().map(|a| a.to_string()).collect(),
            exe_path: PathBuf::from("/opt/svcwrap/svcwrap"),
            elevated,
            ..Default::default()
        }
    }

    #[test]
    fn test_wrapper_mode_wins() {
        let inv = invocation(&["svcwrap", "--service-wrapper", "myservice"], false);
        assert_eq!(inv.classify(), Mode::ServiceWrapper("myservice".into()));

        let inv = invocation(&["svcwrap", "--service-wrapper", "myservice"], true);
        assert_eq!(inv.classify(), Mode::ServiceWrapper("myservice".into()));
    }

    #[test]
    fn test_wrapper_flag_needs_position_and_id() {
        let inv = invocation(&["svcwrap", "--service-wrapper"], true);
        assert_eq!(inv.classify(), Mode::NormalInteractive);

        let inv = invocation(&["svcwrap", "show", "--service-wrapper", "x"], true);
        assert_eq!(inv.classify(), Mode::NormalInteractive);

        let inv = invocation(&["svcwrap", "--service-wrapper", " "], true);
        assert_eq!(inv.wrapper_service_id(), None);
    }

    #[test]
    fn test_elevation() {
        assert_eq!(
            invocation(&["svcwrap", "show", "x"], true).classify(),
            Mode::NormalInteractive
        );
        assert_eq!(
            invocation(&["svcwrap", "show", "x"], false).classify(),
            Mode::ElevationRelaunchNeeded
        );
    }

    #[test]
    fn test_dev_markers_skip_elevation() {
        let mut inv = invocation(&["svcwrap"], false);
        inv.exe_path = PathBuf::from("/build/svcwrap-DEV.exe");
        assert_eq!(inv.classify(), Mode::NormalInteractive);

        let mut inv = invocation(&["svcwrap"], false);
        inv.dev_marker = Some("1".into());
        assert_eq!(inv.classify(), Mode::NormalInteractive);

        let mut inv = invocation(&["svcwrap"], false);
        inv.dev_marker = Some(String::new());
        inv.no_elevate_marker = Some("0".into());
        assert_eq!(inv.classify(), Mode::ElevationRelaunchNeeded);

        inv.no_elevate_marker = Some("1".into());
        assert_eq!(inv.classify(), Mode::NormalInteractive);
    }
}
