//! Lookup of previously written service logs

use crate::error::{Result, WrapperError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Length of the `YYYYMMDDHHMMSS` stamp in log file names
const STAMP_LEN: usize = 14;

/// Check whether `file_name` is a start log of `service_id`
fn is_service_log(file_name: &str, service_id: &str) -> bool {
    file_name
        .strip_prefix(service_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".log"))
        .is_some_and(|stamp| stamp.len() == STAMP_LEN && stamp.bytes().all(|b| b.is_ascii_digit()))
}

/// All start logs of a service, oldest first
pub fn service_logs(root: &Path, service_id: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => WrapperError::NoLogs(service_id.to_string()),
        _ => WrapperError::LogIo {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| is_service_log(name, service_id))
        })
        .map(|entry| entry.path())
        .collect();

    // Stamps are fixed-width, so name order is start order
    logs.sort();
    debug!("Found {} log files for '{}'", logs.len(), service_id);
    Ok(logs)
}

/// Path of the most recent start log of a service
pub fn latest_log_path(root: &Path, service_id: &str) -> Result<PathBuf> {
    service_logs(root, service_id)?
        .pop()
        .ok_or_else(|| WrapperError::NoLogs(service_id.to_string()))
}

/// Content of the most recent start log of a service
pub fn read_latest_log(root: &Path, service_id: &str) -> Result<String> {
    let path = latest_log_path(root, service_id)?;
    let bytes = fs::read(&path).map_err(|e| WrapperError::LogIo {
        path: path.clone(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matching() {
        assert!(is_service_log("svc_20240101120000.log", "svc"));
        assert!(!is_service_log("svc_other_20240101120000.log", "svc"));
        assert!(!is_service_log("svc_2024.log", "svc"));
        assert!(!is_service_log("svc_20240101120000.txt", "svc"));
        assert!(is_service_log("svc_other_20240101120000.log", "svc_other"));
    }

    #[test]
    fn test_latest_log_selected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("svc_20240101120000.log"), "old").unwrap();
        fs::write(dir.path().join("svc_20240301080000.log"), "new").unwrap();
        fs::write(dir.path().join("svc_extra_20250101000000.log"), "other").unwrap();

        let latest = latest_log_path(dir.path(), "svc").unwrap();
        assert_eq!(latest, dir.path().join("svc_20240301080000.log"));
        assert_eq!(read_latest_log(dir.path(), "svc").unwrap(), "new");
        assert_eq!(service_logs(dir.path(), "svc").unwrap().len(), 2);
    }

    #[test]
    fn test_no_logs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            latest_log_path(dir.path(), "svc"),
            Err(WrapperError::NoLogs(_))
        ));
        assert!(matches!(
            latest_log_path(&dir.path().join("missing"), "svc"),
            Err(WrapperError::NoLogs(_))
        ));
    }
}
