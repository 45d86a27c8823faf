//! Per-start log files capturing the supervised process's output

use crate::config::ServiceConfig;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Timestamp format embedded in log file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp format used inside the header block
const HEADER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File name of the log for one service start
pub fn log_file_name(service_id: &str, started: &DateTime<Local>) -> String {
    format!(
        "{}_{}.log",
        service_id,
        started.format(FILE_TIMESTAMP_FORMAT)
    )
}

/// Open the wrapper's own diagnostic log, `<root>/wrapper/<service_id>.log`
///
/// Kept in a subdirectory so it never shows up as a service log.
pub fn open_wrapper_log(root: &Path, service_id: &str) -> io::Result<File> {
    let dir = root.join("wrapper");
    fs::create_dir_all(&dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", service_id)))
}

/// Append-only log file for one service start
///
/// A sink whose file could not be opened is a null sink: writes are
/// discarded and the child's output goes nowhere, but the child still runs.
#[derive(Debug)]
pub struct LogSink {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl LogSink {
    /// Open a new log file for a service start beginning now
    pub fn acquire(root: &Path, service_id: &str, config: &ServiceConfig) -> Self {
        Self::acquire_at(root, service_id, config, Local::now())
    }

    /// Open a new log file for a service start at `started`
    ///
    /// Never fails: directory or file errors are logged and yield a null sink.
    pub fn acquire_at(
        root: &Path,
        service_id: &str,
        config: &ServiceConfig,
        started: DateTime<Local>,
    ) -> Self {
        if let Err(e) = fs::create_dir_all(root) {
            warn!("Failed to create log directory {:?}: {}", root, e);
        }

        let path = root.join(log_file_name(service_id, &started));
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to open log file {:?}: {}, output will be discarded", path, e);
                return Self::null();
            }
        };

        let mut sink = Self {
            path: Some(path),
            file: Some(file),
        };
        sink.write_header(service_id, config, &started);
        sink
    }

    /// Sink that discards everything
    pub fn null() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    /// Whether output is being discarded
    pub fn is_null(&self) -> bool {
        self.file.is_none()
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Handle suitable for a child's stdout or stderr
    pub fn stdio(&self) -> Stdio {
        match self.file.as_ref().map(File::try_clone) {
            Some(Ok(file)) => Stdio::from(file),
            Some(Err(e)) => {
                warn!("Failed to duplicate log handle: {}", e);
                Stdio::null()
            }
            None => Stdio::null(),
        }
    }

    /// Append a single line, ignoring failures
    pub fn note(&mut self, line: &str) {
        if let Err(e) = writeln!(self, "{}", line).and_then(|_| self.flush()) {
            warn!("Failed to write to log file: {}", e);
        }
    }

    /// Flush and close the file
    pub fn close(mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                debug!("Failed to sync log file: {}", e);
            }
        }
    }

    fn write_header(&mut self, service_id: &str, config: &ServiceConfig, started: &DateTime<Local>) {
        let header = format!(
            "=== Service log start ===\n\
             Service={}\n\
             StartTime={}\n\
             ExePath={}\n\
             WorkingDir={}\n\
             Args={}\n\
             =========================\n\n",
            service_id,
            started.format(HEADER_TIMESTAMP_FORMAT),
            config.exe_path.display(),
            config.working_dir().display(),
            config.args,
        );

        let Some(file) = self.file.as_mut() else {
            return;
        };
        let result = file
            .write_all(header.as_bytes())
            .and_then(|_| file.sync_data());
        match result {
            Ok(()) => info!("Logging service output to {:?}", self.path),
            Err(e) => warn!("Failed to write log header: {}", e),
        }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
