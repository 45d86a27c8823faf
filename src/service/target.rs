//! The supervised executable as seen by the service host

use crate::config::{ConfigStore, ServiceConfig};
use crate::error::Result;
use crate::logs::LogSink;
use crate::process::ProcessSupervisor;
use crate::service::driver::Target;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Loads the service record, opens a log and supervises the process
pub struct ManagedTarget {
    service_id: String,
    store: Box<dyn ConfigStore + Send>,
    log_root: PathBuf,
    supervisor: ProcessSupervisor,
    config: Option<ServiceConfig>,
}

impl ManagedTarget {
    pub fn new(
        service_id: impl Into<String>,
        store: Box<dyn ConfigStore + Send>,
        log_root: impl Into<PathBuf>,
        stop_timeout: Option<Duration>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            store,
            log_root: log_root.into(),
            supervisor: ProcessSupervisor::new().with_stop_timeout(stop_timeout),
            config: None,
        }
    }

    /// Config loaded by the last start
    pub fn config(&self) -> Option<&ServiceConfig> {
        self.config.as_ref()
    }

    /// Exit status of the last child, once it has been reaped
    pub fn exit_status(&self) -> Option<std::process::ExitStatus> {
        self.supervisor.exit_status()
    }

    /// Path of the log receiving the child's output
    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.supervisor.log_path()
    }
}

impl Target for ManagedTarget {
    fn start(&mut self) -> Result<u32> {
        let config = self.store.load(&self.service_id)?;
        info!(
            "Starting '{}' ({}): {:?} {}",
            self.service_id,
            config.name,
            config.exe_path,
            config.args
        );

        let sink = LogSink::acquire(&self.log_root, &self.service_id, &config);
        let pid = self.supervisor.start(&config, sink)?;
        self.config = Some(config);
        Ok(pid)
    }

    fn stop(&mut self) {
        self.supervisor.stop();
    }

    fn is_alive(&self) -> bool {
        self.supervisor.is_alive()
    }
}
