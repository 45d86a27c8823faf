//! Console stand-in for the SCM, used when debugging a service interactively

use crate::error::{Result, WrapperError};
use crate::service::driver::StatusReporter;
use crate::service::host::{ControlRequest, ServiceStatus};
use crossbeam_channel::{unbounded, Receiver};
use tracing::info;

/// Control channel fed by Ctrl+C
///
/// Every Ctrl+C delivers a `Stop` request. Can only be installed once per
/// process.
pub fn console_controls() -> Result<Receiver<ControlRequest>> {
    let (tx, rx) = unbounded();

    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, stopping...");
        let _ = tx.send(ControlRequest::Stop);
    })
    .map_err(|e| WrapperError::ControlProtocol(format!("failed to install Ctrl+C handler: {}", e)))?;

    Ok(rx)
}

/// Reporter that logs each status instead of sending it to the SCM
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    service_id: String,
}

impl ConsoleReporter {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
        }
    }
}

impl StatusReporter for ConsoleReporter {
    fn report(&mut self, status: &ServiceStatus) -> Result<()> {
        info!(
            "[{}] {} (accepts {:#x}, exit code {})",
            self.service_id,
            status.state,
            status.controls_accepted.bits(),
            status.exit_code
        );
        Ok(())
    }
}
