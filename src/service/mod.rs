//! Windows Service support for svcwrap
//!
//! This module runs a configured executable as a background service managed
//! by the Windows Service Control Manager, or under a console stand-in when
//! the wrapper is started by hand.

mod console;
mod driver;
mod host;
#[cfg(all(windows, feature = "service"))]
mod scm;
mod target;

pub use console::{console_controls, ConsoleReporter};
pub use driver::{report_failure, run_service_host, StatusReporter, Target};
pub use host::{
    AcceptedControls, ControlRequest, HostAction, HostEvent, ServiceHost, ServiceState,
    ServiceStatus,
};
pub use target::ManagedTarget;

use crate::config::Settings;
use crate::error::Result;
use tracing::info;

/// Argument selecting wrapper mode: `--service-wrapper <service-id>`
pub const WRAPPER_FLAG: &str = "--service-wrapper";

/// Run a service under the live SCM, or the console when not started by it
///
/// Returns the exit code of the final `Stopped` report.
pub fn run_wrapper(service_id: &str, settings: &Settings) -> Result<u32> {
    #[cfg(all(windows, feature = "service"))]
    {
        if scm::run_dispatcher(service_id, settings)? {
            return Ok(0);
        }
        info!("Not started by the service control manager");
    }

    run_console(service_id, settings)
}

/// Run a service in the foreground with Ctrl+C as the stop control
pub fn run_console(service_id: &str, settings: &Settings) -> Result<u32> {
    info!("Running {} in console mode, press Ctrl+C to stop", service_id);

    let controls = console_controls()?;
    let mut reporter = ConsoleReporter::new(service_id);
    let mut host = ServiceHost::new(service_id);
    let mut target = ManagedTarget::new(
        service_id,
        settings.open_store(),
        settings.log_root(),
        settings.stop_timeout(),
    );

    run_service_host(
        &mut host,
        &mut target,
        &controls,
        &mut reporter,
        settings.poll_interval(),
    )
}
