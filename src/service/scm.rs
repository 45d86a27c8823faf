//! Windows Service Control Manager channel

use crate::config::Settings;
use crate::error::{Result, WrapperError};
use crate::service::driver::{report_failure, run_service_host, StatusReporter};
use crate::service::host::{ControlRequest, ServiceHost, ServiceState, ServiceStatus};
use crate::service::target::ManagedTarget;
use crossbeam_channel::unbounded;
use std::ffi::OsString;
use std::sync::OnceLock;
use tracing::{error, info};
use windows_service::{
    define_windows_service,
    service::{self, ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceType},
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
    service_dispatcher,
};

const SERVICE_TYPE: ServiceType = ServiceType::OWN_PROCESS;

/// ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: not started by the SCM
const ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: i32 = 1063;

/// What the SCM-invoked entry point needs to know
struct WrapperContext {
    service_id: String,
    settings: Settings,
}

static CONTEXT: OnceLock<WrapperContext> = OnceLock::new();

/// Hand the process over to the SCM dispatcher
///
/// Returns `Ok(false)` when the process was not started by the SCM, in which
/// case nothing has run yet and the caller should fall back to the console.
pub fn run_dispatcher(service_id: &str, settings: &Settings) -> Result<bool> {
    let _ = CONTEXT.set(WrapperContext {
        service_id: service_id.to_string(),
        settings: settings.clone(),
    });

    match service_dispatcher::start(service_id, ffi_service_main) {
        Ok(()) => Ok(true),
        Err(windows_service::Error::Winapi(e))
            if e.raw_os_error() == Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT) =>
        {
            Ok(false)
        }
        Err(e) => Err(WrapperError::ControlProtocol(format!(
            "service dispatcher failed: {}",
            e
        ))),
    }
}

// Generate the Windows service entry point
define_windows_service!(ffi_service_main, service_main);

/// Service main function called by the Windows Service Control Manager
///
/// A failed run has already sent its final `Stopped` report, so the process
/// ends here with the matching exit code.
fn service_main(arguments: Vec<OsString>) {
    let Some(context) = CONTEXT.get() else {
        error!("Service started without a wrapper context");
        let err = WrapperError::ControlProtocol("missing wrapper context".to_string());
        let code = match arguments.first().and_then(|name| name.to_str()) {
            Some(name) => report_unregistered(name, &err),
            None => err.exit_code(),
        };
        std::process::exit(code as i32);
    };

    match run_service_main(context) {
        Ok(code) => info!("Service {} stopped, exit code {}", context.service_id, code),
        Err(e) => {
            error!("Service {} error: {}", context.service_id, e);
            std::process::exit(e.exit_code() as i32);
        }
    }
}

/// Register a handler only to tell the SCM the service has stopped
fn report_unregistered(service_name: &str, err: &WrapperError) -> u32 {
    match service_control_handler::register(service_name, |_| {
        ServiceControlHandlerResult::NotImplemented
    }) {
        Ok(handle) => report_failure(&mut ScmReporter::new(handle), err),
        Err(e) => {
            error!("Failed to register handler for {}: {}", service_name, e);
            err.exit_code()
        }
    }
}

fn run_service_main(context: &WrapperContext) -> Result<u32> {
    let (control_tx, control_rx) = unbounded();

    let status_handle = service_control_handler::register(
        &context.service_id,
        move |control_event| -> ServiceControlHandlerResult {
            let (request, result) = match control_event {
                ServiceControl::Stop => (ControlRequest::Stop, ServiceControlHandlerResult::NoError),
                ServiceControl::Shutdown => (
                    ControlRequest::Shutdown,
                    ServiceControlHandlerResult::NoError,
                ),
                ServiceControl::Interrogate => (
                    ControlRequest::Interrogate,
                    ServiceControlHandlerResult::NoError,
                ),
                other => (
                    ControlRequest::Other(format!("{:?}", other)),
                    ServiceControlHandlerResult::NotImplemented,
                ),
            };
            let _ = control_tx.send(request);
            result
        },
    )
    .map_err(|e| WrapperError::ControlProtocol(format!("failed to register handler: {}", e)))?;

    let settings = &context.settings;
    let mut reporter = ScmReporter::new(status_handle);
    let mut host = ServiceHost::new(&context.service_id);
    let mut target = ManagedTarget::new(
        &context.service_id,
        settings.open_store(),
        settings.log_root(),
        settings.stop_timeout(),
    );

    run_service_host(
        &mut host,
        &mut target,
        &control_rx,
        &mut reporter,
        settings.poll_interval(),
    )
    .map_err(|e| {
        report_failure(&mut reporter, &e);
        e
    })
}

/// Forwards status reports to the SCM
struct ScmReporter {
    handle: ServiceStatusHandle,
    checkpoint: u32,
}

impl ScmReporter {
    fn new(handle: ServiceStatusHandle) -> Self {
        Self {
            handle,
            checkpoint: 0,
        }
    }
}

impl StatusReporter for ScmReporter {
    fn report(&mut self, status: &ServiceStatus) -> Result<()> {
        let current_state = match status.state {
            ServiceState::StartPending => service::ServiceState::StartPending,
            ServiceState::Running => service::ServiceState::Running,
            ServiceState::StopPending => service::ServiceState::StopPending,
            ServiceState::Stopped => service::ServiceState::Stopped,
        };

        // Pending states must advance the checkpoint on every report
        self.checkpoint = match status.state {
            ServiceState::StartPending | ServiceState::StopPending => self.checkpoint + 1,
            _ => 0,
        };

        let exit_code = match status.exit_code {
            0 => ServiceExitCode::Win32(0),
            code => ServiceExitCode::ServiceSpecific(code),
        };

        self.handle
            .set_service_status(service::ServiceStatus {
                service_type: SERVICE_TYPE,
                current_state,
                controls_accepted: ServiceControlAccept::from_bits_truncate(
                    status.controls_accepted.bits(),
                ),
                exit_code,
                checkpoint: self.checkpoint,
                wait_hint: status.wait_hint,
                process_id: None,
            })
            .map_err(|e| WrapperError::ControlProtocol(format!("failed to set status: {}", e)))
    }
}
