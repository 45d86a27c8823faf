//! Service lifecycle state machine
//!
//! `ServiceHost` knows nothing about the SCM or child processes: it consumes
//! [`HostEvent`]s and answers with [`HostAction`]s for a driver to carry out.

use std::time::Duration;
use tracing::{debug, info, warn};

/// Wait hint reported while starting
const START_WAIT_HINT: Duration = Duration::from_secs(10);

/// Wait hint reported while stopping
const STOP_WAIT_HINT: Duration = Duration::from_secs(5);

/// Lifecycle state reported to the SCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceState::StartPending => "START_PENDING",
            ServiceState::Running => "RUNNING",
            ServiceState::StopPending => "STOP_PENDING",
            ServiceState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Set of control requests the service accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptedControls(u32);

impl AcceptedControls {
    pub const NONE: Self = Self(0);
    pub const STOP: Self = Self(0x1);
    pub const SHUTDOWN: Self = Self(0x4);

    /// Raw bitmask (SERVICE_ACCEPT_* values)
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AcceptedControls {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Status report sent to the SCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub controls_accepted: AcceptedControls,
    pub exit_code: u32,
    pub checkpoint: u32,
    pub wait_hint: Duration,
}

impl ServiceStatus {
    fn new(state: ServiceState, exit_code: u32) -> Self {
        let (controls_accepted, wait_hint) = match state {
            ServiceState::StartPending => (AcceptedControls::NONE, START_WAIT_HINT),
            ServiceState::Running => (
                AcceptedControls::STOP | AcceptedControls::SHUTDOWN,
                Duration::ZERO,
            ),
            ServiceState::StopPending => (AcceptedControls::NONE, STOP_WAIT_HINT),
            ServiceState::Stopped => (AcceptedControls::NONE, Duration::ZERO),
        };

        Self {
            state,
            controls_accepted,
            exit_code,
            checkpoint: 0,
            wait_hint,
        }
    }

    /// Final report for a host that ends outside the state machine
    pub fn stopped(exit_code: u32) -> Self {
        Self::new(ServiceState::Stopped, exit_code)
    }
}

/// Control request delivered by the control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Stop,
    Shutdown,
    Interrogate,
    /// Anything else, kept for logging
    Other(String),
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Outcome of starting the child: its pid, or a non-zero exit code
    StartResult(Result<u32, u32>),
    /// A control request arrived
    ControlReceived(ControlRequest),
    /// The child's liveness flag was observed
    LivenessChanged { alive: bool },
    /// A requested stop of the child has returned
    StopCompleted,
}

/// Work the driver must carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    /// Send this status to the SCM
    Report(ServiceStatus),
    /// Stop the child, then feed back [`HostEvent::StopCompleted`]
    StopChild,
}

/// State machine bridging the control channel and the supervised process
#[derive(Debug)]
pub struct ServiceHost {
    service_id: String,
    status: ServiceStatus,
}

impl ServiceHost {
    /// Create a host in the `StartPending` entry state
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            status: ServiceStatus::new(ServiceState::StartPending, 0),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.status.state
    }

    /// Last status reported
    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Whether the host reached `Stopped`
    pub fn is_terminal(&self) -> bool {
        self.status.state == ServiceState::Stopped
    }

    /// Initial report issued on activation
    pub fn activate(&self) -> Vec<HostAction> {
        vec![HostAction::Report(self.status)]
    }

    /// Advance the state machine
    pub fn handle(&mut self, event: HostEvent) -> Vec<HostAction> {
        use HostEvent::*;
        use ServiceState::*;

        if self.is_terminal() {
            debug!("Ignoring {:?} after stop", event);
            return Vec::new();
        }

        match (self.status.state, event) {
            (_, ControlReceived(ControlRequest::Interrogate)) => {
                vec![HostAction::Report(self.status)]
            }
            (StartPending, StartResult(Ok(pid))) => {
                info!("Service {} running, target PID: {}", self.service_id, pid);
                self.transition(Running, 0)
            }
            (StartPending, StartResult(Err(code))) => {
                warn!(
                    "Service {} failed to start, exit code {}",
                    self.service_id, code
                );
                self.transition(Stopped, code)
            }
            (Running, ControlReceived(ControlRequest::Stop | ControlRequest::Shutdown)) => {
                info!("Service {} received stop signal", self.service_id);
                let mut actions = self.transition(StopPending, 0);
                actions.push(HostAction::StopChild);
                actions
            }
            (Running, LivenessChanged { alive: false }) => {
                info!(
                    "Target process exited, stopping service {}",
                    self.service_id
                );
                self.transition(Stopped, 0)
            }
            (StopPending, StopCompleted) => self.transition(Stopped, 0),
            (_, ControlReceived(ControlRequest::Other(name))) => {
                warn!("Service {} ignoring unknown control: {}", self.service_id, name);
                Vec::new()
            }
            (state, event) => {
                debug!("No transition from {} on {:?}", state, event);
                Vec::new()
            }
        }
    }

    fn transition(&mut self, state: ServiceState, exit_code: u32) -> Vec<HostAction> {
        debug!("{} -> {}", self.status.state, state);
        self.status = ServiceStatus::new(state, exit_code);
        vec![HostAction::Report(self.status)]
    }
}
