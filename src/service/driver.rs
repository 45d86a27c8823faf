//! Event loop driving a [`ServiceHost`] against a target and a control channel

use crate::error::{Result, WrapperError};
use crate::service::host::{ControlRequest, HostAction, HostEvent, ServiceHost, ServiceStatus};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Something the host can start, stop and observe
pub trait Target {
    /// Launch the target, returning its process id
    fn start(&mut self) -> Result<u32>;

    /// Terminate the target and wait until it is gone; idempotent
    fn stop(&mut self);

    /// Whether the target is still running
    fn is_alive(&self) -> bool;
}

/// Outbound half of the control channel
pub trait StatusReporter {
    /// Publish a status; failure is a control protocol error
    fn report(&mut self, status: &ServiceStatus) -> Result<()>;
}

/// Run the service lifecycle to completion
///
/// Control requests are handled as soon as they arrive; liveness is checked
/// whenever `poll_interval` has elapsed since the previous check. Returns the
/// exit code of the final `Stopped` report.
pub fn run_service_host<T, R>(
    host: &mut ServiceHost,
    target: &mut T,
    controls: &Receiver<ControlRequest>,
    reporter: &mut R,
    poll_interval: Duration,
) -> Result<u32>
where
    T: Target + ?Sized,
    R: StatusReporter + ?Sized,
{
    let actions = host.activate();
    apply(host, target, reporter, actions)?;

    let start = match target.start() {
        Ok(pid) => Ok(pid),
        Err(e) => {
            error!("Failed to start target: {}", e);
            Err(e.exit_code())
        }
    };
    let actions = host.handle(HostEvent::StartResult(start));
    apply(host, target, reporter, actions)?;

    let mut last_poll = Instant::now();
    while !host.is_terminal() {
        let wait = poll_interval.saturating_sub(last_poll.elapsed());
        match controls.recv_timeout(wait) {
            Ok(request) => {
                let actions = host.handle(HostEvent::ControlReceived(request));
                apply(host, target, reporter, actions)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Control channel closed while service is active");
                target.stop();
                return Err(WrapperError::ControlProtocol(
                    "control channel closed".to_string(),
                ));
            }
        }

        if !host.is_terminal() && last_poll.elapsed() >= poll_interval {
            last_poll = Instant::now();
            if !target.is_alive() {
                let actions = host.handle(HostEvent::LivenessChanged { alive: false });
                apply(host, target, reporter, actions)?;
            }
        }
    }

    let exit_code = host.status().exit_code;
    info!("Service host finished with exit code {}", exit_code);
    Ok(exit_code)
}

/// Best-effort final `Stopped` report after the host loop failed
///
/// Returns the exit code the process should end with.
pub fn report_failure<R>(reporter: &mut R, err: &WrapperError) -> u32
where
    R: StatusReporter + ?Sized,
{
    let code = err.exit_code();
    if let Err(e) = reporter.report(&ServiceStatus::stopped(code)) {
        error!("Failed to report final stop: {}", e);
    }
    code
}

fn apply<T, R>(
    host: &mut ServiceHost,
    target: &mut T,
    reporter: &mut R,
    actions: Vec<HostAction>,
) -> Result<()>
where
    T: Target + ?Sized,
    R: StatusReporter + ?Sized,
{
    let mut queue: VecDeque<HostAction> = actions.into();

    while let Some(action) = queue.pop_front() {
        match action {
            HostAction::Report(status) => {
                if let Err(e) = reporter.report(&status) {
                    target.stop();
                    return Err(e);
                }
            }
            HostAction::StopChild => {
                target.stop();
                queue.extend(host.handle(HostEvent::StopCompleted));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::service::host::{AcceptedControls, ServiceState};
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[derive(Default)]
    struct FakeTarget {
        fail_start: bool,
        alive: Arc<AtomicBool>,
        starts: usize,
        stops: usize,
    }

    impl Target for FakeTarget {
        fn start(&mut self) -> Result<u32> {
            self.starts += 1;
            if self.fail_start {
                return Err(WrapperError::Launch {
                    path: "missing.exe".into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            self.alive.store(true, Ordering::SeqCst);
            Ok(1234)
        }

        fn stop(&mut self) {
            self.stops += 1;
            self.alive.store(false, Ordering::SeqCst);
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct Recorder {
        statuses: Vec<ServiceStatus>,
        fail: bool,
    }

    impl StatusReporter for Recorder {
        fn report(&mut self, status: &ServiceStatus) -> Result<()> {
            if self.fail {
                return Err(WrapperError::ControlProtocol("handle closed".into()));
            }
            self.statuses.push(*status);
            Ok(())
        }
    }

    impl Recorder {
        fn states(&self) -> Vec<ServiceState> {
            self.statuses.iter().map(|s| s.state).collect()
        }
    }

    const POLL: Duration = Duration::from_millis(20);

    #[test]
    fn test_launch_failure_never_runs() {
        let (_tx, rx) = unbounded();
        let mut host = ServiceHost::new("svc");
        let mut target = FakeTarget {
            fail_start: true,
            ..Default::default()
        };
        let mut recorder = Recorder::default();

        let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();

        assert_eq!(code, 2);
        assert_eq!(
            recorder.states(),
            vec![ServiceState::StartPending, ServiceState::Stopped]
        );
    }

    #[test]
    fn test_config_error_exit_code() {
        struct Unconfigured;
        impl Target for Unconfigured {
            fn start(&mut self) -> Result<u32> {
                Err(ConfigError::NotFound {
                    service_id: "svc".into(),
                }
                .into())
            }
            fn stop(&mut self) {}
            fn is_alive(&self) -> bool {
                false
            }
        }

        let (_tx, rx) = unbounded();
        let mut recorder = Recorder::default();
        let code = run_service_host(
            &mut ServiceHost::new("svc"),
            &mut Unconfigured,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_stop_control() {
        let (tx, rx) = unbounded();
        tx.send(ControlRequest::Stop).unwrap();

        let mut host = ServiceHost::new("svc");
        let mut target = FakeTarget::default();
        let mut recorder = Recorder::default();

        let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();

        assert_eq!(code, 0);
        assert_eq!(target.stops, 1);
        assert_eq!(
            recorder.states(),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::StopPending,
                ServiceState::Stopped,
            ]
        );
    }

    #[test]
    fn test_self_exit_detected_within_poll_interval() {
        let (_tx, rx) = unbounded();
        let alive = Arc::new(AtomicBool::new(false));
        let mut target = FakeTarget {
            alive: alive.clone(),
            ..Default::default()
        };

        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            alive.store(false, Ordering::SeqCst);
            Instant::now()
        });

        let mut recorder = Recorder::default();
        let code = run_service_host(
            &mut ServiceHost::new("svc"),
            &mut target,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap();
        let finished = Instant::now();
        let exited = killer.join().unwrap();

        assert_eq!(code, 0);
        assert_eq!(target.stops, 0);
        assert!(finished.duration_since(exited) < POLL * 10);
        assert_eq!(
            recorder.states(),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::Stopped
            ]
        );
    }

    #[test]
    fn test_interrogate_repeats_running_status() {
        let (tx, rx) = unbounded();
        tx.send(ControlRequest::Interrogate).unwrap();
        tx.send(ControlRequest::Other("Pause".into())).unwrap();
        tx.send(ControlRequest::Stop).unwrap();

        let mut target = FakeTarget::default();
        let mut recorder = Recorder::default();
        run_service_host(
            &mut ServiceHost::new("svc"),
            &mut target,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap();

        let running = recorder.statuses[1];
        assert_eq!(running.state, ServiceState::Running);
        assert_eq!(recorder.statuses[2], running);
        assert_eq!(
            running.controls_accepted,
            AcceptedControls::STOP | AcceptedControls::SHUTDOWN
        );
        assert_eq!(recorder.statuses.len(), 5);
    }

    #[test]
    fn test_closed_channel_is_protocol_error() {
        let (tx, rx) = unbounded::<ControlRequest>();
        drop(tx);

        let mut target = FakeTarget::default();
        let mut recorder = Recorder::default();
        let err = run_service_host(
            &mut ServiceHost::new("svc"),
            &mut target,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap_err();

        assert!(matches!(err, WrapperError::ControlProtocol(_)));
        assert_eq!(target.stops, 1);
    }

    #[test]
    fn test_report_failure_stops_target() {
        let (_tx, rx) = unbounded();
        let mut target = FakeTarget::default();
        let mut recorder = Recorder {
            fail: true,
            ..Default::default()
        };

        let err = run_service_host(
            &mut ServiceHost::new("svc"),
            &mut target,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap_err();

        assert!(matches!(err, WrapperError::ControlProtocol(_)));
        assert_eq!(target.starts, 0);
    }

    #[test]
    fn test_failure_reported_as_stopped() {
        let (tx, rx) = unbounded::<ControlRequest>();
        drop(tx);

        let mut target = FakeTarget::default();
        let mut recorder = Recorder::default();
        let err = run_service_host(
            &mut ServiceHost::new("svc"),
            &mut target,
            &rx,
            &mut recorder,
            POLL,
        )
        .unwrap_err();

        let code = report_failure(&mut recorder, &err);
        assert_eq!(code, 3);
        let last = recorder.statuses.last().unwrap();
        assert_eq!(last.state, ServiceState::Stopped);
        assert_eq!(last.exit_code, 3);

        let mut broken = Recorder {
            fail: true,
            ..Default::default()
        };
        assert_eq!(report_failure(&mut broken, &err), 3);
    }
}
