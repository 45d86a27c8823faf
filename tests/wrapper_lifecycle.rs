#![cfg(unix)]

use crossbeam_channel::unbounded;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use svcwrap::config::FileStore;
use svcwrap::logs::{latest_log_path, read_latest_log, service_logs};
use svcwrap::service::{
    run_service_host, ControlRequest, ManagedTarget, ServiceHost, ServiceState, ServiceStatus,
    StatusReporter,
};

const POLL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Recorder(Vec<ServiceStatus>);

impl StatusReporter for Recorder {
    fn report(&mut self, status: &ServiceStatus) -> svcwrap::Result<()> {
        self.0.push(*status);
        Ok(())
    }
}

impl Recorder {
    fn states(&self) -> Vec<ServiceState> {
        self.0.iter().map(|s| s.state).collect()
    }
}

fn write_record(root: &Path, id: &str, record: &str) -> FileStore {
    let store = FileStore::new(root);
    let path = store.record_path(id);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, record).unwrap();
    store
}

#[test]
fn test_self_exiting_child_stops_service() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_record(dir.path(), "oneshot", "ExePath = \"/bin/echo\"\nArgs = \"hello world\"\n");
    let logs = dir.path().join("logs");

    let (_tx, rx) = unbounded();
    let mut host = ServiceHost::new("oneshot");
    let mut target = ManagedTarget::new("oneshot", Box::new(store), &logs, None);
    let mut recorder = Recorder::default();

    let started = Instant::now();
    let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();

    assert_eq!(code, 0);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        recorder.states(),
        vec![
            ServiceState::StartPending,
            ServiceState::Running,
            ServiceState::Stopped
        ]
    );

    drop(target);
    let log = read_latest_log(&logs, "oneshot").unwrap();
    assert!(log.contains("Service=oneshot\n"));
    assert!(log.contains("hello world\n"));
}

#[test]
fn test_stop_control_terminates_child() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_record(dir.path(), "sleeper", "ExePath = \"/bin/sleep\"\nArgs = \"30\"\n");
    let logs = dir.path().join("logs");

    let (tx, rx) = unbounded();
    let sender = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        tx.send(ControlRequest::Interrogate).unwrap();
        tx.send(ControlRequest::Stop).unwrap();
        tx
    });

    let mut host = ServiceHost::new("sleeper");
    let mut target = ManagedTarget::new("sleeper", Box::new(store), &logs, None);
    let mut recorder = Recorder::default();

    let started = Instant::now();
    let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();
    let _tx = sender.join().unwrap();

    assert_eq!(code, 0);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        recorder.states(),
        vec![
            ServiceState::StartPending,
            ServiceState::Running,
            ServiceState::Running,
            ServiceState::StopPending,
            ServiceState::Stopped,
        ]
    );
    assert_eq!(recorder.0[1], recorder.0[2]);
}

#[test]
fn test_stop_racing_exit_reports_one_stop() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_record(dir.path(), "racer", "ExePath = \"/bin/sleep\"\nArgs = \"0.2\"\n");
    let logs = dir.path().join("logs");

    let (tx, rx) = unbounded();
    let sender = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        tx.send(ControlRequest::Stop).unwrap();
        tx
    });

    let mut host = ServiceHost::new("racer");
    let mut target = ManagedTarget::new("racer", Box::new(store), &logs, None);
    let mut recorder = Recorder::default();

    run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();
    let _tx = sender.join().unwrap();
    drop(target);

    let stopped = recorder
        .states()
        .into_iter()
        .filter(|s| *s == ServiceState::Stopped)
        .count();
    assert_eq!(stopped, 1);

    assert_eq!(service_logs(&logs, "racer").unwrap().len(), 1);
    let log = fs::read_to_string(latest_log_path(&logs, "racer").unwrap()).unwrap();
    assert_eq!(log.matches("=== Service log start ===").count(), 1);
}

#[test]
fn test_missing_executable_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_record(dir.path(), "broken", "ExePath = \"/no/such/worker\"\n");

    let (_tx, rx) = unbounded();
    let mut host = ServiceHost::new("broken");
    let mut target = ManagedTarget::new("broken", Box::new(store), dir.path().join("logs"), None);
    let mut recorder = Recorder::default();

    let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();

    assert_ne!(code, 0);
    assert_eq!(
        recorder.states(),
        vec![ServiceState::StartPending, ServiceState::Stopped]
    );
}

#[test]
fn test_missing_record_never_runs() {
    let dir = tempfile::tempdir().unwrap();

    let (_tx, rx) = unbounded();
    let mut host = ServiceHost::new("ghost");
    let mut target = ManagedTarget::new(
        "ghost",
        Box::new(FileStore::new(dir.path())),
        dir.path().join("logs"),
        None,
    );
    let mut recorder = Recorder::default();

    let code = run_service_host(&mut host, &mut target, &rx, &mut recorder, POLL).unwrap();

    assert_eq!(code, 1);
    assert!(!recorder.states().contains(&ServiceState::Running));
    assert!(service_logs(&dir.path().join("logs"), "ghost").is_err());
}
