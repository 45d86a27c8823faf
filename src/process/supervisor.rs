//! Ownership and monitoring of the supervised child process

use crate::config::ServiceConfig;
use crate::error::{Result, WrapperError};
use crate::logs::LogSink;
use crate::process::command::build_command;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the monitor checks the child for exit
const MONITOR_POLL: Duration = Duration::from_millis(50);

/// State shared between the supervisor and its monitor thread
///
/// Only the monitor reaps the child and clears `alive`.
struct Shared {
    child: Mutex<Option<Child>>,
    alive: AtomicBool,
    exit: Mutex<Option<ExitStatus>>,
}

/// Owns at most one live child process
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    pid: Option<u32>,
    monitor: Option<JoinHandle<()>>,
    exit_signal: Option<Receiver<()>>,
    sink: Option<LogSink>,
    stop_timeout: Option<Duration>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Create a supervisor that waits indefinitely for a killed child
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                child: Mutex::new(None),
                alive: AtomicBool::new(false),
                exit: Mutex::new(None),
            }),
            pid: None,
            monitor: None,
            exit_signal: None,
            sink: None,
            stop_timeout: None,
        }
    }

    /// Bound the wait for a killed child to be reaped
    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Spawn the configured target with its output written to `sink`
    ///
    /// Returns the child's process id.
    pub fn start(&mut self, config: &ServiceConfig, mut sink: LogSink) -> Result<u32> {
        if self.monitor.is_some() {
            return Err(WrapperError::Launch {
                path: config.exe_path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "supervisor already owns a process",
                ),
            });
        }

        let mut child = match build_command(config, &sink).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to launch {:?}: {}", config.exe_path, e);
                sink.note(&format!("=== Launch failed: {} ===", e));
                sink.close();
                return Err(WrapperError::Launch {
                    path: config.exe_path.clone(),
                    source: e,
                });
            }
        };
        let pid = child.id();

        let (exit_tx, exit_rx) = bounded::<()>(0);
        let shared = self.shared.clone();
        *shared.exit.lock() = None;
        shared.alive.store(true, Ordering::SeqCst);

        let monitor = thread::Builder::new()
            .name(format!("monitor-{}", pid))
            .spawn(move || monitor_thread(shared, exit_tx));

        let monitor = match monitor {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start monitor thread: {}", e);
                let _ = child.kill();
                let _ = child.wait();
                self.shared.alive.store(false, Ordering::SeqCst);
                sink.note(&format!("=== Launch failed: {} ===", e));
                sink.close();
                return Err(WrapperError::Launch {
                    path: config.exe_path.clone(),
                    source: e,
                });
            }
        };
        // Monitor spins on an empty slot until the child is placed
        *self.shared.child.lock() = Some(child);

        info!(
            "Target process started: {:?}, PID: {}, log: {:?}",
            config.exe_path,
            pid,
            sink.path()
        );

        self.pid = Some(pid);
        self.monitor = Some(monitor);
        self.exit_signal = Some(exit_rx);
        self.sink = Some(sink);
        Ok(pid)
    }

    /// Terminate the child and wait for it to be reaped
    ///
    /// Calling this on a supervisor whose child already exited, or calling it
    /// twice, is a no-op apart from releasing resources.
    pub fn stop(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };

        if self.is_alive() {
            info!("Stopping target process, PID: {:?}", self.pid);
            if let Some(child) = self.shared.child.lock().as_mut() {
                // Fails harmlessly if the child exited since the check
                if let Err(e) = child.kill() {
                    debug!("Kill returned: {}", e);
                }
            }
        }

        let reaped = match (self.exit_signal.take(), self.stop_timeout) {
            (Some(signal), Some(limit)) => match signal.recv_timeout(limit) {
                Err(RecvTimeoutError::Timeout) => false,
                _ => true,
            },
            (Some(signal), None) => {
                let _ = signal.recv();
                true
            }
            (None, _) => true,
        };

        if reaped {
            let _ = monitor.join();
            info!("Target process stopped");
        } else {
            warn!(
                "Target process {:?} was not reaped within {:?}, abandoning it",
                self.pid, self.stop_timeout
            );
        }

        self.close_sink();
    }

    /// Whether the child is still running
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Exit status recorded by the monitor
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.shared.exit.lock()
    }

    /// Process id of the current or last child
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Channel that disconnects once the child has exited
    pub fn exit_signal(&self) -> Option<Receiver<()>> {
        self.exit_signal.clone()
    }

    /// Path of the log file receiving the child's output
    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.sink.as_ref().and_then(|s| s.path())
    }

    fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Some(status) = self.exit_status() {
                sink.note(&format!("\n=== Process exited: {} ===", status));
            }
            sink.close();
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Monitor thread function
///
/// Holds the child lock only for each `try_wait`, so `stop` can kill in
/// between polls.
fn monitor_thread(shared: Arc<Shared>, exit_tx: Sender<()>) {
    loop {
        {
            let mut slot = shared.child.lock();
            if let Some(child) = slot.as_mut() {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        // Reported as a clean stop either way; the real code is only logged
                        if status.success() {
                            info!("Target process exited: {}", status);
                        } else {
                            warn!("Target process exited with {}", status);
                        }
                        *shared.exit.lock() = Some(status);
                        slot.take();
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Failed to query target process: {}", e);
                        release_unknown(child);
                        slot.take();
                        break;
                    }
                }
            }
        }
        thread::sleep(MONITOR_POLL);
    }

    shared.alive.store(false, Ordering::SeqCst);
    // Disconnecting wakes every receiver of the exit signal
    drop(exit_tx);
}

/// Kill and reap a child whose state can no longer be queried
fn release_unknown(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Kill returned: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap target process {}: {}", child.id(), e);
    }
}
