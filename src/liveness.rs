//! Liveness gating for the run loop.
//!
//! The agent keeps running only while its supervisor and the master process
//! are alive and no terminating signal has been latched. Signals are recorded
//! by a listener task with a single atomic store; the monitor only reads the
//! latched value at sleep ticks.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const NO_SIGNAL: i32 = 0;

/// Why the agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The master process is gone
    MasterGone(u32),

    /// The supervising parent process is gone
    SupervisorGone(u32),

    /// A terminating signal was latched
    Signal(i32),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::MasterGone(pid) => write!(f, "master process {} exited", pid),
            StopReason::SupervisorGone(pid) => write!(f, "supervisor process {} exited", pid),
            StopReason::Signal(signo) => match Signal::try_from(*signo) {
                Ok(sig) => write!(f, "received {}", sig.as_str()),
                Err(_) => write!(f, "received signal {}", signo),
            },
        }
    }
}

/// Process-wide record of the last signal delivered to the agent.
///
/// Cloning shares the same slot. Once a terminating signal is latched it is
/// never overwritten by a later non-terminating one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    latched: Arc<AtomicI32>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signo`. Safe to call from the signal listener.
    pub fn latch(&self, signo: i32) {
        let _ = self
            .latched
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if is_terminating(current) {
                    None
                } else {
                    Some(signo)
                }
            });
    }

    /// The last signal number recorded, if any.
    pub fn latched(&self) -> Option<i32> {
        match self.latched.load(Ordering::SeqCst) {
            NO_SIGNAL => None,
            signo => Some(signo),
        }
    }

    /// The latched signal if it asks the agent to stop.
    pub fn terminating(&self) -> Option<i32> {
        self.latched().filter(|signo| is_terminating(*signo))
    }
}

fn is_terminating(signo: i32) -> bool {
    signo == Signal::SIGTERM as i32 || signo == Signal::SIGINT as i32
}

/// Spawn the task that latches SIGTERM, SIGINT and SIGHUP into `shutdown`.
///
/// # Errors
///
/// Returns the I/O error if a signal handler cannot be registered.
pub fn spawn_signal_listener(shutdown: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let signo = tokio::select! {
                Some(()) = sigterm.recv() => Signal::SIGTERM,
                Some(()) = sigint.recv() => Signal::SIGINT,
                Some(()) = sighup.recv() => Signal::SIGHUP,
                else => break,
            };
            shutdown.latch(signo as i32);
            debug!(signal = signo.as_str(), "Signal latched");
        }
    }))
}

/// Answers whether a process id is still running.
pub trait ProcessTable {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Process table backed by `kill(pid, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixProcessTable;

impl ProcessTable for NixProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        is_process_alive(pid)
    }
}

/// Check whether `pid` exists by sending it the null signal.
///
/// `EPERM` means the process exists but belongs to someone else, so it
/// counts as alive. PIDs that do not fit in `pid_t` are treated as dead.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Result of one liveness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Continue,
    Stop(StopReason),
}

/// Decides whether the agent should keep running.
///
/// Both ancestor PIDs are captured once at startup and never change.
pub struct LivenessMonitor<P> {
    master_pid: Option<u32>,
    supervisor_pid: u32,
    shutdown: ShutdownSignal,
    processes: P,
}

impl<P: ProcessTable> LivenessMonitor<P> {
    /// Create a monitor. With no `master_pid` only the supervisor and
    /// signals are checked.
    pub fn new(
        master_pid: Option<u32>,
        supervisor_pid: u32,
        shutdown: ShutdownSignal,
        processes: P,
    ) -> Self {
        info!(
            master_pid = ?master_pid,
            supervisor_pid = supervisor_pid,
            "Liveness monitor armed"
        );
        Self {
            master_pid,
            supervisor_pid,
            shutdown,
            processes,
        }
    }

    pub fn check(&self) -> Liveness {
        if let Some(master) = self.master_pid {
            if !self.processes.is_alive(master) {
                return Liveness::Stop(StopReason::MasterGone(master));
            }
        }
        if !self.processes.is_alive(self.supervisor_pid) {
            return Liveness::Stop(StopReason::SupervisorGone(self.supervisor_pid));
        }
        if let Some(signo) = self.shutdown.terminating() {
            return Liveness::Stop(StopReason::Signal(signo));
        }
        Liveness::Continue
    }

    pub fn should_continue(&self) -> bool {
        self.check() == Liveness::Continue
    }
}
