/// Single supervised run: fork the command, wait for its termination,
/// report exit status / fatal signal / wall-clock time.
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use serde::Serialize;

use crate::child::{self, LaunchPlan};

/// Parameters for one monitored run, fixed for its duration.
#[derive(Debug, Clone)]
pub struct MonitorParams {
    /// File bound to the child's stdin; `None` inherits the parent's.
    pub input: Option<PathBuf>,
    /// File receiving the child's stdout (truncate-create).
    pub output: PathBuf,
    /// File receiving the child's stderr (truncate-create).
    pub error: PathBuf,
    /// Largest file the child may write, in bytes. 0 = unlimited.
    pub file_size_limit: u64,
    /// Address-space ceiling for the child, in bytes. 0 = unlimited.
    pub memory_limit: u64,
    /// Whitespace-delimited program name and arguments.
    pub command: String,
}

impl Default for MonitorParams {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from("monitored.out"),
            error: PathBuf::from("monitored.err"),
            file_size_limit: 0,
            memory_limit: 0,
            command: String::new(),
        }
    }
}

/// Outcome of one completed run.
///
/// Exactly one of `exit_status`/`signal` is set per run; both stay at the
/// `-1` sentinel if the wait loop ran out of children before observing the
/// tracked child's terminal event.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorOutcome {
    /// Exit code (low byte) if the child exited normally, else -1.
    pub exit_status: i32,
    /// Terminating signal number if the child was killed, else -1.
    pub signal: i32,
    /// Whether the terminating signal produced a coredump.
    pub core_dumped: bool,
    /// Wall-clock seconds between fork and the terminal wait event, else -1.
    pub elapsed_seconds: f64,
}

impl MonitorOutcome {
    fn new() -> Self {
        Self {
            exit_status: -1,
            signal: -1,
            core_dumped: false,
            elapsed_seconds: -1.0,
        }
    }
}

/// Errors a run can surface to the caller. Setup failures inside the child
/// are not represented here: the child reports them as an exit status of
/// `child::SETUP_FAILURE_CODE`.
#[derive(Debug)]
pub enum MonitorError {
    /// No command (or a blank one) was supplied.
    MissingCommand,
    /// The command string exceeds `child::COMMAND_MAX` bytes.
    CommandTooLong { length: usize },
    /// A parameter contains an interior NUL byte.
    NulByte { field: &'static str },
    /// Child process creation failed.
    Spawn { source: Errno },
    /// Waiting on the child failed for a reason other than "no children".
    Wait { source: Errno },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::MissingCommand => write!(f, "no command given"),
            MonitorError::CommandTooLong { length } => {
                write!(
                    f,
                    "command is {length} bytes, over the {} byte maximum",
                    child::COMMAND_MAX
                )
            }
            MonitorError::NulByte { field } => {
                write!(f, "{field} contains an interior NUL byte")
            }
            MonitorError::Spawn { source } => {
                write!(f, "failed to create child process: {source}")
            }
            MonitorError::Wait { source } => {
                write!(f, "failed waiting for child process: {source}")
            }
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Spawn { source } | MonitorError::Wait { source } => Some(source),
            _ => None,
        }
    }
}

/// Run one command under supervision and return its outcome.
///
/// Validates parameters, forks, lets the child transform itself via
/// `child::launch`, and waits in the parent until the child's terminal
/// state is observed.
pub fn run(params: &MonitorParams) -> Result<MonitorOutcome, MonitorError> {
    let plan = LaunchPlan::new(params)?;
    let mut outcome = MonitorOutcome::new();

    tracing::info!(command = %params.command, "launching monitored command");
    let child = spawn_child(|| child::launch(&plan))?;
    tracing::debug!(pid = child.as_raw(), "child process started");

    let start = Instant::now();
    await_termination(child, start, &mut outcome)?;

    tracing::info!(
        exit_status = outcome.exit_status,
        signal = outcome.signal,
        elapsed_seconds = outcome.elapsed_seconds,
        "monitored command finished"
    );
    Ok(outcome)
}

/// Fork, running `child_body` on the child side.
///
/// The body is guaranteed never to return; its only way out is process
/// termination (exec or `_exit`). The parent gets the child's pid.
fn spawn_child<F>(child_body: F) -> Result<Pid, MonitorError>
where
    F: FnOnce() -> Infallible,
{
    // SAFETY: the child body performs only fork-safe work: every
    // allocation it needs happened when the LaunchPlan was built, and it
    // ends in exec or _exit on all paths.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => match child_body() {},
        Err(source) => Err(MonitorError::Spawn { source }),
    }
}

/// Terminal state extracted from a wait event, if it is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Exited(i32),
    Signaled { signal: i32, core_dumped: bool },
}

/// Map a wait event to a terminal state. Stop/continue events and every
/// other non-terminal notification map to `None`.
fn classify(status: &WaitStatus) -> Option<Termination> {
    match status {
        WaitStatus::Exited(_, code) => Some(Termination::Exited(*code)),
        WaitStatus::Signaled(_, signal, core_dumped) => Some(Termination::Signaled {
            signal: *signal as i32,
            core_dumped: *core_dumped,
        }),
        _ => None,
    }
}

/// Wait until the tracked child terminates, recording the outcome.
///
/// Waits for any descendant: the command may have spawned further
/// processes, and their events must be consumed without ending the run.
/// `ECHILD` means no children remain; the loop ends with whatever the
/// outcome holds. Any other wait error is fatal for the run.
fn await_termination(
    child: Pid,
    start: Instant,
    outcome: &mut MonitorOutcome,
) -> Result<(), MonitorError> {
    loop {
        let status = match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL)) {
            Ok(status) => status,
            Err(Errno::ECHILD) => return Ok(()),
            Err(source) => return Err(MonitorError::Wait { source }),
        };
        if status.pid() != Some(child) {
            tracing::debug!(?status, "ignoring wait event for untracked process");
            continue;
        }
        match classify(&status) {
            Some(Termination::Exited(code)) => {
                outcome.elapsed_seconds = start.elapsed().as_secs_f64();
                outcome.exit_status = code;
                return Ok(());
            }
            Some(Termination::Signaled {
                signal,
                core_dumped,
            }) => {
                outcome.elapsed_seconds = start.elapsed().as_secs_f64();
                outcome.signal = signal;
                outcome.core_dumped = core_dumped;
                return Ok(());
            }
            None => {
                tracing::debug!(?status, "ignoring non-terminal wait event");
            }
        }
    }
}
