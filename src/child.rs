/// Child-side launch: resource limits, stream redirection, exec.
///
/// Everything here runs between `fork` and `execvp`, where only plain
/// syscalls are safe. All allocation (argument vector, path conversion)
/// happens in the parent when the `LaunchPlan` is built; the child only
/// consumes it.
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::libc;
use nix::sys::resource::{setrlimit, Resource};
use nix::unistd::execvp;

use crate::monitor::{MonitorError, MonitorParams};

/// Exit code a child uses to signal that setup (limits, redirection, exec)
/// failed before the target command ran. The parent observes it as an
/// ordinary exit status.
pub const SETUP_FAILURE_CODE: i32 = 255;

/// Longest accepted command string, in bytes. Anything longer is rejected
/// with `MonitorError::CommandTooLong` before a child is created.
pub const COMMAND_MAX: usize = 2000;

/// Everything the child needs, prepared and validated in the parent.
pub struct LaunchPlan {
    argv: Vec<CString>,
    input: Option<CString>,
    output: CString,
    error: CString,
    file_size_limit: u64,
    memory_limit: u64,
}

impl LaunchPlan {
    /// Validate the parameters and build the launch plan.
    ///
    /// Rejects blank and overlong commands here, in the parent, so no
    /// process is ever created for them.
    pub fn new(params: &MonitorParams) -> Result<Self, MonitorError> {
        if params.command.trim().is_empty() {
            return Err(MonitorError::MissingCommand);
        }
        if params.command.len() > COMMAND_MAX {
            return Err(MonitorError::CommandTooLong {
                length: params.command.len(),
            });
        }

        Ok(Self {
            argv: split_command(&params.command)?,
            input: params
                .input
                .as_deref()
                .map(|p| path_to_cstring(p, "input path"))
                .transpose()?,
            output: path_to_cstring(&params.output, "output path")?,
            error: path_to_cstring(&params.error, "error path")?,
            file_size_limit: params.file_size_limit,
            memory_limit: params.memory_limit,
        })
    }
}

/// Split a command string on whitespace into an owned argument vector.
///
/// The first token is the executable name, the rest are positional
/// arguments. No quoting or escaping: embedded whitespace cannot be part
/// of a single argument.
fn split_command(command: &str) -> Result<Vec<CString>, MonitorError> {
    command
        .split_whitespace()
        .map(|token| {
            CString::new(token).map_err(|_| MonitorError::NulByte { field: "command" })
        })
        .collect()
}

fn path_to_cstring(path: &Path, field: &'static str) -> Result<CString, MonitorError> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| MonitorError::NulByte { field })
}

/// Transform the current process into the planned command.
///
/// Never returns: either `execvp` replaces the process image, or the
/// process exits with `SETUP_FAILURE_CODE` after writing a diagnostic to
/// whatever stderr currently points at.
pub fn launch(plan: &LaunchPlan) -> Infallible {
    if let Err(err) = apply_limits(plan) {
        fail("failed to set process limits", err);
    }
    if let Err(err) = redirect_streams(plan) {
        fail("failed to initialize streams", err);
    }
    match execvp(&plan.argv[0], &plan.argv) {
        Ok(never) => match never {},
        Err(err) => fail("exec failed", err),
    }
}

/// Apply file-size and address-space ceilings, soft = hard. A zero limit
/// means unlimited and is skipped.
fn apply_limits(plan: &LaunchPlan) -> Result<(), Errno> {
    if plan.file_size_limit > 0 {
        setrlimit(
            Resource::RLIMIT_FSIZE,
            plan.file_size_limit,
            plan.file_size_limit,
        )?;
    }
    if plan.memory_limit > 0 {
        setrlimit(Resource::RLIMIT_AS, plan.memory_limit, plan.memory_limit)?;
    }
    Ok(())
}

/// Bind stdin/stdout/stderr to the configured files.
///
/// stderr is rebound last so diagnostics for earlier failures still reach
/// the inherited stream.
fn redirect_streams(plan: &LaunchPlan) -> Result<(), Errno> {
    if let Some(input) = &plan.input {
        bind_stream(input, libc::O_RDONLY, libc::STDIN_FILENO)?;
    }
    let write_flags = libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC;
    bind_stream(&plan.output, write_flags, libc::STDOUT_FILENO)?;
    bind_stream(&plan.error, write_flags, libc::STDERR_FILENO)?;
    Ok(())
}

fn bind_stream(path: &CStr, flags: libc::c_int, target: libc::c_int) -> Result<(), Errno> {
    // SAFETY: plain syscalls on a path whose CString was built before the
    // fork; no Rust I/O state is touched.
    let fd = unsafe { libc::open(path.as_ptr(), flags, 0o644 as libc::c_uint) };
    if fd < 0 {
        return Err(Errno::last());
    }
    if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(Errno::last());
    }
    if fd > libc::STDERR_FILENO {
        unsafe { libc::close(fd) };
    }
    Ok(())
}

/// Write a diagnostic and terminate the child.
///
/// Bypasses Rust's locked/buffered stderr: between fork and exec only the
/// raw descriptor is safe to touch, and `_exit` skips the atexit handlers
/// and stdio flushing inherited from the parent.
fn fail(message: &str, err: Errno) -> ! {
    let line = format!("overseer: {message}: {err}\n");
    unsafe {
        libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), line.len());
        libc::_exit(SETUP_FAILURE_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params_for(command: &str) -> MonitorParams {
        MonitorParams {
            command: command.to_string(),
            ..MonitorParams::default()
        }
    }

    #[test]
    fn test_split_command_tokens() {
        let argv = split_command("/bin/echo hello world").unwrap();
        let tokens: Vec<&str> = argv.iter().map(|c| c.to_str().unwrap()).collect();
        assert_eq!(tokens, vec!["/bin/echo", "hello", "world"]);
    }

    #[test]
    fn test_split_command_collapses_whitespace() {
        let argv = split_command("  echo\t\thi   there ").unwrap();
        let tokens: Vec<&str> = argv.iter().map(|c| c.to_str().unwrap()).collect();
        assert_eq!(tokens, vec!["echo", "hi", "there"]);
    }

    #[test]
    fn test_plan_rejects_blank_command() {
        assert!(matches!(
            LaunchPlan::new(&params_for("")),
            Err(MonitorError::MissingCommand)
        ));
        assert!(matches!(
            LaunchPlan::new(&params_for("   \t ")),
            Err(MonitorError::MissingCommand)
        ));
    }

    #[test]
    fn test_plan_rejects_overlong_command() {
        let command = "x".repeat(COMMAND_MAX + 1);
        let err = LaunchPlan::new(&params_for(&command)).map(|_| ()).unwrap_err();
        match err {
            MonitorError::CommandTooLong { length } => assert_eq!(length, COMMAND_MAX + 1),
            other => panic!("expected CommandTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_accepts_command_at_limit() {
        let command = "y".repeat(COMMAND_MAX);
        assert!(LaunchPlan::new(&params_for(&command)).is_ok());
    }

    #[test]
    fn test_plan_rejects_nul_in_path() {
        let mut params = params_for("echo hi");
        params.output = PathBuf::from("out\0file");
        assert!(matches!(
            LaunchPlan::new(&params),
            Err(MonitorError::NulByte { field: "output path" })
        ));
    }

    #[test]
    fn test_plan_carries_limits_and_argv() {
        let mut params = params_for("sleep 1");
        params.file_size_limit = 4096;
        params.memory_limit = 1 << 20;
        let plan = LaunchPlan::new(&params).unwrap();
        assert_eq!(plan.argv.len(), 2);
        assert_eq!(plan.file_size_limit, 4096);
        assert_eq!(plan.memory_limit, 1 << 20);
        assert!(plan.input.is_none());
    }
}
