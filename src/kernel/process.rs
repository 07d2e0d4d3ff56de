//! fork/pipe/wait plumbing shared by the feature runner and escape probes.

use crate::config::types::{HarnessError, Result};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, fork, pipe, ForkResult, Pid};
use std::io::Write;
use std::os::unix::io::RawFd;

pub(crate) fn to_process_error(prefix: &str, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Process(format!("{prefix}: {err}"))
}

/// Flush Rust's buffered standard streams.
///
/// Must run before fork(): a child would otherwise inherit, and later emit,
/// a copy of whatever the parent still had buffered.
pub fn flush_std_streams() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

/// Unidirectional pipe, returned as (read end, write end).
pub fn open_pipe(what: &str) -> Result<(RawFd, RawFd)> {
    pipe().map_err(|e| to_process_error(&format!("pipe({what})"), e))
}

/// Close a descriptor, ignoring errors; used on already-failing paths.
pub fn close_quietly(fd: RawFd) {
    let _ = close(fd);
}

/// Flush, then fork.
pub fn fork_process(what: &str) -> Result<ForkResult> {
    flush_std_streams();
    // SAFETY: the harness is single threaded while features run; children
    // only run the feature body and then leave through exit_child().
    unsafe { fork() }.map_err(|e| to_process_error(&format!("fork({what})"), e))
}

/// Blocking wait for `pid`, retrying on EINTR. No timeout.
pub fn wait_for_exit(pid: Pid, what: &str) -> Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => return Ok(status),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(to_process_error(&format!("waitpid({what})"), e)),
        }
    }
}

/// Leave a forked child without ever returning into the parent's stack.
pub fn exit_child(code: i32) -> ! {
    flush_std_streams();
    std::process::exit(code)
}
