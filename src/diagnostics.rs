//! Unrecoverable-fault reporting
//! A termination hook, the never-returning `abort!` primitive with a short stack dump,
//! and the fatal path used when the harness itself breaks.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::sync::Mutex;

/// Called right before the process goes down through [`abort_with`] or [`fatal`].
pub type TerminationHook = fn();

static TERMINATION_HOOK: Mutex<Option<TerminationHook>> = Mutex::new(None);

/// Frames shown by the stack dump.
const TRACEBACK_DEPTH: usize = 8;

/// Install `hook` (or clear it with `None`), returning the previous one.
pub fn register_termination_hook(hook: Option<TerminationHook>) -> Option<TerminationHook> {
    let mut slot = TERMINATION_HOOK.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::replace(&mut *slot, hook)
}

fn run_termination_hook() {
    let hook = *TERMINATION_HOOK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(hook) = hook {
        hook();
    }
}

/// Abort the process with a formatted cause.
///
/// Writes to stderr a traceback of at most eight frames (stopping at `main`),
/// the caller's location, the last OS error if one is set, and the cause. Then
/// runs the termination hook and raises SIGABRT.
#[macro_export]
macro_rules! abort {
    ($($arg:tt)+) => {
        $crate::diagnostics::abort_with(::std::format_args!($($arg)+))
    };
}

/// Function form of [`abort!`].
#[track_caller]
#[cold]
pub fn abort_with(cause: fmt::Arguments<'_>) -> ! {
    let os_error = io::Error::last_os_error();
    let location = Location::caller();

    let stderr = io::stderr();
    let mut err = stderr.lock();
    let _ = writeln!(err);
    let _ = write_traceback(&mut err);
    let _ = writeln!(err, "   At: '{}'", location);
    if let Some(code) = os_error.raw_os_error().filter(|code| *code != 0) {
        let _ = writeln!(err, "Error: ({}) {}", code, os_error);
    }
    let _ = writeln!(err, "Cause: {}", cause);
    let _ = err.flush();
    drop(err);

    run_termination_hook();
    std::process::abort()
}

/// Harness fault that cannot be reported any other way: print, run the
/// termination hook, exit with status 1.
pub fn fatal(error: &dyn fmt::Display) -> ! {
    log::error!("Fatal harness error: {}", error);
    let _ = writeln!(io::stderr(), "traitbox: {}", error);
    run_termination_hook();
    crate::kernel::process::exit_child(crate::config::types::RUN_FAILURE_CODE)
}

/// Function names of the current stack, innermost first, without the frames
/// of the capture machinery and of this module.
fn caller_frames() -> Vec<String> {
    let backtrace = Backtrace::force_capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }

    let rendered = backtrace.to_string();
    let names = rendered.lines().filter_map(|line| {
        let (index, name) = line.trim_start().split_once(": ")?;
        index
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| name.trim().to_string())
    });

    names
        .skip_while(|name| !name.contains("diagnostics::"))
        .skip_while(|name| name.contains("diagnostics::"))
        .collect()
}

fn is_main(name: &str) -> bool {
    name == "main" || name.ends_with("::main")
}

/// Take up to [`TRACEBACK_DEPTH`] frames, stopping after the first `main`.
fn bounded_frames(frames: Vec<String>) -> Vec<String> {
    let mut kept = Vec::new();
    for name in frames.into_iter().take(TRACEBACK_DEPTH) {
        let reached_main = is_main(&name);
        kept.push(name);
        if reached_main {
            break;
        }
    }
    kept
}

fn write_traceback<W: Write>(out: &mut W) -> io::Result<()> {
    render_traceback(out, &bounded_frames(caller_frames()))
}

/// Outermost frame first, current function last.
fn render_traceback<W: Write>(out: &mut W, frames: &[String]) -> io::Result<()> {
    let Some((current, callers)) = frames.split_first() else {
        return Ok(());
    };

    writeln!(out, "Traceback (most recent call last):")?;
    if !frames.last().map_or(false, |name| is_main(name)) {
        writeln!(out, "  [ ]: (...)")?;
    }
    for (i, name) in callers.iter().rev().enumerate() {
        writeln!(out, "  [{}]: ({})", i, name)?;
    }
    writeln!(out, "  ->-: ({}) current function", current)?;
    writeln!(out)
}
