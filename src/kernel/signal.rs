//! Signal escape scopes
//!
//! A scope intercepts one signal while a block runs and resumes the caller right after the
//! block, counting interceptions, so a feature can assert "this aborts" and keep going.
//!
//! The block runs in a probe process forked from the feature process. The probe installs an
//! async-safe handler for the wrapped signal; on delivery the handler bumps a counter in
//! shared memory and ends the probe, which hands control back to the feature process at the
//! point just after the block. The feature process never changes its own disposition, so the
//! previous disposition is in force again as soon as the scope is left, whichever way.
//!
//! Writes the block makes stay in the probe. Blocks are therefore `Send + 'static`: they
//! cannot borrow the caller's state, only own what they are given.
//!
//! POSIX process model only.

use crate::config::types::{Result, FEATURE_PANIC_CODE, FEATURE_SUCCESS_CODE};
use crate::kernel::process::{exit_child, fork_process, wait_for_exit};
use crate::kernel::shared_memory::SharedCounter;
use nix::sys::signal::{self, raise, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::WaitStatus;
use nix::unistd::ForkResult;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Interceptions observed by this process. Never decreases within a process.
static WRAPPED_SIGNALS: AtomicUsize = AtomicUsize::new(0);

/// Probe side: shared counter the handler bumps on delivery.
static PROBE_DELIVERIES: AtomicPtr<AtomicUsize> = AtomicPtr::new(ptr::null_mut());

/// Exit status of a probe whose handler ran.
const PROBE_INTERCEPTED_CODE: i32 = 86;

/// Exit status of a probe that could not arm its handler.
const PROBE_SETUP_FAILED_CODE: i32 = 87;

/// Number of signals intercepted by escape scopes in this process.
pub fn wrapped_signals() -> usize {
    WRAPPED_SIGNALS.load(Ordering::SeqCst)
}

/// Called once in each fresh feature process.
pub(crate) fn reset_wrapped_signals() {
    WRAPPED_SIGNALS.store(0, Ordering::SeqCst);
}

/// SIGKILL and SIGSTOP cannot be caught by any process.
pub fn is_wrappable(signal: Signal) -> bool {
    !matches!(signal, Signal::SIGKILL | Signal::SIGSTOP)
}

/// Async-safe interception handler
/// Only an atomic increment and _exit(): no allocation, no locks, no stdio.
extern "C" fn intercept_handler(_signal: libc::c_int) {
    let deliveries = PROBE_DELIVERIES.load(Ordering::SeqCst);
    if !deliveries.is_null() {
        // SAFETY: points into a SharedCounter kept alive by the probe's stack frame.
        unsafe { (*deliveries).fetch_add(1, Ordering::SeqCst) };
    }
    // SAFETY: _exit is async-signal-safe and skips atexit handlers.
    unsafe { libc::_exit(PROBE_INTERCEPTED_CODE) }
}

/// How a wrapped block ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeOutcome {
    /// The block ran to completion; the signal never fired.
    Completed,
    /// The signal fired; the rest of the block was abandoned.
    Intercepted,
}

/// One-shot escape scope for a single signal.
///
/// Consumed by [`SignalEscape::run`]; open a new scope for every block.
#[derive(Debug)]
#[must_use = "a signal escape does nothing until run"]
pub struct SignalEscape {
    signal: Signal,
}

impl SignalEscape {
    /// # Panics
    ///
    /// Panics for SIGKILL and SIGSTOP, which no process can intercept.
    pub fn new(signal: Signal) -> Self {
        assert!(
            is_wrappable(signal),
            "{} cannot be intercepted by an escape scope",
            signal.as_str()
        );
        Self { signal }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Run `block`, intercepting this scope's signal.
    ///
    /// Each interception increments [`wrapped_signals`] by exactly one.
    /// Errors are harness faults (mapping, fork, wait), never outcomes of the block.
    ///
    /// State changed by `block` stays in the probe: only its outcome comes back.
    /// Borrowing the caller's locals is rejected at compile time:
    ///
    /// ```compile_fail
    /// use nix::sys::signal::Signal;
    /// use traitbox::SignalEscape;
    ///
    /// let mut reached = false;
    /// let _ = SignalEscape::new(Signal::SIGABRT).run(|| {
    ///     reached = true;
    ///     std::process::abort();
    /// });
    /// ```
    ///
    /// # Panics
    ///
    /// If the block fails in any other way, the failure is carried over to the
    /// caller: a different fatal signal is re-raised here, and a panic or
    /// non-zero exit inside the block becomes a panic here.
    pub fn run<F>(self, block: F) -> Result<EscapeOutcome>
    where
        F: FnOnce() + Send + 'static,
    {
        let deliveries = SharedCounter::new()?;

        match fork_process("escape probe")? {
            ForkResult::Child => run_probe(self.signal, &deliveries, block),
            ForkResult::Parent { child } => {
                let status = wait_for_exit(child, "escape probe")?;
                Ok(self.settle(status, deliveries.get()))
            }
        }
    }

    fn settle(&self, status: WaitStatus, deliveries: usize) -> EscapeOutcome {
        if deliveries > 0 {
            let total = WRAPPED_SIGNALS.fetch_add(deliveries, Ordering::SeqCst) + deliveries;
            log::debug!(
                "Intercepted {} in escape scope (wrapped signals: {})",
                self.signal.as_str(),
                total
            );
            return EscapeOutcome::Intercepted;
        }

        match status {
            WaitStatus::Exited(_, FEATURE_SUCCESS_CODE) => EscapeOutcome::Completed,
            WaitStatus::Signaled(_, other, _) => propagate_signal(self.signal, other),
            WaitStatus::Exited(_, code) => panic!(
                "block wrapped for {} exited with status {}",
                self.signal.as_str(),
                code
            ),
            other => panic!(
                "block wrapped for {} ended in unexpected state {:?}",
                self.signal.as_str(),
                other
            ),
        }
    }
}

fn run_probe<F>(wrapped: Signal, deliveries: &SharedCounter, block: F) -> !
where
    F: FnOnce() + Send + 'static,
{
    PROBE_DELIVERIES.store(deliveries.as_ptr(), Ordering::SeqCst);

    let action = SigAction::new(
        SigHandler::Handler(intercept_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only touches atomics and calls _exit.
    if let Err(e) = unsafe { signal::sigaction(wrapped, &action) } {
        let _ = writeln!(
            std::io::stderr(),
            "Unable to install escape handler for {}: {}",
            wrapped.as_str(),
            e
        );
        exit_child(PROBE_SETUP_FAILED_CODE);
    }

    let mut unblock = SigSet::empty();
    unblock.add(wrapped);
    let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&unblock), None);

    match panic::catch_unwind(AssertUnwindSafe(block)) {
        Ok(()) => exit_child(FEATURE_SUCCESS_CODE),
        Err(_) => exit_child(FEATURE_PANIC_CODE),
    }
}

/// The probe died of a signal nobody asked to catch: die of it here too.
fn propagate_signal(wrapped: Signal, other: Signal) -> ! {
    log::debug!(
        "Block wrapped for {} was terminated by {}; re-raising",
        wrapped.as_str(),
        other.as_str()
    );
    // SAFETY: restoring the default disposition installs no handler code.
    let _ = unsafe { signal::signal(other, SigHandler::SigDfl) };
    let _ = raise(other);
    panic!(
        "block wrapped for {} was terminated by {}",
        wrapped.as_str(),
        other.as_str()
    )
}

/// Run `block` inside a fresh escape scope for `signal`.
///
/// A harness fault while opening the scope ends the current process through
/// [`crate::diagnostics::fatal`].
pub fn wrap<F>(signal: Signal, block: F) -> EscapeOutcome
where
    F: FnOnce() + Send + 'static,
{
    match SignalEscape::new(signal).run(block) {
        Ok(outcome) => outcome,
        Err(e) => crate::diagnostics::fatal(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_and_stop_not_wrappable() {
        assert!(!is_wrappable(Signal::SIGKILL));
        assert!(!is_wrappable(Signal::SIGSTOP));
        assert!(is_wrappable(Signal::SIGABRT));
        assert!(is_wrappable(Signal::SIGSEGV));
    }

    #[test]
    #[should_panic(expected = "SIGKILL cannot be intercepted")]
    fn test_wrapping_sigkill_is_a_programming_error() {
        let _ = SignalEscape::new(Signal::SIGKILL);
    }

    #[test]
    fn test_block_without_signal_completes() {
        let before = wrapped_signals();
        let outcome = SignalEscape::new(Signal::SIGUSR1).run(|| {}).unwrap();
        assert_eq!(outcome, EscapeOutcome::Completed);
        assert!(wrapped_signals() >= before);
    }

    // Kept in one test: the counter is process-wide and tests run in parallel.
    #[test]
    fn test_interceptions_are_counted_and_scopes_are_reusable() {
        let before = wrapped_signals();

        let first = SignalEscape::new(Signal::SIGUSR2).run(|| {
            let _ = raise(Signal::SIGUSR2);
            unreachable!("execution continues after the block, not inside it");
        });
        assert_eq!(first.unwrap(), EscapeOutcome::Intercepted);
        assert_eq!(wrapped_signals(), before + 1);

        let second = wrap(Signal::SIGUSR2, || {
            let _ = raise(Signal::SIGUSR2);
        });
        assert_eq!(second, EscapeOutcome::Intercepted);
        assert_eq!(wrapped_signals(), before + 2);

        let third = wrap(Signal::SIGABRT, || std::process::abort());
        assert_eq!(third, EscapeOutcome::Intercepted);
        assert_eq!(wrapped_signals(), before + 3);
    }

    #[test]
    fn test_block_writes_do_not_reach_caller() {
        static TOUCHED: AtomicUsize = AtomicUsize::new(0);

        let completed = wrap(Signal::SIGUSR1, || {
            TOUCHED.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(completed, EscapeOutcome::Completed);
        assert_eq!(TOUCHED.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "exited with status 101")]
    fn test_panic_inside_block_is_carried_over() {
        let _ = wrap(Signal::SIGUSR1, || panic!("boom"));
    }

    #[test]
    #[should_panic(expected = "exited with status 3")]
    fn test_nonzero_exit_inside_block_is_carried_over() {
        let _ = wrap(Signal::SIGUSR1, || std::process::exit(3));
    }
}
