//! Verdict classification
//! Maps the raw wait status of a feature child to a verdict.
//! Pure function over (wait status, captured diagnostics): no I/O, no retries.

use crate::config::types::{FailureCause, FeatureVerdict, FEATURE_SUCCESS_CODE};
use nix::sys::wait::WaitStatus;

/// Verdict classifier - pure function over the child's termination evidence
pub struct VerdictClassifier;

impl VerdictClassifier {
    /// Classify a finished feature child.
    ///
    /// - clean exit with the success code: `Succeed`
    /// - any other exit code: `Failed(ExitCode)`
    /// - killed by a signal: `Failed(Signal)`
    /// - anything else the wait reported: `Failed(Abnormal)`
    pub fn classify(status: WaitStatus, diagnostics: String) -> FeatureVerdict {
        let cause = match status {
            WaitStatus::Exited(_, FEATURE_SUCCESS_CODE) => return FeatureVerdict::Succeed,
            WaitStatus::Exited(_, code) => FailureCause::ExitCode(code),
            WaitStatus::Signaled(_, signal, _) => FailureCause::Signal(signal as i32),
            // Stopped/continued/ptrace states: kept coarse on purpose.
            _ => FailureCause::Abnormal,
        };

        FeatureVerdict::Failed { cause, diagnostics }
    }
}
