//! Shared type definitions for the harness
//! Error taxonomy, outcome enums, and the process exit codes the runner relies on.

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exit status a feature child reports when its body returned normally.
pub const FEATURE_SUCCESS_CODE: i32 = 0;

/// Exit status a feature child reports when its body panicked.
pub const FEATURE_PANIC_CODE: i32 = 101;

/// Exit status of the harness when the run failed or could not be loaded.
pub const RUN_FAILURE_CODE: i32 = 1;

/// Harness-internal faults.
///
/// These never describe the code under test: a feature that aborts or panics
/// is a [`FeatureVerdict::Failed`], not an error.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Shared memory error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Reasons a trait selection cannot be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Too many traits specified ({requested} > {limit})")]
    TooManyTraits { requested: usize, limit: usize },

    #[error("Unknown trait: `{0}`")]
    UnknownTrait(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Why a feature was classified as failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Child exited cleanly with a code other than the success code.
    ExitCode(i32),
    /// Child was terminated by a signal (raw signal number).
    Signal(i32),
    /// Neither a clean exit nor a recognized signal termination.
    Abnormal,
}

impl FailureCause {
    /// Parenthesised note printed before `failed` in the report, if any.
    pub fn report_note(&self) -> Option<String> {
        match self {
            FailureCause::ExitCode(_) => None,
            FailureCause::Signal(raw) => Some(format!(
                "(terminated by signal {} - {})",
                raw,
                signal_name(*raw)
            )),
            FailureCause::Abnormal => Some("(terminated abnormally)".to_string()),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ExitCode(code) => write!(f, "exit_code_{}", code),
            FailureCause::Signal(raw) => write!(f, "signal_{}", signal_name(*raw)),
            FailureCause::Abnormal => write!(f, "abnormal"),
        }
    }
}

/// Classified outcome of one feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum FeatureVerdict {
    Succeed,
    Skipped,
    Failed {
        cause: FailureCause,
        /// Diagnostic text captured from the child, verbatim.
        diagnostics: String,
    },
}

impl FeatureVerdict {
    pub fn is_failed(&self) -> bool {
        matches!(self, FeatureVerdict::Failed { .. })
    }
}

impl fmt::Display for FeatureVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureVerdict::Succeed => write!(f, "succeed"),
            FeatureVerdict::Skipped => write!(f, "skipped"),
            FeatureVerdict::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Symbolic name of a raw signal number, e.g. `SIGABRT`.
pub fn signal_name(raw: i32) -> &'static str {
    Signal::try_from(raw)
        .map(|sig| sig.as_str())
        .unwrap_or("unknown signal")
}
