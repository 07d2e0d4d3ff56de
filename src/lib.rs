//! traitbox: a process-isolated, signal-aware test harness
//! Every test case runs in its own forked process, so a crash fails one case and never the run.
//!
//! # Architecture
//!
//! The crate is organized from the operating system upwards:
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::process`]: fork/pipe/wait plumbing
//! - [`kernel::shared_memory`]: Output buffer and counters backed by shared anonymous mappings
//! - [`kernel::signal`]: Signal escape scopes and the wrapped-signal counter
//!
//! ## Registry ([`registry`])
//! - [`registry::model`]: Subject, Trait, Feature and Fixture declarations
//! - [`registry::selection`]: Trait selection by exact name
//!
//! ## Execution Control ([`exec`])
//! - [`exec::context`]: Per-feature execution context (fixture context, escape scopes)
//! - [`exec::runner`]: One forked child per feature, diagnostics piped into the output buffer
//! - [`exec::executor`]: Walks the registry and aggregates verdicts
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::verdict`]: Wait status to verdict classification
//!
//! ## Report ([`report`])
//! - [`report::tally`]: Outcome counters
//! - [`report::render`]: Indented progress report and summary
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: Harness settings and JSON loading
//! - [`config::validator`]: Startup validation
//! - [`config::types`]: Errors, verdicts and exit codes
//!
//! ## Diagnostics ([`diagnostics`])
//! - Termination hook, the [`abort!`] primitive and the fatal harness-fault path
//!
//! # Example
//!
//! ```no_run
//! use traitbox::{Subject, Trait};
//! use nix::sys::signal::Signal;
//!
//! fn main() -> std::process::ExitCode {
//!     let subject = Subject::new("Arithmetic").with_trait(
//!         Trait::new("Division")
//!             .run("divides", |_| assert_eq!(6 / 3, 2))
//!             .run("aborts on request", |cx| {
//!                 cx.escape(Signal::SIGABRT, || std::process::abort());
//!                 assert_eq!(cx.wrapped_signals(), 1);
//!             }),
//!     );
//!     traitbox::cli::main(&subject)
//! }
//! ```

#[cfg(not(unix))]
compile_error!("traitbox isolates features with fork() and POSIX signals; only Unix targets are supported");

// Kernel Primitives
pub mod kernel;

// Registry
pub mod registry;

// Execution Control
pub mod exec;

// Verdict
pub mod verdict;

// Report
pub mod report;

// Configuration
pub mod config;

// Diagnostics
pub mod diagnostics;

// CLI entrypoint for test binaries
pub mod cli;

// Re-export commonly used types for convenience
pub use config::settings::HarnessConfig;
pub use config::types::*;
pub use exec::context::FeatureContext;
pub use exec::executor::{FeatureRecord, RunOutcome, SuiteExecutor};
pub use kernel::shared_memory::OutputBuffer;
pub use kernel::signal::{wrap, EscapeOutcome, SignalEscape};
pub use registry::{Feature, Fixture, Subject, Trait};
pub use report::Tally;
