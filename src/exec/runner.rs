use crate::config::types::{
    FeatureVerdict, Result, FEATURE_PANIC_CODE, FEATURE_SUCCESS_CODE, RUN_FAILURE_CODE,
};
use crate::exec::context::FeatureContext;
use crate::kernel::process::{close_quietly, exit_child, fork_process, open_pipe, wait_for_exit};
use crate::kernel::shared_memory::OutputBuffer;
use crate::kernel::signal;
use crate::registry::model::Feature;
use crate::verdict::verdict::VerdictClassifier;
use nix::unistd::{dup2, ForkResult};
use std::io::Write;
use std::os::unix::io::RawFd;
use std::panic::{self, AssertUnwindSafe};

/// Process isolation runner
///
/// Runs each feature in its own forked child with stderr piped into the
/// shared output buffer. Whatever the child does (abort, crash, panic, exit)
/// ends up as a verdict; only failures of the harness's own plumbing are
/// errors.
pub struct FeatureRunner<'b> {
    buffer: &'b mut OutputBuffer,
}

impl<'b> FeatureRunner<'b> {
    pub fn new(buffer: &'b mut OutputBuffer) -> Self {
        Self { buffer }
    }

    /// Fork, run `feature`, wait for it, classify.
    ///
    /// Blocks until the child is gone. There is no timeout: a feature that
    /// never returns stalls the run.
    pub fn run(&mut self, trait_name: &str, feature: &Feature) -> Result<FeatureVerdict> {
        self.buffer.clear();

        let (read_fd, write_fd) = open_pipe("diagnostics")?;
        let forked = match fork_process("feature") {
            Ok(forked) => forked,
            Err(e) => {
                close_quietly(read_fd);
                close_quietly(write_fd);
                return Err(e);
            }
        };

        match forked {
            ForkResult::Child => {
                close_quietly(read_fd);
                run_feature_child(trait_name, feature, write_fd)
            }
            ForkResult::Parent { child } => {
                log::debug!(
                    "Forked feature {}::{} as pid {}",
                    trait_name,
                    feature.name(),
                    child
                );
                close_quietly(write_fd);

                // Drain before waiting so a chatty child cannot block on a full pipe.
                let drained = self.buffer.read_from(read_fd);
                close_quietly(read_fd);
                let status = wait_for_exit(child, "feature")?;
                drained?;

                log::debug!(
                    "Feature {}::{} finished: {:?} ({} diagnostic bytes)",
                    trait_name,
                    feature.name(),
                    status,
                    self.buffer.len()
                );
                Ok(VerdictClassifier::classify(
                    status,
                    self.buffer.to_string_lossy(),
                ))
            }
        }
    }
}

/// Body of the forked child. Never returns into the harness.
fn run_feature_child(trait_name: &str, feature: &Feature, diagnostics_fd: RawFd) -> ! {
    if let Err(e) = dup2(diagnostics_fd, libc::STDERR_FILENO) {
        let _ = writeln!(std::io::stderr(), "dup2(diagnostics -> stderr): {}", e);
        exit_child(RUN_FAILURE_CODE);
    }
    if diagnostics_fd != libc::STDERR_FILENO {
        close_quietly(diagnostics_fd);
    }

    signal::reset_wrapped_signals();
    install_panic_reporter(trait_name, feature.name());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut context = FeatureContext::set_up(trait_name, feature.name(), feature.fixture());
        feature.call(&mut context);
        // Dropping the context runs the fixture teardown.
        drop(context);
    }));

    match outcome {
        Ok(()) => exit_child(FEATURE_SUCCESS_CODE),
        Err(_) => exit_child(FEATURE_PANIC_CODE),
    }
}

/// Report panics straight to fd 2, which is the diagnostics pipe in the child.
fn install_panic_reporter(trait_name: &str, feature_name: &str) {
    let label = format!("{}::{}", trait_name, feature_name);
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let _ = writeln!(
            std::io::stderr(),
            "feature '{}' panicked at {}:\n{}",
            label,
            location,
            message
        );
    }));
}
