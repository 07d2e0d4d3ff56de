//! Suite execution and result aggregation

use crate::config::settings::HarnessConfig;
use crate::config::types::{FeatureVerdict, Result, RUN_FAILURE_CODE};
use crate::exec::runner::FeatureRunner;
use crate::kernel::shared_memory::OutputBuffer;
use crate::registry::model::{Subject, Trait};
use crate::registry::selection::select_traits;
use crate::report::{Reporter, Tally};
use serde::Serialize;
use std::io::Write;

/// Verdict of one feature, with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeatureRecord {
    pub trait_name: String,
    pub feature_name: String,
    pub verdict: FeatureVerdict,
}

/// Everything a finished run knows about itself.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunOutcome {
    /// False when trait selection failed and nothing ran.
    pub loaded: bool,
    pub tally: Tally,
    pub records: Vec<FeatureRecord>,
}

impl RunOutcome {
    fn not_loaded() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.loaded && self.tally.failed == 0
    }

    /// 0 if the registry loaded and nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            RUN_FAILURE_CODE
        }
    }
}

/// Walks a subject's selected traits, one isolated child per feature.
pub struct SuiteExecutor<'a> {
    subject: &'a Subject,
    config: &'a HarnessConfig,
}

impl<'a> SuiteExecutor<'a> {
    pub fn new(subject: &'a Subject, config: &'a HarnessConfig) -> Self {
        Self { subject, config }
    }

    /// Run the traits named in `names` (all of them when empty), writing the
    /// report to `out`.
    ///
    /// A selection that cannot be loaded is reported and yields an outcome
    /// with `loaded == false`; no feature runs. Errors are harness faults.
    pub fn run<W: Write, S: AsRef<str>>(&self, names: &[S], out: &mut W) -> Result<RunOutcome> {
        let mut reporter = Reporter::new(out, self.config.indentation_step);

        let selected = match select_traits(self.subject, names, self.config.max_selected_traits) {
            Ok(selected) => selected,
            Err(e) => {
                log::error!("Unable to load `{}`: {}", self.subject.name(), e);
                reporter.load_failure(&e)?;
                return Ok(RunOutcome::not_loaded());
            }
        };

        let mut buffer = OutputBuffer::new(self.config.buffer_capacity)?;
        let mut outcome = RunOutcome {
            loaded: true,
            ..RunOutcome::default()
        };

        reporter.subject(self.subject.name())?;
        for declared in selected {
            let tally = self.run_trait(declared, &mut buffer, &mut reporter, &mut outcome.records)?;
            outcome.tally += tally;
        }
        reporter.summary(&outcome.tally)?;

        log::debug!(
            "Run of `{}` finished: {:?}",
            self.subject.name(),
            outcome.tally
        );
        Ok(outcome)
    }

    fn run_trait<W: Write>(
        &self,
        declared: &Trait,
        buffer: &mut OutputBuffer,
        reporter: &mut Reporter<'_, W>,
        records: &mut Vec<FeatureRecord>,
    ) -> Result<Tally> {
        let mut tally = Tally::default();
        reporter.trait_header(declared.name())?;

        for feature in declared.features() {
            reporter.feature_started(feature.name())?;

            let verdict = if feature.is_skipped() {
                FeatureVerdict::Skipped
            } else {
                FeatureRunner::new(buffer).run(declared.name(), feature)?
            };

            reporter.feature_finished(&verdict)?;
            tally.record(&verdict);
            records.push(FeatureRecord {
                trait_name: declared.name().to_string(),
                feature_name: feature.name().to_string(),
                verdict,
            });
        }

        Ok(tally)
    }
}
