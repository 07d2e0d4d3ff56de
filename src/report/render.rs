//! Report rendering
//! Indented progress lines while the run is going, summary at the end.

use crate::config::types::{FeatureVerdict, LoadError};
use crate::report::tally::Tally;
use std::fmt;
use std::io::{self, Write};

/// Nesting levels of the report.
const SUBJECT_LEVEL: usize = 0;
const TRAIT_LEVEL: usize = 1;
const FEATURE_LEVEL: usize = 2;

/// Writes the run report to any `Write` sink (stdout in the CLI).
pub struct Reporter<'w, W: Write> {
    out: &'w mut W,
    step: usize,
}

impl<'w, W: Write> Reporter<'w, W> {
    /// `step` is the number of spaces per nesting level.
    pub fn new(out: &'w mut W, step: usize) -> Self {
        Self { out, step }
    }

    fn line(&mut self, level: usize, args: fmt::Arguments<'_>) -> io::Result<()> {
        write!(self.out, "{:width$}", "", width = level * self.step)?;
        self.out.write_fmt(args)
    }

    pub fn load_failure(&mut self, err: &LoadError) -> io::Result<()> {
        writeln!(self.out, "{}", err)?;
        self.out.flush()
    }

    pub fn subject(&mut self, name: &str) -> io::Result<()> {
        self.line(SUBJECT_LEVEL, format_args!("Describing: {}\n", name))
    }

    pub fn trait_header(&mut self, name: &str) -> io::Result<()> {
        self.line(TRAIT_LEVEL, format_args!("Trait: {}\n", name))
    }

    /// Starts a feature line and flushes, so nothing is pending when the
    /// runner forks.
    pub fn feature_started(&mut self, name: &str) -> io::Result<()> {
        self.line(FEATURE_LEVEL, format_args!("Feature: {}... ", name))?;
        self.out.flush()
    }

    /// Completes the line opened by [`Reporter::feature_started`].
    pub fn feature_finished(&mut self, verdict: &FeatureVerdict) -> io::Result<()> {
        match verdict {
            FeatureVerdict::Failed { cause, diagnostics } => {
                if let Some(note) = cause.report_note() {
                    write!(self.out, "{} ", note)?;
                }
                writeln!(self.out, "{}", verdict)?;
                write!(self.out, "\n{}\n", diagnostics)?;
            }
            _ => writeln!(self.out, "{}", verdict)?,
        }
        self.out.flush()
    }

    /// Final counts, right-aligned to the width of the total.
    pub fn summary(&mut self, tally: &Tally) -> io::Result<()> {
        let width = tally.all.to_string().len();
        writeln!(self.out)?;
        writeln!(self.out, "Succeed: {:>width$}", tally.succeed, width = width)?;
        writeln!(self.out, "Skipped: {:>width$}", tally.skipped, width = width)?;
        writeln!(self.out, " Failed: {:>width$}", tally.failed, width = width)?;
        writeln!(self.out, "    All: {:>width$}", tally.all, width = width)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::FailureCause;

    fn render<F>(step: usize, f: F) -> String
    where
        F: FnOnce(&mut Reporter<'_, Vec<u8>>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut Reporter::new(&mut out, step)).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_progress_lines_are_indented_by_step() {
        let text = render(2, |r| {
            r.subject("S")?;
            r.trait_header("T")?;
            r.feature_started("pass")?;
            r.feature_finished(&FeatureVerdict::Succeed)?;
            r.feature_started("later")?;
            r.feature_finished(&FeatureVerdict::Skipped)
        });
        assert_eq!(
            text,
            "Describing: S\n  Trait: T\n    Feature: pass... succeed\n    Feature: later... skipped\n"
        );

        let text = render(4, |r| r.trait_header("T"));
        assert_eq!(text, "    Trait: T\n");
    }

    #[test]
    fn test_failed_feature_carries_note_and_diagnostics() {
        let verdict = FeatureVerdict::Failed {
            cause: FailureCause::Signal(libc::SIGABRT),
            diagnostics: "boom\n".to_string(),
        };
        let text = render(2, |r| {
            r.feature_started("crash")?;
            r.feature_finished(&verdict)
        });
        assert_eq!(
            text,
            format!(
                "    Feature: crash... (terminated by signal {} - SIGABRT) failed\n\nboom\n\n",
                libc::SIGABRT
            )
        );
    }

    #[test]
    fn test_exit_code_failure_has_no_note() {
        let verdict = FeatureVerdict::Failed {
            cause: FailureCause::ExitCode(101),
            diagnostics: String::new(),
        };
        let text = render(0, |r| {
            r.feature_started("f")?;
            r.feature_finished(&verdict)
        });
        assert_eq!(text, "Feature: f... failed\n\n\n");
    }

    #[test]
    fn test_summary_right_aligned_to_total_width() {
        let tally = Tally {
            succeed: 7,
            skipped: 0,
            failed: 5,
            all: 12,
        };
        let text = render(2, |r| r.summary(&tally));
        assert_eq!(
            text,
            "\nSucceed:  7\nSkipped:  0\n Failed:  5\n    All: 12\n"
        );
    }

    #[test]
    fn test_load_failure_message() {
        let text = render(2, |r| {
            r.load_failure(&LoadError::UnknownTrait("Nope".to_string()))
        });
        assert_eq!(text, "Unknown trait: `Nope`\n");
    }
}
