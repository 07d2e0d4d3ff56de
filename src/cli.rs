use crate::config::settings::HarnessConfig;
use crate::config::types::RUN_FAILURE_CODE;
use crate::config::validator::validate_config;
use crate::diagnostics;
use crate::exec::executor::{RunOutcome, SuiteExecutor};
use crate::registry::model::Subject;
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a trait registry, one isolated process per feature", long_about = None)]
pub struct Cli {
    /// JSON file with harness settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Bytes of diagnostics kept per failed feature
    #[arg(long, value_name = "BYTES")]
    pub buffer_capacity: Option<usize>,
    /// Maximum number of trait names accepted
    #[arg(long = "max-traits", value_name = "N")]
    pub max_traits: Option<usize>,
    /// Traits to run, by exact name (default: all)
    #[arg(value_name = "TRAIT", allow_hyphen_values = true)]
    pub traits: Vec<String>,
}

impl Cli {
    /// Settings file (if any), then command-line overrides, then validation.
    pub fn resolve_config(&self) -> Result<HarnessConfig> {
        let base = match &self.config {
            Some(path) => HarnessConfig::load_from_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => HarnessConfig::default(),
        };
        let config = base.with_overrides(self.buffer_capacity, self.max_traits);

        let validation = validate_config(&config).context("validating settings")?;
        log::debug!(
            "Harness config {:?} ({} warning(s))",
            config,
            validation.warnings.len()
        );
        Ok(config)
    }
}

/// Run `subject` as selected by an already parsed command line, reporting to stdout.
pub fn run(subject: &Subject, cli: &Cli) -> Result<RunOutcome> {
    let config = cli.resolve_config()?;
    let mut out = std::io::stdout();
    SuiteExecutor::new(subject, &config)
        .run(&cli.traits, &mut out)
        .with_context(|| format!("running `{}`", subject.name()))
}

/// Parse `args` (program name first) and run `subject`.
pub fn run_from<I, T>(subject: &Subject, args: I) -> Result<RunOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    run(subject, &cli)
}

/// Entry point for a test binary: `fn main() -> ExitCode { traitbox::cli::main(&subject()) }`.
///
/// Exits 0 when the registry loaded and no feature failed, 1 otherwise.
/// Harness faults go through [`diagnostics::fatal`].
pub fn main(subject: &Subject) -> ExitCode {
    main_from(subject, std::env::args_os())
}

/// [`main`] with an explicit command line (program name first).
pub fn main_from<I, T>(subject: &Subject, args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let _ = env_logger::try_init();
    ExitCode::from(exit_status(subject, args) as u8)
}

/// Usage errors end the run with the ordinary failure code; `--help` and
/// `--version` print and exit 0.
fn exit_status<I, T>(subject: &Subject, args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                log::error!("Unable to parse the command line for `{}`", subject.name());
                return RUN_FAILURE_CODE;
            }
        },
    };

    match run(subject, &cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => diagnostics::fatal(&format!("{:#}", e)),
    }
}
