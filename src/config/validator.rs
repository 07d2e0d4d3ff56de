// Config validation
// Settings are checked once at startup; a bad value fails the run before any fork.

use crate::config::settings::HarnessConfig;
use crate::config::types::{HarnessError, Result};

/// Largest buffer the harness will map for diagnostics (64 MiB).
const MAX_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// Problems found in a set of harness settings.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Valid while no error has been recorded; warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate settings at startup; errors are fatal, warnings are logged.
pub fn validate_config(config: &HarnessConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::default();

    if config.buffer_capacity == 0 {
        result.add_warning(
            "buffer_capacity is 0: diagnostics of failed features will be empty".to_string(),
        );
    } else if config.buffer_capacity > MAX_BUFFER_CAPACITY {
        result.add_error(format!(
            "buffer_capacity {} exceeds maximum {}",
            config.buffer_capacity, MAX_BUFFER_CAPACITY
        ));
    }

    if config.max_selected_traits == 0 {
        result.add_error(
            "max_selected_traits must be at least 1 (use no arguments to run every trait)"
                .to_string(),
        );
    }

    if config.indentation_step > 16 {
        result.add_warning(format!(
            "indentation_step {} is unusually wide",
            config.indentation_step
        ));
    }

    for warning in &result.warnings {
        log::warn!("Config warning: {}", warning);
    }

    if !result.is_valid() {
        return Err(HarnessError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}
