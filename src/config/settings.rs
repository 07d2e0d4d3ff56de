//! Harness settings
//! Loaded from a JSON file when one is given, otherwise compiled-in defaults.

use crate::config::types::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Capacity of the shared diagnostics buffer, in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Columns added per nesting level in the report.
pub const DEFAULT_INDENTATION_STEP: usize = 2;

/// Upper bound on trait names accepted on one command line.
pub const DEFAULT_MAX_SELECTED_TRAITS: usize = 96;

/// Runtime settings for one harness run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Bytes of child diagnostics kept per feature; the rest is dropped
    pub buffer_capacity: usize,
    /// Report indentation per level
    pub indentation_step: usize,
    /// Maximum number of trait names selectable at once
    pub max_selected_traits: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            indentation_step: DEFAULT_INDENTATION_STEP,
            max_selected_traits: DEFAULT_MAX_SELECTED_TRAITS,
        }
    }
}

impl HarnessConfig {
    /// Load settings from a JSON file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: HarnessConfig = serde_json::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("Failed to parse config JSON: {}", e)))?;

        log::debug!("Loaded harness config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn with_overrides(
        mut self,
        buffer_capacity: Option<usize>,
        max_selected_traits: Option<usize>,
    ) -> Self {
        if let Some(capacity) = buffer_capacity {
            self.buffer_capacity = capacity;
        }
        if let Some(limit) = max_selected_traits {
            self.max_selected_traits = limit;
        }
        self
    }
}
