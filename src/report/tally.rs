use crate::config::types::FeatureVerdict;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Outcome counters for a trait or a whole run.
///
/// `all` always equals `succeed + skipped + failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub succeed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub all: usize,
}

impl Tally {
    pub fn record(&mut self, verdict: &FeatureVerdict) {
        match verdict {
            FeatureVerdict::Succeed => self.succeed += 1,
            FeatureVerdict::Skipped => self.skipped += 1,
            FeatureVerdict::Failed { .. } => self.failed += 1,
        }
        self.all += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.all == self.succeed + self.skipped + self.failed
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Tally) {
        self.succeed += other.succeed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.all += other.all;
    }
}
