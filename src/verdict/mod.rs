//! Outcome classification
//!
//! Derives feature verdicts as pure functions over the child's wait status.

pub mod verdict;
