//! Test registry
//!
//! The declared Subject -> Trait -> Feature tree and trait selection by name.

pub mod model;
pub mod selection;

pub use model::{Context, Feature, Fixture, Subject, Trait};
pub use selection::select_traits;
