//! Result aggregation and report rendering

pub mod render;
pub mod tally;

pub use render::Reporter;
pub use tally::Tally;
