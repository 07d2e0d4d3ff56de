//! Thin wrappers around POSIX process primitives.
//!
//! All `unsafe` code is concentrated here with explicit SAFETY comments.
//! Dependency direction: shared_memory -> process -> signal

pub mod process;
pub mod shared_memory;
pub mod signal;
