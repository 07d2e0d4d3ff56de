//! Configuration
//!
//! Harness settings, their validation, and the shared type definitions.

pub mod settings;
pub mod types;
pub mod validator;
