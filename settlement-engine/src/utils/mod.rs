//! Utility module
//!
//! - [`logger`] - tracing subscriber setup

pub mod logger;
