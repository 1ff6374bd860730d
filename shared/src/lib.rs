//! Shared types for the league settlement engine
//!
//! Domain models, statement row contracts, report structures and the
//! unified error system used by the engine and its operator tooling.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
