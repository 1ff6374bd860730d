//! Unified error system for the settlement engine
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Response envelope used by operator tooling
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Ledger errors
//! - 2xxx: Staging errors
//! - 3xxx: Matching errors
//! - 4xxx: Week lock errors
//! - 5xxx: Reconciliation errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::ValidationFailed, "rate must be within 0..=100")
//!     .with_detail("rate", 120);
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(2));
//! ```

mod category;
mod codes;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
