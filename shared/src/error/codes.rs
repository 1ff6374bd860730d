//! Unified error codes for the settlement engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Ledger errors
//! - 2xxx: Staging errors
//! - 3xxx: Matching errors
//! - 4xxx: Week lock errors
//! - 5xxx: Reconciliation errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so operator tooling can
/// switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Ledger ====================
    /// Ledger entry not found
    LedgerEntryNotFound = 1001,
    /// Heuristic duplicate needs confirmation
    PossibleDuplicate = 1003,
    /// Amount must be positive
    InvalidAmount = 1004,

    // ==================== 2xxx: Staging ====================
    /// Imported transaction not found
    TransactionNotFound = 2001,
    /// Staged movement not found
    MovementNotFound = 2002,
    /// Status transition not allowed
    InvalidTransition = 2003,
    /// Transaction has no linked entity
    UnresolvedEntity = 2004,

    // ==================== 3xxx: Matching ====================
    /// Entity not present in the directory
    EntityNotFound = 3001,

    // ==================== 4xxx: Week ====================
    /// Week is locked
    WeekLocked = 4001,
    /// Week not part of the club timeline
    WeekNotFound = 4002,

    // ==================== 5xxx: Reconciliation ====================
    /// Statement and ledger totals disagree
    ReconciliationMismatch = 5001,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Out of memory
    OutOfMemory = 9402,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Ledger
            ErrorCode::LedgerEntryNotFound => "Ledger entry not found",
            ErrorCode::PossibleDuplicate => "Possible duplicate movement, confirmation required",
            ErrorCode::InvalidAmount => "Amount must be greater than zero",

            // Staging
            ErrorCode::TransactionNotFound => "Imported transaction not found",
            ErrorCode::MovementNotFound => "Staged movement not found",
            ErrorCode::InvalidTransition => "Status transition not allowed",
            ErrorCode::UnresolvedEntity => "Transaction is not linked to an entity",

            // Matching
            ErrorCode::EntityNotFound => "Entity not found",

            // Week
            ErrorCode::WeekLocked => "Week is locked",
            ErrorCode::WeekNotFound => "Week not found",

            // Reconciliation
            ErrorCode::ReconciliationMismatch => "Statement and ledger totals do not match",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::StorageFull => "Storage is full",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::StorageCorrupted => "Storage is corrupted",
            ErrorCode::SystemBusy => "System busy, retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when a u16 does not map to a known [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Ledger
            1001 => Ok(ErrorCode::LedgerEntryNotFound),
            1003 => Ok(ErrorCode::PossibleDuplicate),
            1004 => Ok(ErrorCode::InvalidAmount),

            // Staging
            2001 => Ok(ErrorCode::TransactionNotFound),
            2002 => Ok(ErrorCode::MovementNotFound),
            2003 => Ok(ErrorCode::InvalidTransition),
            2004 => Ok(ErrorCode::UnresolvedEntity),

            // Matching
            3001 => Ok(ErrorCode::EntityNotFound),

            // Week
            4001 => Ok(ErrorCode::WeekLocked),
            4002 => Ok(ErrorCode::WeekNotFound),

            // Reconciliation
            5001 => Ok(ErrorCode::ReconciliationMismatch),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9401 => Ok(ErrorCode::StorageFull),
            9402 => Ok(ErrorCode::OutOfMemory),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
