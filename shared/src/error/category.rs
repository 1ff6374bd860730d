//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Ledger errors
/// - 2xxx: Staging errors
/// - 3xxx: Matching errors
/// - 4xxx: Week lock errors
/// - 5xxx: Reconciliation errors
/// - everything else: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Ledger errors (1xxx)
    Ledger,
    /// Staging errors (2xxx)
    Staging,
    /// Matching errors (3xxx)
    Matching,
    /// Week lock errors (4xxx)
    Week,
    /// Reconciliation errors (5xxx)
    Reconciliation,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Ledger,
            2000..3000 => Self::Staging,
            3000..4000 => Self::Matching,
            4000..5000 => Self::Week,
            5000..6000 => Self::Reconciliation,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Ledger => "ledger",
            Self::Staging => "staging",
            Self::Matching => "matching",
            Self::Week => "week",
            Self::Reconciliation => "reconciliation",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
