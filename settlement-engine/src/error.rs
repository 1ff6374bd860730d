use crate::staging::TransitionError;
use crate::storage::StorageError;
use rust_decimal::Decimal;
use shared::models::{EntityRef, WeekKey};
use shared::{AppError, ErrorCode};
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityRef),

    #[error("Week {week} is locked for club {club_id}")]
    WeekLocked { club_id: String, week: WeekKey },

    #[error("Week not found: {0}")]
    UnknownWeek(WeekKey),

    #[error("Transaction has no resolved entity: {0}")]
    UnresolvedEntity(String),

    #[error("Possible duplicate of {existing_id}: {entity} {amount}")]
    PossibleDuplicate {
        entity: EntityRef,
        amount: Decimal,
        existing_id: String,
    },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Movement not found: {0}")]
    MovementNotFound(String),

    #[error("Ledger entry not found: {0}")]
    LedgerEntryNotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn week_locked(club_id: &str, week: &WeekKey) -> Self {
        EngineError::WeekLocked {
            club_id: club_id.to_string(),
            week: week.clone(),
        }
    }

    /// Error code surfaced to operators and in apply failure lists
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Storage(e) => classify_storage_error(e),
            EngineError::Validation(_) => ErrorCode::ValidationFailed,
            EngineError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            EngineError::OutOfRange(_) => ErrorCode::ValueOutOfRange,
            EngineError::EntityNotFound(_) => ErrorCode::EntityNotFound,
            EngineError::WeekLocked { .. } => ErrorCode::WeekLocked,
            EngineError::UnknownWeek(_) => ErrorCode::WeekNotFound,
            EngineError::UnresolvedEntity(_) => ErrorCode::UnresolvedEntity,
            EngineError::PossibleDuplicate { .. } => ErrorCode::PossibleDuplicate,
            EngineError::TransactionNotFound(_) => ErrorCode::TransactionNotFound,
            EngineError::MovementNotFound(_) => ErrorCode::MovementNotFound,
            EngineError::LedgerEntryNotFound(_) => ErrorCode::LedgerEntryNotFound,
            EngineError::InvalidTransition(_) => ErrorCode::InvalidTransition,
        }
    }
}

/// Map a storage error to an error code
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::InternalError;
    }

    // redb errors are classified by message
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("out of memory") || err_str.contains("cannot allocate") {
        return ErrorCode::OutOfMemory;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    ErrorCode::SystemBusy
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let code = err.code();
        match err {
            EngineError::Storage(e) => {
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            EngineError::WeekLocked { club_id, week } => {
                AppError::week_locked(week.as_str()).with_detail("club_id", club_id)
            }
            EngineError::PossibleDuplicate {
                entity,
                amount,
                existing_id,
            } => AppError::with_message(code, format!("Possible duplicate of {}", existing_id))
                .with_detail("entity", entity.to_string())
                .with_detail("amount", amount.to_string())
                .with_detail("existing_id", existing_id),
            other => AppError::with_message(code, other.to_string()),
        }
    }
}
