//! League settlement engine
//!
//! Turns a club's weekly play results and money movements into per-entity
//! balances carried week over week, and freezes them once reconciled.
//!
//! # Modules
//!
//! ```text
//! settlement-engine/src/
//! ├── core/           # Configuration
//! ├── engine/         # SettlementEngine service
//! ├── utils/          # Logging
//! ├── money.rs        # Decimal helpers
//! ├── fees.rs         # Fee & rake calculations
//! ├── rates.rs        # Rakeback rate resolution
//! ├── matcher.rs      # Statement row → entity matching
//! ├── staging.rs      # Imported rows and manual movements
//! ├── ledger.rs       # Postings and duplicate guards
//! ├── carry_forward.rs
//! ├── lock.rs         # Week snapshots
//! ├── verify.rs       # Statement vs ledger reconciliation
//! ├── directory.rs    # Club/agent/player source
//! └── storage.rs      # redb persistence
//! ```

pub mod carry_forward;
pub mod core;
pub mod directory;
pub mod engine;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod lock;
pub mod matcher;
pub mod money;
pub mod rates;
pub mod staging;
pub mod storage;
pub mod utils;
pub mod verify;

// Re-exports
pub use core::{EngineConfig, RetainedSnapshotPolicy};
pub use directory::{DirectoryData, EntityDirectory, InMemoryDirectory};
pub use engine::SettlementEngine;
pub use error::{EngineError, EngineResult};
pub use fees::{ClubFinancials, FeeRates};
pub use lock::{LockMode, LockOutcome};
pub use matcher::{MatchTier, MemoCache};
pub use staging::{ImportedTransaction, MovementStatus, NewMovement, StagedMovement, TxnStatus};
pub use storage::{SettlementStorage, StorageError};

// Re-export unified error types from shared
pub use shared::{ApiResponse, AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
