//! Data models
//!
//! Shared between the settlement engine and operator tooling.
//! Money is `rust_decimal::Decimal` everywhere.

pub mod entity;
pub mod ledger;
pub mod report;
pub mod snapshot;
pub mod statement;
pub mod week;

// Re-exports
pub use entity::*;
pub use ledger::*;
pub use report::*;
pub use snapshot::{WeekLock, WeekSnapshot, entity_map};
pub use statement::*;
pub use week::*;
