//! Operation results returned to operator tooling

use super::entity::EntityRef;
use super::ledger::PaymentMethod;
use crate::error::ErrorCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a carried balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// No history at all
    #[default]
    New,
    /// Computed from live data
    Provisional,
    /// Read from or produced inside a locked week
    Locked,
}

/// Balance owed by an entity at the end of a week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub value: Decimal,
    pub status: BalanceStatus,
}

impl Balance {
    pub const NEW: Balance = Balance {
        value: Decimal::ZERO,
        status: BalanceStatus::New,
    };
}

/// Aggregate compared by the reconciliation verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMetric {
    EntityCount,
    GrossIn,
    GrossOut,
    NetImpact,
    Fees,
}

impl CheckMetric {
    pub const ALL: [CheckMetric; 5] = [
        CheckMetric::EntityCount,
        CheckMetric::GrossIn,
        CheckMetric::GrossOut,
        CheckMetric::NetImpact,
        CheckMetric::Fees,
    ];
}

/// One row of the reconciliation panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub method: PaymentMethod,
    pub metric: CheckMetric,
    pub statement_value: Decimal,
    pub ledger_value: Decimal,
    /// statement − ledger
    pub delta: Decimal,
    pub ok: bool,
}

/// Reconciliation result for one club week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub ok: bool,
    pub items: Vec<CheckResult>,
}

impl VerificationReport {
    /// Rows that did not pass
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.items.iter().filter(|item| !item.ok)
    }
}

/// Result of a statement import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Rows whose id was already imported for this week
    pub already_present: usize,
    /// New rows the matcher resolved on import
    pub auto_linked: usize,
}

/// Single-transaction apply result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "entry_id", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// A new ledger entry was created
    Applied(String),
    /// The external ref was already posted; marked applied against it
    Duplicate(String),
    /// Transaction was applied before; nothing changed
    AlreadyApplied(String),
}

/// Why one transaction failed during a bulk apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub txn_id: String,
    pub code: ErrorCode,
    pub reason: String,
}

/// Bulk apply result; partial failure is reported, not raised
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Linked rows with no net impact, left unapplied
    pub zero_impact: usize,
    pub failures: Vec<ApplyFailure>,
}

/// Weekly settlement ("acerto") of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySettlement {
    pub entity: EntityRef,
    pub label: String,
    /// Balance carried in from the previous week
    pub previous_balance: Decimal,
    pub winnings: Decimal,
    pub rake: Decimal,
    /// Effective rakeback percent used for this week
    pub rb_rate: Decimal,
    pub rakeback: Decimal,
    /// Amount owed to the club from this week's play
    pub resultado: Decimal,
    /// Posted IN − OUT for this week
    pub ledger_net: Decimal,
    /// End-of-week balance owed
    pub balance: Decimal,
    pub status: BalanceStatus,
}
