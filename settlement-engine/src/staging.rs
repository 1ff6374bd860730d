//! Staging state machines
//!
//! Imported statement rows:
//!
//! ```text
//! pending --link--> linked --lock--> locked --apply--> applied
//! pending/linked --ignore--> ignored --restore--> pending/linked
//! applied --revert--> linked
//! ```
//!
//! Manual movements: `staged --apply--> applied`, `staged --reject--> rejected`,
//! `applied --revert--> staged`.
//!
//! Status fields are private; every change goes through a transition method.

use crate::money::is_zero;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    ChipPixRow, Direction, EntityRef, ExternalRef, OfxRow, PaymentMethod, WeekKey,
};
use std::fmt;
use thiserror::Error;

/// Illegal state-machine move
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} from status {from}")]
pub struct TransitionError {
    pub action: &'static str,
    pub from: String,
}

impl TransitionError {
    pub fn new(action: &'static str, from: impl fmt::Display) -> Self {
        Self {
            action,
            from: from.to_string(),
        }
    }
}

// ========== Imported transactions ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnStatus {
    Pending,
    Linked,
    Locked,
    Applied,
    Ignored,
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnStatus::Pending => "pending",
            TxnStatus::Linked => "linked",
            TxnStatus::Locked => "locked",
            TxnStatus::Applied => "applied",
            TxnStatus::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// Statement a row came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionSource {
    Ofx { bank: String },
    #[serde(rename = "chippix")]
    ChipPix,
}

impl TransactionSource {
    pub fn method(&self) -> PaymentMethod {
        match self {
            TransactionSource::Ofx { .. } => PaymentMethod::Ofx,
            TransactionSource::ChipPix => PaymentMethod::ChipPix,
        }
    }
}

/// One imported statement row and its staging state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedTransaction {
    /// FITID (OFX) or player id (ChipPix); unique per club week and source
    pub id: String,
    pub source: TransactionSource,
    pub date: NaiveDate,
    pub entrada: Decimal,
    pub saida: Decimal,
    #[serde(default)]
    pub taxa: Decimal,
    #[serde(default)]
    pub memo: String,
    /// Processor transactions folded into the row (ChipPix)
    #[serde(default)]
    pub txns: u32,
    status: TxnStatus,
    #[serde(default)]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub entity_label: Option<String>,
    #[serde(default)]
    pub applied_movement_id: Option<String>,
}

impl ImportedTransaction {
    /// Bank row: positive amounts are credits (entrada), negative debits
    pub fn from_ofx(row: &OfxRow) -> Self {
        let (entrada, saida) = if row.amount >= Decimal::ZERO {
            (row.amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -row.amount)
        };
        Self {
            id: row.fitid.clone(),
            source: TransactionSource::Ofx {
                bank: row.bank.clone(),
            },
            date: row.date,
            entrada,
            saida,
            taxa: Decimal::ZERO,
            memo: row.memo.clone(),
            txns: 1,
            status: TxnStatus::Pending,
            entity: None,
            entity_label: None,
            applied_movement_id: None,
        }
    }

    /// Processor row dated by its first transaction
    pub fn from_chippix(row: &ChipPixRow, fallback_date: NaiveDate) -> Self {
        Self {
            id: row.id_jog.clone(),
            source: TransactionSource::ChipPix,
            date: row.datas.first().copied().unwrap_or(fallback_date),
            entrada: row.entrada,
            saida: row.saida,
            taxa: row.taxa,
            memo: row.nome.clone(),
            txns: row.txns,
            status: TxnStatus::Pending,
            entity: None,
            entity_label: None,
            applied_movement_id: None,
        }
    }

    pub fn status(&self) -> TxnStatus {
        self.status
    }

    pub fn method(&self) -> PaymentMethod {
        self.source.method()
    }

    /// Idempotency key of the posting, e.g. `chippix:cp_1610051AG`
    pub fn external_ref(&self) -> ExternalRef {
        ExternalRef::new(self.method(), self.id.clone())
    }

    /// entrada − saída
    pub fn net(&self) -> Decimal {
        self.entrada - self.saida
    }

    /// Informational rows never reach the ledger
    pub fn is_zero_impact(&self) -> bool {
        is_zero(self.net())
    }

    pub fn direction(&self) -> Direction {
        if self.entrada >= self.saida {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// |entrada − saída|
    pub fn amount(&self) -> Decimal {
        self.net().abs()
    }

    pub fn is_applied(&self) -> bool {
        self.status == TxnStatus::Applied
    }

    /// Whether bulk apply should pick this row up
    pub fn is_ready(&self) -> bool {
        matches!(self.status, TxnStatus::Linked | TxnStatus::Locked)
    }

    // ========== Transitions ==========

    /// pending/linked → linked
    pub fn link(&mut self, entity: EntityRef, label: impl Into<String>) -> Result<(), TransitionError> {
        match self.status {
            TxnStatus::Pending | TxnStatus::Linked => {
                self.entity = Some(entity);
                self.entity_label = Some(label.into());
                self.status = TxnStatus::Linked;
                Ok(())
            }
            other => Err(TransitionError::new("link", other)),
        }
    }

    /// linked → locked (ChipPix batch confirmation)
    pub fn lock(&mut self) -> Result<(), TransitionError> {
        if self.source != TransactionSource::ChipPix {
            return Err(TransitionError::new("lock a bank row", self.status));
        }
        match self.status {
            TxnStatus::Linked => {
                self.status = TxnStatus::Locked;
                Ok(())
            }
            other => Err(TransitionError::new("lock", other)),
        }
    }

    /// linked/locked → applied
    pub fn mark_applied(&mut self, movement_id: impl Into<String>) -> Result<(), TransitionError> {
        match self.status {
            TxnStatus::Linked | TxnStatus::Locked if self.entity.is_some() => {
                self.applied_movement_id = Some(movement_id.into());
                self.status = TxnStatus::Applied;
                Ok(())
            }
            other => Err(TransitionError::new("apply", other)),
        }
    }

    /// pending/linked → ignored
    pub fn ignore(&mut self) -> Result<(), TransitionError> {
        match self.status {
            TxnStatus::Pending | TxnStatus::Linked => {
                self.status = TxnStatus::Ignored;
                Ok(())
            }
            other => Err(TransitionError::new("ignore", other)),
        }
    }

    /// ignored → linked if an entity is set, else pending
    pub fn restore(&mut self) -> Result<(), TransitionError> {
        match self.status {
            TxnStatus::Ignored => {
                self.status = if self.entity.is_some() {
                    TxnStatus::Linked
                } else {
                    TxnStatus::Pending
                };
                Ok(())
            }
            other => Err(TransitionError::new("restore", other)),
        }
    }

    /// applied → linked, returning the ledger entry id it pointed at
    pub fn revert(&mut self) -> Result<Option<String>, TransitionError> {
        match self.status {
            TxnStatus::Applied => {
                self.status = TxnStatus::Linked;
                Ok(self.applied_movement_id.take())
            }
            other => Err(TransitionError::new("revert", other)),
        }
    }
}

// ========== Manual movements ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Staged,
    Applied,
    Rejected,
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementStatus::Staged => "staged",
            MovementStatus::Applied => "applied",
            MovementStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Operator input for a manual movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovement {
    pub entity: EntityRef,
    pub direction: Direction,
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// External id of the payment (receipt number, PIX end-to-end id)
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Millisecond timestamp; defaults to now
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Manual movement awaiting posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedMovement {
    pub id: String,
    pub week: WeekKey,
    pub club_id: String,
    pub entity: EntityRef,
    pub direction: Direction,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub external_ref: Option<ExternalRef>,
    #[serde(default)]
    pub description: String,
    pub timestamp: i64,
    status: MovementStatus,
    #[serde(default)]
    pub applied_movement_id: Option<String>,
}

impl StagedMovement {
    pub fn new(
        id: impl Into<String>,
        club_id: impl Into<String>,
        week: WeekKey,
        input: NewMovement,
        now: i64,
    ) -> Self {
        let external_ref = input
            .external_id
            .filter(|e| !e.trim().is_empty())
            .map(|e| ExternalRef::new(input.method, e));
        Self {
            id: id.into(),
            week,
            club_id: club_id.into(),
            entity: input.entity,
            direction: input.direction,
            amount: input.amount,
            method: input.method,
            external_ref,
            description: input.description,
            timestamp: input.timestamp.unwrap_or(now),
            status: MovementStatus::Staged,
            applied_movement_id: None,
        }
    }

    pub fn status(&self) -> MovementStatus {
        self.status
    }

    pub fn mark_applied(&mut self, movement_id: impl Into<String>) -> Result<(), TransitionError> {
        match self.status {
            MovementStatus::Staged => {
                self.applied_movement_id = Some(movement_id.into());
                self.status = MovementStatus::Applied;
                Ok(())
            }
            other => Err(TransitionError::new("apply", other)),
        }
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        match self.status {
            MovementStatus::Staged => {
                self.status = MovementStatus::Rejected;
                Ok(())
            }
            other => Err(TransitionError::new("reject", other)),
        }
    }

    /// applied → staged
    pub fn revert(&mut self) -> Result<Option<String>, TransitionError> {
        match self.status {
            MovementStatus::Applied => {
                self.status = MovementStatus::Staged;
                Ok(self.applied_movement_id.take())
            }
            other => Err(TransitionError::new("revert", other)),
        }
    }
}
