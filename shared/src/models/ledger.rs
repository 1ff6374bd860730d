//! Ledger entries - immutable money movements posted for a club week

use super::entity::EntityRef;
use super::week::WeekKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money direction, seen from the club
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Club received money from the entity
    In,
    /// Club paid money to the entity
    Out,
}

impl Direction {
    /// Signed contribution of `amount` to `IN − OUT`
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Direction::In => amount,
            Direction::Out => -amount,
        }
    }
}

/// How the money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Payment-processor export
    #[serde(rename = "chippix")]
    ChipPix,
    /// Bank statement
    Ofx,
    Pix,
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ChipPix => "chippix",
            PaymentMethod::Ofx => "ofx",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }

    /// Methods backed by an imported statement
    pub fn is_statement(&self) -> bool {
        matches!(self, PaymentMethod::ChipPix | PaymentMethod::Ofx)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key of a posting: method plus the statement's own id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub method: PaymentMethod,
    pub external_id: String,
}

impl ExternalRef {
    pub fn new(method: PaymentMethod, external_id: impl Into<String>) -> Self {
        Self {
            method,
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.external_id)
    }
}

/// Posted money movement
///
/// Never mutated once created; corrections delete and re-create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub week: WeekKey,
    pub club_id: String,
    pub entity: EntityRef,
    pub direction: Direction,
    /// Always > 0
    pub amount: Decimal,
    /// Processor fee carried from the statement row
    #[serde(default)]
    pub fee: Decimal,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<ExternalRef>,
    /// Unix millis
    pub timestamp: i64,
    #[serde(default)]
    pub description: String,
}

impl LedgerEntry {
    /// Contribution to `IN − OUT`
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}
