//! Ledger postings and duplicate guards
//!
//! A club week's ledger is an append-only list: entries are never edited,
//! only deleted and re-created. `(method, external_id)` is unique within it.

use crate::money::money_eq;
use rust_decimal::Decimal;
use shared::models::{Direction, EntityRef, ExternalRef, LedgerEntry, PaymentMethod, WeekKey};
use uuid::Uuid;

/// Everything needed to create one entry
#[derive(Debug, Clone)]
pub struct Posting {
    pub entity: EntityRef,
    pub direction: Direction,
    pub amount: Decimal,
    pub fee: Decimal,
    pub method: PaymentMethod,
    pub external_ref: Option<ExternalRef>,
    pub timestamp: i64,
    pub description: String,
}

impl Posting {
    pub fn into_entry(self, club_id: &str, week: &WeekKey) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4().to_string(),
            week: week.clone(),
            club_id: club_id.to_string(),
            entity: self.entity,
            direction: self.direction,
            amount: self.amount,
            fee: self.fee,
            method: self.method,
            external_ref: self.external_ref,
            timestamp: self.timestamp,
            description: self.description,
        }
    }
}

/// Entry already posted under the same external ref
pub fn find_by_external_ref<'a>(entries: &'a [LedgerEntry], external_ref: &ExternalRef) -> Option<&'a LedgerEntry> {
    entries
        .iter()
        .find(|e| e.external_ref.as_ref() == Some(external_ref))
}

/// Same entity and amount within `window_millis` of `timestamp`
pub fn find_possible_duplicate<'a>(
    entries: &'a [LedgerEntry],
    entity: &EntityRef,
    amount: Decimal,
    timestamp: i64,
    window_millis: i64,
) -> Option<&'a LedgerEntry> {
    entries.iter().find(|e| {
        &e.entity == entity
            && money_eq(e.amount, amount)
            && (e.timestamp - timestamp).abs() <= window_millis
    })
}

/// Σ In − Σ Out for one entity
pub fn ledger_net(entries: &[LedgerEntry], entity: &EntityRef) -> Decimal {
    entries
        .iter()
        .filter(|e| &e.entity == entity)
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// Remove an entry by id
pub fn remove_entry(entries: &mut Vec<LedgerEntry>, entry_id: &str) -> Option<LedgerEntry> {
    let index = entries.iter().position(|e| e.id == entry_id)?;
    Some(entries.remove(index))
}
