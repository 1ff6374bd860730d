//! Reconciliation Verifier
//!
//! Recomputes the same five aggregates from the imported statement rows and
//! from the posted ledger, per statement method, and compares them within one
//! cent. Pure comparison: the report gates locking but is never a source of
//! truth.

use crate::money::{money_eq, sum_money};
use crate::staging::{ImportedTransaction, TxnStatus};
use rust_decimal::Decimal;
use shared::models::{
    CheckMetric, CheckResult, Direction, LedgerEntry, PaymentMethod, VerificationReport,
};
use std::collections::BTreeSet;

const STATEMENT_METHODS: [PaymentMethod; 2] = [PaymentMethod::Ofx, PaymentMethod::ChipPix];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Aggregates {
    entity_count: Decimal,
    gross_in: Decimal,
    gross_out: Decimal,
    net_impact: Decimal,
    fees: Decimal,
}

impl Aggregates {
    fn get(&self, metric: CheckMetric) -> Decimal {
        match metric {
            CheckMetric::EntityCount => self.entity_count,
            CheckMetric::GrossIn => self.gross_in,
            CheckMetric::GrossOut => self.gross_out,
            CheckMetric::NetImpact => self.net_impact,
            CheckMetric::Fees => self.fees,
        }
    }

    fn from_statement<'a>(rows: impl Iterator<Item = &'a ImportedTransaction>) -> Self {
        let rows: Vec<_> = rows
            .filter(|r| r.status() != TxnStatus::Ignored && !r.is_zero_impact())
            .collect();

        // Unlinked rows each count as their own entity
        let mut entities = BTreeSet::new();
        let mut unlinked = 0usize;
        for row in &rows {
            match &row.entity {
                Some(entity) => {
                    entities.insert(entity.clone());
                }
                None => unlinked += 1,
            }
        }

        let gross_in = sum_money(rows.iter().map(|r| r.net().max(Decimal::ZERO)));
        let gross_out = sum_money(rows.iter().map(|r| (-r.net()).max(Decimal::ZERO)));
        Self {
            entity_count: Decimal::from(entities.len() + unlinked),
            gross_in,
            gross_out,
            net_impact: gross_in - gross_out,
            fees: sum_money(rows.iter().map(|r| r.taxa)),
        }
    }

    fn from_ledger<'a>(entries: impl Iterator<Item = &'a LedgerEntry>) -> Self {
        let entries: Vec<_> = entries.collect();
        let entities: BTreeSet<_> = entries.iter().map(|e| &e.entity).collect();
        let by_direction = |direction: Direction| {
            sum_money(
                entries
                    .iter()
                    .filter(|e| e.direction == direction)
                    .map(|e| e.amount),
            )
        };
        let gross_in = by_direction(Direction::In);
        let gross_out = by_direction(Direction::Out);
        Self {
            entity_count: Decimal::from(entities.len()),
            gross_in,
            gross_out,
            net_impact: gross_in - gross_out,
            fees: sum_money(entries.iter().map(|e| e.fee)),
        }
    }
}

/// Compare statement rows against posted entries of one club week
pub fn verify(imports: &[ImportedTransaction], ledger: &[LedgerEntry]) -> VerificationReport {
    let mut items = Vec::new();

    for method in STATEMENT_METHODS {
        if !imports.iter().any(|r| r.method() == method) {
            continue;
        }
        let statement = Aggregates::from_statement(imports.iter().filter(|r| r.method() == method));
        let posted = Aggregates::from_ledger(
            ledger
                .iter()
                .filter(|e| e.method == method && e.external_ref.is_some()),
        );

        for metric in CheckMetric::ALL {
            let statement_value = statement.get(metric);
            let ledger_value = posted.get(metric);
            items.push(CheckResult {
                method,
                metric,
                statement_value,
                ledger_value,
                delta: statement_value - ledger_value,
                ok: money_eq(statement_value, ledger_value),
            });
        }
    }

    VerificationReport {
        ok: items.iter().all(|i| i.ok),
        items,
    }
}
