//! Week Lock Manager
//!
//! Freezes a week's resolved rates and end-of-week balances into a
//! [`WeekSnapshot`]. The snapshot is computed from live data only: a snapshot
//! retained from an earlier lock of the same week is bypassed.

use crate::carry_forward::{CarryForward, WeekFrame};
use serde::{Deserialize, Serialize};
use shared::models::{VerificationReport, WeekSnapshot};
use std::collections::BTreeMap;

/// How a failing verification is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Refuse to lock unless every check passes
    #[default]
    Strict,
    /// Operator acknowledged the mismatch
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum LockOutcome {
    Locked(WeekSnapshot),
    Blocked(VerificationReport),
}

impl LockOutcome {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockOutcome::Locked(_))
    }
}

/// Build the snapshot of week `index`
///
/// `frames` covers the club timeline up to and including the week.
pub fn build_snapshot(
    club_id: &str,
    mut frames: Vec<WeekFrame>,
    index: usize,
    verification_ok: bool,
    locked_at: i64,
) -> Option<WeekSnapshot> {
    let frame = frames.get_mut(index)?;
    frame.snapshot = None;
    let week = frame.week.clone();
    let (rb_rates_by_agent, rb_rates_by_player) = frame.live_rates().tables();

    let mut pass = CarryForward::new(&frames);
    let balances_by_entity: BTreeMap<_, _> = pass
        .universe(index)
        .into_iter()
        .map(|entity| {
            let balance = pass.balance_at(&entity, index);
            (entity, balance.value)
        })
        .collect();

    Some(WeekSnapshot::new(
        club_id,
        week,
        locked_at,
        rb_rates_by_agent,
        rb_rates_by_player,
        balances_by_entity,
        verification_ok,
    ))
}
