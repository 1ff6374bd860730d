//! Carry-Forward Calculator
//!
//! `balance(e, n) = balance(e, n−1) + resultado(e, n) − ledgerNet(e, n)`,
//! with `balance(e, −1) = 0` and a snapshot holding `e` at week `n`
//! short-circuiting the recursion.
//!
//! Evaluated as an iterative fold: walk back to the nearest memoized value or
//! snapshot, then fold forward, memoizing every `(entity, week index)` on the
//! way so repeated requests inside one pass return identical results.
//! The memo holds unrounded values; rounding to cents happens only when a
//! balance leaves the pass.

use crate::fees::{BlockResult, settle_block};
use crate::ledger;
use crate::money::round_money;
use crate::rates::{LiveRates, RateOverrides, resolve_rate};
use rust_decimal::Decimal;
use shared::models::{
    Agent, Balance, BalanceStatus, EntityRef, LedgerEntry, Player, WeekKey, WeekSnapshot,
};
use std::collections::{BTreeSet, HashMap};

/// Everything the fold needs to know about one week
#[derive(Debug, Clone)]
pub struct WeekFrame {
    pub week: WeekKey,
    pub locked: bool,
    /// Snapshot consulted for this week (already filtered by policy)
    pub snapshot: Option<WeekSnapshot>,
    pub ledger: Vec<LedgerEntry>,
    pub agents: Vec<Agent>,
    pub players: Vec<Player>,
    pub overrides: RateOverrides,
}

impl WeekFrame {
    pub fn live_rates(&self) -> LiveRates<'_> {
        LiveRates::new(&self.overrides, &self.agents, &self.players)
    }

    /// Effective rakeback rate of an entity in this week
    pub fn rate(&self, entity: &EntityRef) -> Decimal {
        resolve_rate(self.snapshot.as_ref(), &self.live_rates(), entity)
    }

    fn agent_of(&self, player: &Player) -> Option<&Agent> {
        self.agents.iter().find(|a| player.belongs_to(&a.name))
    }

    /// Weekly play result of an entity, if it is settled as a block
    ///
    /// Non-direct agents settle all their players at the agent's rate.
    /// Players of direct agents (or with no known agent) settle alone at their
    /// own rate. Everything else has no play result.
    pub fn settle(&self, entity: &EntityRef) -> Option<BlockResult> {
        match entity {
            EntityRef::Agent(id) => {
                let agent = self.agents.iter().find(|a| &a.id == id)?;
                if agent.is_direct {
                    return None;
                }
                let players = self.players.iter().filter(|p| p.belongs_to(&agent.name));
                Some(settle_block(players, self.rate(entity)))
            }
            EntityRef::Player(id) => {
                let player = self.players.iter().find(|p| &p.id == id)?;
                match self.agent_of(player) {
                    Some(agent) if !agent.is_direct => None,
                    _ => Some(settle_block([player], self.rate(entity))),
                }
            }
            EntityRef::Club(_) | EntityRef::Expense(_) => None,
        }
    }

    pub fn resultado(&self, entity: &EntityRef) -> Decimal {
        self.settle(entity)
            .map(|b| b.resultado)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn ledger_net(&self, entity: &EntityRef) -> Decimal {
        ledger::ledger_net(&self.ledger, entity)
    }

    fn has_activity(&self, entity: &EntityRef) -> bool {
        self.settle(entity).is_some() || self.ledger.iter().any(|e| &e.entity == entity)
    }

    /// Entities this week contributes to the universe
    fn entities(&self) -> impl Iterator<Item = EntityRef> + '_ {
        let agents = self.agents.iter().map(|a| EntityRef::agent(&a.id));
        let direct_players = self
            .players
            .iter()
            .filter(|p| !matches!(self.agent_of(p), Some(a) if !a.is_direct))
            .map(|p| EntityRef::player(&p.id));
        let ledger = self.ledger.iter().map(|e| e.entity.clone());
        let snapshot = self
            .snapshot
            .iter()
            .flat_map(|s| s.balances_by_entity.keys().cloned());
        agents.chain(direct_players).chain(ledger).chain(snapshot)
    }
}

/// One evaluation pass over a club timeline
pub struct CarryForward<'a> {
    frames: &'a [WeekFrame],
    memo: HashMap<(EntityRef, usize), Balance>,
}

impl<'a> CarryForward<'a> {
    /// `frames` must be sorted by week, oldest first
    pub fn new(frames: &'a [WeekFrame]) -> Self {
        Self {
            frames,
            memo: HashMap::new(),
        }
    }

    /// Balance at the end of week `index`, rounded to cents
    pub fn balance_at(&mut self, entity: &EntityRef, index: usize) -> Balance {
        let exact = self.exact_balance_at(entity, index);
        Balance {
            value: round_money(exact.value),
            status: exact.status,
        }
    }

    /// Unrounded running balance; the memo holds these so cents never drift
    fn exact_balance_at(&mut self, entity: &EntityRef, index: usize) -> Balance {
        if index >= self.frames.len() {
            return match self.frames.len() {
                0 => Balance::NEW,
                len => self.exact_balance_at(entity, len - 1),
            };
        }
        if let Some(balance) = self.memo.get(&(entity.clone(), index)) {
            return *balance;
        }

        // Walk back to a known value
        let mut base = Balance::NEW;
        let mut start = 0;
        for i in (0..=index).rev() {
            if let Some(balance) = self.memo.get(&(entity.clone(), i)) {
                base = *balance;
                start = i + 1;
                break;
            }
            let frame = &self.frames[i];
            if let Some(value) = frame.snapshot.as_ref().and_then(|s| s.balance_for(entity)) {
                base = Balance {
                    value,
                    status: if frame.locked {
                        BalanceStatus::Locked
                    } else {
                        BalanceStatus::Provisional
                    },
                };
                self.memo.insert((entity.clone(), i), base);
                start = i + 1;
                break;
            }
        }

        // Fold forward
        for i in start..=index {
            let frame = &self.frames[i];
            let value = base.value + frame.resultado(entity) - frame.ledger_net(entity);
            let status = if frame.locked {
                BalanceStatus::Locked
            } else if base.status != BalanceStatus::New || frame.has_activity(entity) {
                BalanceStatus::Provisional
            } else {
                BalanceStatus::New
            };
            base = Balance { value, status };
            self.memo.insert((entity.clone(), i), base);
        }
        base
    }

    /// Balance carried into week `index` (end of the previous week)
    pub fn balance_before(&mut self, entity: &EntityRef, index: usize) -> Balance {
        match index {
            0 => Balance::NEW,
            i => self.balance_at(entity, i - 1),
        }
    }

    /// Every entity that may hold a balance at the end of week `index`
    pub fn universe(&self, index: usize) -> BTreeSet<EntityRef> {
        let end = index.min(self.frames.len().saturating_sub(1));
        self.frames
            .iter()
            .take(end + 1)
            .flat_map(WeekFrame::entities)
            .collect()
    }
}
