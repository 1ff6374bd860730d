//! Rakeback Rate Resolver
//!
//! Precedence, first hit wins:
//! 1. the week's snapshot (frozen at lock)
//! 2. a manual override (week override table, then the player's own override)
//! 3. the default rate of the entity's agent, or 0
//!
//! Resolution depends only on the snapshot and the live tables handed in, so
//! any historical week resolves deterministically.

use crate::error::{EngineError, EngineResult};
use crate::money::validate_rate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{Agent, EntityRef, Player, WeekSnapshot};
use std::collections::BTreeMap;

/// Manual per-entity rate overrides of one club week
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOverrides {
    #[serde(default)]
    pub agents: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub players: BTreeMap<String, Decimal>,
}

impl RateOverrides {
    pub fn get(&self, entity: &EntityRef) -> Option<Decimal> {
        match entity {
            EntityRef::Agent(id) => self.agents.get(id).copied(),
            EntityRef::Player(id) => self.players.get(id).copied(),
            EntityRef::Club(_) | EntityRef::Expense(_) => None,
        }
    }

    /// Set an override after validating the rate
    pub fn set(&mut self, entity: &EntityRef, rate: Decimal) -> EngineResult<()> {
        validate_rate(rate, "rakeback rate")?;
        match entity {
            EntityRef::Agent(id) => self.agents.insert(id.clone(), rate),
            EntityRef::Player(id) => self.players.insert(id.clone(), rate),
            EntityRef::Club(_) | EntityRef::Expense(_) => {
                return Err(EngineError::Validation(format!(
                    "{} has no rakeback rate",
                    entity
                )));
            }
        };
        Ok(())
    }

    /// Returns true if an override was removed
    pub fn clear(&mut self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Agent(id) => self.agents.remove(id).is_some(),
            EntityRef::Player(id) => self.players.remove(id).is_some(),
            EntityRef::Club(_) | EntityRef::Expense(_) => false,
        }
    }
}

/// Live rate inputs of one week
#[derive(Debug, Clone, Copy)]
pub struct LiveRates<'a> {
    pub overrides: &'a RateOverrides,
    pub agents: &'a [Agent],
    pub players: &'a [Player],
}

impl<'a> LiveRates<'a> {
    pub fn new(overrides: &'a RateOverrides, agents: &'a [Agent], players: &'a [Player]) -> Self {
        Self {
            overrides,
            agents,
            players,
        }
    }

    /// Tier 2 then tier 3
    pub fn resolve(&self, entity: &EntityRef) -> Decimal {
        if let Some(rate) = self.overrides.get(entity) {
            return rate;
        }
        match entity {
            EntityRef::Agent(id) => self
                .agents
                .iter()
                .find(|a| &a.id == id)
                .and_then(|a| a.default_rb_rate)
                .unwrap_or(Decimal::ZERO),
            EntityRef::Player(id) => {
                let Some(player) = self.players.iter().find(|p| &p.id == id) else {
                    return Decimal::ZERO;
                };
                if let Some(rate) = player.rb_rate_override {
                    return rate;
                }
                self.agents
                    .iter()
                    .find(|a| player.belongs_to(&a.name))
                    .and_then(|a| a.default_rb_rate)
                    .unwrap_or(Decimal::ZERO)
            }
            EntityRef::Club(_) | EntityRef::Expense(_) => Decimal::ZERO,
        }
    }

    /// Resolved live rate of every agent and player, keyed by id
    pub fn tables(&self) -> (BTreeMap<String, Decimal>, BTreeMap<String, Decimal>) {
        let agents = self
            .agents
            .iter()
            .map(|a| (a.id.clone(), self.resolve(&EntityRef::agent(&a.id))))
            .collect();
        let players = self
            .players
            .iter()
            .map(|p| (p.id.clone(), self.resolve(&EntityRef::player(&p.id))))
            .collect();
        (agents, players)
    }
}

/// Effective rakeback rate of an entity for a week
pub fn resolve_rate(snapshot: Option<&WeekSnapshot>, live: &LiveRates<'_>, entity: &EntityRef) -> Decimal {
    snapshot
        .and_then(|s| s.rate_for(entity))
        .unwrap_or_else(|| live.resolve(entity))
}
