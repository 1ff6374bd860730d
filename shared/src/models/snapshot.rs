//! Week snapshot - frozen rates and balances of a locked week
//!
//! The snapshot carries a SHA-256 `digest` over its content. It is written
//! once per lock action and never edited; `verify_digest` detects a record
//! that was altered after the fact.

use super::entity::EntityRef;
use super::week::WeekKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Snapshot of a locked week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSnapshot {
    pub club_id: String,
    pub week: WeekKey,
    /// Unix millis of the lock action that produced this snapshot
    pub locked_at: i64,
    /// Agent id → rakeback percent
    pub rb_rates_by_agent: BTreeMap<String, Decimal>,
    /// Player id → rakeback percent
    pub rb_rates_by_player: BTreeMap<String, Decimal>,
    /// End-of-week balance owed by each entity
    #[serde(with = "entity_map")]
    pub balances_by_entity: BTreeMap<EntityRef, Decimal>,
    /// Whether the reconciliation checks passed at lock time
    pub verification_ok: bool,
    /// Hex SHA-256 over every other field
    #[serde(default)]
    pub digest: String,
}

/// Digest input, everything except the digest itself
#[derive(Serialize)]
struct DigestContent<'a> {
    club_id: &'a str,
    week: &'a WeekKey,
    locked_at: i64,
    rb_rates_by_agent: &'a BTreeMap<String, Decimal>,
    rb_rates_by_player: &'a BTreeMap<String, Decimal>,
    balances_by_entity: Vec<(&'a EntityRef, &'a Decimal)>,
    verification_ok: bool,
}

impl WeekSnapshot {
    pub fn new(
        club_id: impl Into<String>,
        week: WeekKey,
        locked_at: i64,
        rb_rates_by_agent: BTreeMap<String, Decimal>,
        rb_rates_by_player: BTreeMap<String, Decimal>,
        balances_by_entity: BTreeMap<EntityRef, Decimal>,
        verification_ok: bool,
    ) -> Self {
        let mut snapshot = Self {
            club_id: club_id.into(),
            week,
            locked_at,
            rb_rates_by_agent,
            rb_rates_by_player,
            balances_by_entity,
            verification_ok,
            digest: String::new(),
        };
        snapshot.digest = snapshot.compute_digest();
        snapshot
    }

    /// Frozen rakeback rate for an agent or player
    pub fn rate_for(&self, entity: &EntityRef) -> Option<Decimal> {
        match entity {
            EntityRef::Agent(id) => self.rb_rates_by_agent.get(id).copied(),
            EntityRef::Player(id) => self.rb_rates_by_player.get(id).copied(),
            EntityRef::Club(_) | EntityRef::Expense(_) => None,
        }
    }

    /// Frozen end-of-week balance for an entity
    pub fn balance_for(&self, entity: &EntityRef) -> Option<Decimal> {
        self.balances_by_entity.get(entity).copied()
    }

    /// Compute the content digest
    ///
    /// BTreeMap ordering keeps the JSON canonical.
    pub fn compute_digest(&self) -> String {
        let content = DigestContent {
            club_id: &self.club_id,
            week: &self.week,
            locked_at: self.locked_at,
            rb_rates_by_agent: &self.rb_rates_by_agent,
            rb_rates_by_player: &self.rb_rates_by_player,
            balances_by_entity: self.balances_by_entity.iter().collect(),
            verification_ok: self.verification_ok,
        };
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Returns true if the stored digest matches the content
    pub fn verify_digest(&self) -> bool {
        !self.digest.is_empty() && self.digest == self.compute_digest()
    }
}

/// Lock flag of a week
///
/// Removing this record unlocks the week; the snapshot is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekLock {
    pub week: WeekKey,
    pub locked_at: i64,
    /// Locked through the override path despite failing verification
    #[serde(default)]
    pub overridden: bool,
}

/// Serde adapter for `BTreeMap<EntityRef, V>` as a list of `[entity, value]`
/// pairs, since JSON object keys must be strings.
pub mod entity_map {
    use super::EntityRef;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<EntityRef, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<EntityRef, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let pairs = Vec::<(EntityRef, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
