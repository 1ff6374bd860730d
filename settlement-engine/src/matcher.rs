//! Entity Matcher
//!
//! Resolves a statement row to a league entity. Tiers run in order and the
//! first hit wins:
//!
//! | Tier | Rule |
//! |------|------|
//! | 1 | memo cache (learned from manual links) |
//! | 2 | exact id against player id, player external id or agent id |
//! | 3 | leading digit run of the row id, exact again |
//! | 4 | containment between row id and candidate id |
//! | 5 | candidate name contained in the memo |
//! | 6 | sibling club name contained in the memo |
//!
//! No hit leaves the row pending for a manual link.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::models::{Agent, Club, EntityRef, Player};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    MemoCache,
    ExactId,
    NumericPrefix,
    Containment,
    FuzzyName,
    ClubName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub entity: EntityRef,
    pub label: String,
    pub tier: MatchTier,
}

/// Matching thresholds
#[derive(Debug, Clone, Copy)]
pub struct MatcherSettings {
    pub memo_key_max_len: usize,
    pub min_prefix_digits: usize,
    pub min_containment_len: usize,
    /// Names shorter than this never fuzzy-match
    pub min_name_len: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            memo_key_max_len: 48,
            min_prefix_digits: 4,
            min_containment_len: 5,
            min_name_len: 3,
        }
    }
}

/// Entities a row may resolve to
#[derive(Debug, Clone, Copy)]
pub struct Candidates<'a> {
    pub players: &'a [Player],
    pub agents: &'a [Agent],
    pub sibling_clubs: &'a [Club],
}

impl Candidates<'_> {
    /// Display label of an entity, falling back to its id
    pub fn label_of(&self, entity: &EntityRef) -> String {
        let found = match entity {
            EntityRef::Player(id) => self
                .players
                .iter()
                .find(|p| &p.id == id)
                .map(|p| p.nickname.clone()),
            EntityRef::Agent(id) => self
                .agents
                .iter()
                .find(|a| &a.id == id)
                .map(|a| a.name.clone()),
            EntityRef::Club(id) => self
                .sibling_clubs
                .iter()
                .find(|c| &c.id == id)
                .map(|c| c.name.clone()),
            EntityRef::Expense(_) => None,
        };
        found.unwrap_or_else(|| entity.id().to_string())
    }
}

/// Lowercase, keep ASCII alphanumerics only, truncate to `max_len`
pub fn normalize_memo(memo: &str, max_len: usize) -> String {
    memo.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(max_len)
        .collect()
}

fn normalize_name(name: &str) -> String {
    normalize_memo(name, usize::MAX)
}

/// First run of ASCII digits in `id`
fn leading_digit_run(id: &str) -> Option<&str> {
    let start = id.find(|c: char| c.is_ascii_digit())?;
    let rest = &id[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Learned memo → entity links of one club
///
/// In-memory mirror of the persisted `memo_cache` table. Last write wins.
#[derive(Debug)]
pub struct MemoCache {
    entries: RwLock<HashMap<String, EntityRef>>,
    max_len: usize,
}

impl MemoCache {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_len,
        }
    }

    /// Load persisted entries (already normalized keys)
    pub fn load(&self, entries: impl IntoIterator<Item = (String, EntityRef)>) -> usize {
        let mut cache = self.entries.write();
        let before = cache.len();
        cache.extend(entries);
        cache.len() - before
    }

    pub fn key_for(&self, memo: &str) -> String {
        normalize_memo(memo, self.max_len)
    }

    pub fn lookup(&self, memo: &str) -> Option<EntityRef> {
        let key = self.key_for(memo);
        if key.is_empty() {
            return None;
        }
        self.entries.read().get(&key).cloned()
    }

    /// Remember a link; returns the key written, or None for an empty memo
    pub fn learn(&self, memo: &str, entity: EntityRef) -> Option<String> {
        let key = self.key_for(memo);
        if key.is_empty() {
            return None;
        }
        self.entries.write().insert(key.clone(), entity);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Tiered matcher over one set of candidates
pub struct EntityMatcher<'a> {
    settings: MatcherSettings,
    cache: &'a MemoCache,
    candidates: Candidates<'a>,
}

impl<'a> EntityMatcher<'a> {
    pub fn new(settings: MatcherSettings, cache: &'a MemoCache, candidates: Candidates<'a>) -> Self {
        Self {
            settings,
            cache,
            candidates,
        }
    }

    /// Resolve a row by its embedded id and memo
    pub fn resolve(&self, row_id: &str, memo: &str) -> Option<MatchOutcome> {
        let outcome = self
            .by_memo_cache(memo)
            .or_else(|| self.by_exact_id(row_id).map(|e| (e, MatchTier::ExactId)))
            .or_else(|| self.by_numeric_prefix(row_id))
            .or_else(|| self.by_containment(row_id))
            .or_else(|| self.by_name(memo))
            .or_else(|| self.by_club_name(memo))
            .map(|(entity, tier)| MatchOutcome {
                label: self.candidates.label_of(&entity),
                entity,
                tier,
            });

        match &outcome {
            Some(m) => tracing::debug!(row_id, entity = %m.entity, tier = ?m.tier, "Matched statement row"),
            None => tracing::debug!(row_id, memo, "No match for statement row"),
        }
        outcome
    }

    fn by_memo_cache(&self, memo: &str) -> Option<(EntityRef, MatchTier)> {
        self.cache.lookup(memo).map(|e| (e, MatchTier::MemoCache))
    }

    fn by_exact_id(&self, id: &str) -> Option<EntityRef> {
        if id.is_empty() {
            return None;
        }
        if let Some(p) = self
            .candidates
            .players
            .iter()
            .find(|p| p.id == id || (!p.external_id.is_empty() && p.external_id == id))
        {
            return Some(EntityRef::player(&p.id));
        }
        self.candidates
            .agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| EntityRef::agent(&a.id))
    }

    fn by_numeric_prefix(&self, id: &str) -> Option<(EntityRef, MatchTier)> {
        let digits = leading_digit_run(id)?;
        if digits.len() < self.settings.min_prefix_digits || digits.len() == id.len() {
            return None;
        }
        self.by_exact_id(digits)
            .map(|e| (e, MatchTier::NumericPrefix))
    }

    fn by_containment(&self, id: &str) -> Option<(EntityRef, MatchTier)> {
        let min = self.settings.min_containment_len;
        let id = id.to_ascii_lowercase();
        if id.len() < min {
            return None;
        }
        let overlaps = |candidate: &str| {
            let candidate = candidate.to_ascii_lowercase();
            candidate.len() >= min && (id.contains(&candidate) || candidate.contains(&id))
        };

        if let Some(p) = self
            .candidates
            .players
            .iter()
            .find(|p| overlaps(&p.id) || overlaps(&p.external_id))
        {
            return Some((EntityRef::player(&p.id), MatchTier::Containment));
        }
        self.candidates
            .agents
            .iter()
            .find(|a| overlaps(&a.id))
            .map(|a| (EntityRef::agent(&a.id), MatchTier::Containment))
    }

    fn by_name(&self, memo: &str) -> Option<(EntityRef, MatchTier)> {
        let min_name = self.settings.min_name_len;
        let memo = normalize_name(memo);
        if memo.is_empty() {
            return None;
        }
        let named = |name: &str| {
            let name = normalize_name(name);
            name.len() >= min_name && memo.contains(&name)
        };

        if let Some(p) = self.candidates.players.iter().find(|p| named(&p.nickname)) {
            return Some((EntityRef::player(&p.id), MatchTier::FuzzyName));
        }
        self.candidates
            .agents
            .iter()
            .find(|a| named(&a.name))
            .map(|a| (EntityRef::agent(&a.id), MatchTier::FuzzyName))
    }

    fn by_club_name(&self, memo: &str) -> Option<(EntityRef, MatchTier)> {
        let min_name = self.settings.min_name_len;
        let memo = normalize_name(memo);
        if memo.is_empty() {
            return None;
        }
        self.candidates
            .sibling_clubs
            .iter()
            .find(|c| {
                let name = normalize_name(&c.name);
                name.len() >= min_name && memo.contains(&name)
            })
            .map(|c| (EntityRef::club(&c.id), MatchTier::ClubName))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn player(id: &str, external_id: &str, nickname: &str) -> Player {
        Player {
            id: id.to_string(),
            external_id: external_id.to_string(),
            nickname: nickname.to_string(),
            agent_name: "ABC".to_string(),
            rake: Decimal::ZERO,
            winnings: Decimal::ZERO,
            ggr: Decimal::ZERO,
            rb_rate_override: None,
        }
    }

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            default_rb_rate: None,
            is_direct: false,
        }
    }

    fn club(id: &str, name: &str) -> Club {
        Club {
            id: id.to_string(),
            name: name.to_string(),
            icon: None,
            logo: None,
        }
    }

    struct Fixture {
        players: Vec<Player>,
        agents: Vec<Agent>,
        clubs: Vec<Club>,
        cache: MemoCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                players: vec![
                    player("1610051", "", "Joao"),
                    player("p-2", "884422", "Maria Silva"),
                ],
                agents: vec![agent("ag-77", "Tubarao")],
                clubs: vec![club("c2", "Royal Flush")],
                cache: MemoCache::new(48),
            }
        }

        fn matcher(&self) -> EntityMatcher<'_> {
            EntityMatcher::new(
                MatcherSettings::default(),
                &self.cache,
                Candidates {
                    players: &self.players,
                    agents: &self.agents,
                    sibling_clubs: &self.clubs,
                },
            )
        }
    }

    #[test]
    fn test_normalize_memo() {
        assert_eq!(normalize_memo("PIX - João Silva!", 48), "pixjoosilva");
        assert_eq!(normalize_memo("ABCDEF", 3), "abc");
        assert_eq!(normalize_memo("  --  ", 48), "");
    }

    #[test]
    fn test_leading_digit_run() {
        assert_eq!(leading_digit_run("cp_1610051AG"), Some("1610051"));
        assert_eq!(leading_digit_run("1610051"), Some("1610051"));
        assert_eq!(leading_digit_run("abc"), None);
    }

    #[test]
    fn test_exact_id_and_external_id() {
        let f = Fixture::new();
        let m = f.matcher().resolve("1610051", "").unwrap();
        assert_eq!(m.entity, EntityRef::player("1610051"));
        assert_eq!(m.tier, MatchTier::ExactId);
        assert_eq!(m.label, "Joao");

        let m = f.matcher().resolve("884422", "").unwrap();
        assert_eq!(m.entity, EntityRef::player("p-2"));

        let m = f.matcher().resolve("ag-77", "").unwrap();
        assert_eq!(m.entity, EntityRef::agent("ag-77"));
    }

    #[test]
    fn test_numeric_prefix_strips_platform_tag() {
        let f = Fixture::new();
        let m = f.matcher().resolve("cp_1610051AG", "").unwrap();
        assert_eq!(m.entity, EntityRef::player("1610051"));
        assert_eq!(m.tier, MatchTier::NumericPrefix);
    }

    #[test]
    fn test_numeric_prefix_requires_minimum_digits() {
        let mut f = Fixture::new();
        f.players.push(player("161", "", "Short"));
        // "161" is below the minimum digit run; containment also needs 5 chars
        assert!(f.matcher().resolve("x161y", "").is_none());
    }

    #[test]
    fn test_containment() {
        let f = Fixture::new();
        let m = f.matcher().resolve("ref8844221", "").unwrap();
        // Leading digit run 8844221 matches nothing exactly; containment does
        assert_eq!(m.entity, EntityRef::player("p-2"));
        assert_eq!(m.tier, MatchTier::Containment);
    }

    #[test]
    fn test_fuzzy_name_and_club_name() {
        let f = Fixture::new();
        let m = f.matcher().resolve("TED001", "PIX RECEBIDO MARIA SILVA").unwrap();
        assert_eq!(m.entity, EntityRef::player("p-2"));
        assert_eq!(m.tier, MatchTier::FuzzyName);

        let m = f.matcher().resolve("TED002", "transf tubarao").unwrap();
        assert_eq!(m.entity, EntityRef::agent("ag-77"));

        let m = f.matcher().resolve("TED003", "ACERTO ROYAL-FLUSH SEMANA").unwrap();
        assert_eq!(m.entity, EntityRef::club("c2"));
        assert_eq!(m.tier, MatchTier::ClubName);
        assert_eq!(m.label, "Royal Flush");
    }

    #[test]
    fn test_min_name_len_is_configurable() {
        let mut f = Fixture::new();
        f.agents.push(agent("ag-9", "Bia"));
        assert_eq!(
            f.matcher().resolve("TED004", "pix bia").map(|m| m.entity),
            Some(EntityRef::agent("ag-9"))
        );

        let strict = MatcherSettings {
            min_name_len: 4,
            ..MatcherSettings::default()
        };
        let candidates = Candidates {
            players: &f.players,
            agents: &f.agents,
            sibling_clubs: &f.clubs,
        };
        assert!(EntityMatcher::new(strict, &f.cache, candidates)
            .resolve("TED004", "pix bia")
            .is_none());
    }

    #[test]
    fn test_no_match() {
        let f = Fixture::new();
        assert!(f.matcher().resolve("TED999", "pagamento diverso").is_none());
    }

    #[test]
    fn test_memo_cache_beats_exact_id() {
        let f = Fixture::new();
        f.cache.learn("Pix Joao", EntityRef::agent("ag-77"));

        let m = f.matcher().resolve("1610051", "PIX JOAO").unwrap();
        assert_eq!(m.entity, EntityRef::agent("ag-77"));
        assert_eq!(m.tier, MatchTier::MemoCache);
    }

    #[test]
    fn test_memo_cache_last_write_wins() {
        let cache = MemoCache::new(48);
        assert_eq!(cache.learn("pix joao", EntityRef::player("a")), Some("pixjoao".to_string()));
        cache.learn("PIX-JOAO", EntityRef::player("b"));
        assert_eq!(cache.lookup("pix joao"), Some(EntityRef::player("b")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.learn("--", EntityRef::player("c")), None);
    }
}
