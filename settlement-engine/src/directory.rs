//! Entity directory
//!
//! Clubs, their week timelines and the agents and players active in each
//! week live outside the engine. The engine only reads them through
//! [`EntityDirectory`].

use crate::fees::FeeRates;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::models::{Agent, Club, Player, WeekKey};
use std::collections::BTreeMap;

/// Read-only source of league entities
pub trait EntityDirectory: Send + Sync {
    fn club(&self, club_id: &str) -> Option<Club>;

    /// The club's weeks (any order; the engine sorts)
    fn weeks(&self, club_id: &str) -> Vec<WeekKey>;

    fn agents(&self, club_id: &str, week: &WeekKey) -> Vec<Agent>;

    fn players(&self, club_id: &str, week: &WeekKey) -> Vec<Player>;

    /// Other clubs of the league, used to tag inter-club transfers
    fn sibling_clubs(&self, club_id: &str) -> Vec<Club>;

    fn fee_rates(&self, club_id: &str) -> FeeRates;
}

/// Directory file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryData {
    #[serde(default)]
    pub clubs: Vec<ClubRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubRecord {
    #[serde(flatten)]
    pub club: Club,
    #[serde(default)]
    pub fee_rates: FeeRates,
    #[serde(default)]
    pub weeks: Vec<WeekRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekRecord {
    pub week: WeekKey,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub players: Vec<Player>,
}

/// In-memory directory (operator binary and tests)
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    clubs: RwLock<BTreeMap<String, ClubRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: DirectoryData) -> Self {
        let clubs = data
            .clubs
            .into_iter()
            .map(|record| (record.club.id.clone(), record))
            .collect();
        Self {
            clubs: RwLock::new(clubs),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let data: DirectoryData = serde_json::from_str(json)?;
        Ok(Self::from_data(data))
    }

    /// Add or replace a club, keeping its weeks if it already exists
    pub fn upsert_club(&self, club: Club, fee_rates: FeeRates) {
        let mut clubs = self.clubs.write();
        match clubs.get_mut(&club.id) {
            Some(record) => {
                record.club = club;
                record.fee_rates = fee_rates;
            }
            None => {
                clubs.insert(
                    club.id.clone(),
                    ClubRecord {
                        club,
                        fee_rates,
                        weeks: Vec::new(),
                    },
                );
            }
        }
    }

    /// Add or replace one week of a club, creating the club if needed
    pub fn upsert_week(&self, club_id: &str, week: WeekKey, agents: Vec<Agent>, players: Vec<Player>) {
        let mut clubs = self.clubs.write();
        let record = clubs
            .entry(club_id.to_string())
            .or_insert_with(|| ClubRecord {
                club: Club {
                    id: club_id.to_string(),
                    name: club_id.to_string(),
                    icon: None,
                    logo: None,
                },
                fee_rates: FeeRates::default(),
                weeks: Vec::new(),
            });
        let new_week = WeekRecord {
            week,
            agents,
            players,
        };
        match record.weeks.iter_mut().find(|w| w.week == new_week.week) {
            Some(existing) => *existing = new_week,
            None => record.weeks.push(new_week),
        }
    }

    fn with_week<T>(&self, club_id: &str, week: &WeekKey, f: impl FnOnce(&WeekRecord) -> T) -> Option<T> {
        let clubs = self.clubs.read();
        clubs
            .get(club_id)
            .and_then(|c| c.weeks.iter().find(|w| &w.week == week))
            .map(f)
    }
}

impl EntityDirectory for InMemoryDirectory {
    fn club(&self, club_id: &str) -> Option<Club> {
        self.clubs.read().get(club_id).map(|c| c.club.clone())
    }

    fn weeks(&self, club_id: &str) -> Vec<WeekKey> {
        self.clubs
            .read()
            .get(club_id)
            .map(|c| c.weeks.iter().map(|w| w.week.clone()).collect())
            .unwrap_or_default()
    }

    fn agents(&self, club_id: &str, week: &WeekKey) -> Vec<Agent> {
        self.with_week(club_id, week, |w| w.agents.clone())
            .unwrap_or_default()
    }

    fn players(&self, club_id: &str, week: &WeekKey) -> Vec<Player> {
        self.with_week(club_id, week, |w| w.players.clone())
            .unwrap_or_default()
    }

    fn sibling_clubs(&self, club_id: &str) -> Vec<Club> {
        self.clubs
            .read()
            .values()
            .filter(|c| c.club.id != club_id)
            .map(|c| c.club.clone())
            .collect()
    }

    fn fee_rates(&self, club_id: &str) -> FeeRates {
        self.clubs
            .read()
            .get(club_id)
            .map(|c| c.fee_rates)
            .unwrap_or_default()
    }
}
