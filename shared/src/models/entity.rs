//! League entities: clubs, agents, players and the typed entity reference

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to anything money can be settled against
///
/// Serialized as `{"kind": "player", "id": "1610051"}`. The `Display` form
/// (`player:1610051`) is for logs only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// Agent settled as one block for all its players
    Agent(String),
    /// Player settled individually (players of direct agents)
    Player(String),
    /// Sibling club (inter-club transfers)
    Club(String),
    /// Expense bucket
    Expense(String),
}

impl EntityRef {
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    pub fn player(id: impl Into<String>) -> Self {
        Self::Player(id.into())
    }

    pub fn club(id: impl Into<String>) -> Self {
        Self::Club(id.into())
    }

    pub fn expense(id: impl Into<String>) -> Self {
        Self::Expense(id.into())
    }

    /// Raw id without the kind
    pub fn id(&self) -> &str {
        match self {
            Self::Agent(id) | Self::Player(id) | Self::Club(id) | Self::Expense(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent(_) => "agent",
            Self::Player(_) => "player",
            Self::Club(_) => "club",
            Self::Expense(_) => "expense",
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Club identity and branding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// Agent record as provided by the entity directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// Default rakeback percent (0..=100)
    #[serde(default)]
    pub default_rb_rate: Option<Decimal>,
    /// Players of a direct agent are settled individually
    #[serde(default)]
    pub is_direct: bool,
}

/// Player weekly statistics as provided by the entity directory
///
/// Belongs to an agent by name, not by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Platform id printed on payment-processor exports
    #[serde(default)]
    pub external_id: String,
    pub nickname: String,
    pub agent_name: String,
    #[serde(default)]
    pub rake: Decimal,
    #[serde(default)]
    pub winnings: Decimal,
    #[serde(default)]
    pub ggr: Decimal,
    /// Per-player rakeback percent carried on the player record
    #[serde(default)]
    pub rb_rate_override: Option<Decimal>,
}

impl Player {
    /// Whether this player is grouped under the given agent name
    pub fn belongs_to(&self, agent_name: &str) -> bool {
        self.agent_name.trim().eq_ignore_ascii_case(agent_name.trim())
    }
}
