//! Week key - opaque, totally ordered identifier of a settlement week

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Week key, usually the ISO date of the week's first day (`2026-01-05`)
///
/// Ordering is plain string ordering, which matches chronological order for
/// ISO dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekKey(String);

impl WeekKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_date(start: NaiveDate) -> Self {
        Self(start.format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WeekKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_weeks_sort_chronologically() {
        let mut weeks = vec![
            WeekKey::new("2026-02-02"),
            WeekKey::from_date(NaiveDate::from_ymd_opt(2025, 12, 29).unwrap()),
            WeekKey::new("2026-01-05"),
        ];
        weeks.sort();
        assert_eq!(weeks[0].as_str(), "2025-12-29");
        assert_eq!(weeks[2].as_str(), "2026-02-02");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&WeekKey::new("2026-01-05")).unwrap();
        assert_eq!(json, "\"2026-01-05\"");
    }
}
