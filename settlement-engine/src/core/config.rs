use std::path::PathBuf;
use std::str::FromStr;

/// How a retained snapshot of an unlocked week is treated
///
/// Unlocking keeps the snapshot record. `Honor` keeps reading it (carry-forward
/// short-circuits and frozen rates still apply, logged as stale reads);
/// `Ignore` consults snapshots of currently locked weeks only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetainedSnapshotPolicy {
    #[default]
    Honor,
    Ignore,
}

impl FromStr for RetainedSnapshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "honor" => Ok(Self::Honor),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown retained snapshot policy: {}", other)),
        }
    }
}

/// Engine configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | Database directory |
/// | DB_FILE | settlement.redb | Database file name |
/// | LOG_LEVEL | info | Log level |
/// | LOG_DIR | (unset) | Daily rolling log files |
/// | DUPLICATE_WINDOW_SECS | 120 | Possible-duplicate window |
/// | MEMO_KEY_MAX_LEN | 48 | Memo cache key length |
/// | MIN_PREFIX_DIGITS | 4 | Numeric-prefix match minimum |
/// | MIN_CONTAINMENT_LEN | 5 | Containment match minimum |
/// | MIN_NAME_LEN | 3 | Shortest name a memo may match |
/// | RETAINED_SNAPSHOT_POLICY | honor | `honor` or `ignore` |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/srv/league DUPLICATE_WINDOW_SECS=300 settle verify --club c1 --week 2026-01-05
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub work_dir: String,
    pub db_file: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// Window for the same-entity same-amount duplicate heuristic
    pub duplicate_window_secs: u64,
    pub memo_key_max_len: usize,
    pub min_prefix_digits: usize,
    pub min_containment_len: usize,
    pub min_name_len: usize,
    pub retained_snapshot_policy: RetainedSnapshotPolicy,
}

impl EngineConfig {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or(defaults.work_dir),
            db_file: std::env::var("DB_FILE").unwrap_or(defaults.db_file),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            duplicate_window_secs: env_parse("DUPLICATE_WINDOW_SECS")
                .unwrap_or(defaults.duplicate_window_secs),
            memo_key_max_len: env_parse("MEMO_KEY_MAX_LEN").unwrap_or(defaults.memo_key_max_len),
            min_prefix_digits: env_parse("MIN_PREFIX_DIGITS").unwrap_or(defaults.min_prefix_digits),
            min_containment_len: env_parse("MIN_CONTAINMENT_LEN")
                .unwrap_or(defaults.min_containment_len),
            min_name_len: env_parse("MIN_NAME_LEN").unwrap_or(defaults.min_name_len),
            retained_snapshot_policy: env_parse("RETAINED_SNAPSHOT_POLICY")
                .unwrap_or(defaults.retained_snapshot_policy),
        }
    }

    /// Full path of the database file
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.db_file)
    }

    /// Duplicate window in milliseconds, matching ledger timestamps
    pub fn duplicate_window_millis(&self) -> i64 {
        i64::try_from(self.duplicate_window_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            db_file: "settlement.redb".into(),
            log_level: "info".into(),
            log_dir: None,
            duplicate_window_secs: 120,
            memo_key_max_len: 48,
            min_prefix_digits: 4,
            min_containment_len: 5,
            min_name_len: 3,
            retained_snapshot_policy: RetainedSnapshotPolicy::Honor,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
