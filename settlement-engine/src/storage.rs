//! redb-based storage layer for club week collections
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `ledger` | `club\|\|week` | `Vec<LedgerEntry>` | Posted movements |
//! | `imports` | `club\|\|week` | `Vec<ImportedTransaction>` | Statement rows and their status |
//! | `staged` | `club\|\|week` | `Vec<StagedMovement>` | Manual movements awaiting posting |
//! | `rate_overrides` | `club\|\|week` | `RateOverrides` | Live rakeback overrides |
//! | `snapshots` | `club\|\|week` | `WeekSnapshot` | Frozen week (kept across unlock) |
//! | `week_locks` | `club\|\|week` | `WeekLock` | Lock flag |
//! | `memo_cache` | `club\|\|memo` | `EntityRef` | Learned memo → entity links |
//!
//! Values are JSON and always read and written as whole collections. Callers
//! that must change two collections together do it inside one
//! `WriteTransaction` so both land or neither does.

use crate::rates::RateOverrides;
use crate::staging::{ImportedTransaction, StagedMovement};
use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{EntityRef, LedgerEntry, WeekKey, WeekLock, WeekSnapshot};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const LEDGER_TABLE: JsonTable = TableDefinition::new("ledger");
const IMPORTS_TABLE: JsonTable = TableDefinition::new("imports");
const STAGED_TABLE: JsonTable = TableDefinition::new("staged");
const RATE_OVERRIDES_TABLE: JsonTable = TableDefinition::new("rate_overrides");
const SNAPSHOTS_TABLE: JsonTable = TableDefinition::new("snapshots");
const WEEK_LOCKS_TABLE: JsonTable = TableDefinition::new("week_locks");
const MEMO_CACHE_TABLE: JsonTable = TableDefinition::new("memo_cache");

const ALL_TABLES: [JsonTable; 7] = [
    LEDGER_TABLE,
    IMPORTS_TABLE,
    STAGED_TABLE,
    RATE_OVERRIDES_TABLE,
    SNAPSHOTS_TABLE,
    WEEK_LOCKS_TABLE,
    MEMO_CACHE_TABLE,
];

const KEY_SEPARATOR: &str = "||";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Composite key of a club week collection
pub fn collection_key(club_id: &str, week: &WeekKey) -> String {
    format!("{}{}{}", club_id, KEY_SEPARATOR, week)
}

/// Settlement storage backed by redb
#[derive(Clone)]
pub struct SettlementStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for SettlementStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementStorage").finish_non_exhaustive()
    }
}

impl SettlementStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable once `commit()` returns (copy-on-write with an
    /// atomic root swap), so a crash mid-operation leaves the previous state.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and dry runs)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        for table in ALL_TABLES {
            let _ = write_txn.open_table(table)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Generic JSON access ==========

    fn get_json<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;
        let value = match table.get(key)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(value)
    }

    fn get_json_txn<T: DeserializeOwned>(
        txn: &WriteTransaction,
        def: JsonTable,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let table = txn.open_table(def)?;
        let value = match table.get(key)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(value)
    }

    fn put_json_txn<T: Serialize + ?Sized>(
        txn: &WriteTransaction,
        def: JsonTable,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(def)?;
        let bytes = serde_json::to_vec(value)?;
        table.insert(key, bytes.as_slice())?;
        Ok(())
    }

    fn remove_txn(txn: &WriteTransaction, def: JsonTable, key: &str) -> StorageResult<bool> {
        let mut table = txn.open_table(def)?;
        let removed = table.remove(key)?.is_some();
        Ok(removed)
    }

    // ========== Ledger ==========

    pub fn ledger(&self, club_id: &str, week: &WeekKey) -> StorageResult<Vec<LedgerEntry>> {
        Ok(self
            .get_json(LEDGER_TABLE, &collection_key(club_id, week))?
            .unwrap_or_default())
    }

    pub fn ledger_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<Vec<LedgerEntry>> {
        Ok(Self::get_json_txn(txn, LEDGER_TABLE, &collection_key(club_id, week))?.unwrap_or_default())
    }

    pub fn put_ledger_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
        entries: &[LedgerEntry],
    ) -> StorageResult<()> {
        Self::put_json_txn(txn, LEDGER_TABLE, &collection_key(club_id, week), entries)
    }

    // ========== Imported transactions ==========

    pub fn imports(&self, club_id: &str, week: &WeekKey) -> StorageResult<Vec<ImportedTransaction>> {
        Ok(self
            .get_json(IMPORTS_TABLE, &collection_key(club_id, week))?
            .unwrap_or_default())
    }

    pub fn imports_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<Vec<ImportedTransaction>> {
        Ok(Self::get_json_txn(txn, IMPORTS_TABLE, &collection_key(club_id, week))?.unwrap_or_default())
    }

    pub fn put_imports_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
        rows: &[ImportedTransaction],
    ) -> StorageResult<()> {
        Self::put_json_txn(txn, IMPORTS_TABLE, &collection_key(club_id, week), rows)
    }

    // ========== Staged movements ==========

    pub fn staged(&self, club_id: &str, week: &WeekKey) -> StorageResult<Vec<StagedMovement>> {
        Ok(self
            .get_json(STAGED_TABLE, &collection_key(club_id, week))?
            .unwrap_or_default())
    }

    pub fn staged_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<Vec<StagedMovement>> {
        Ok(Self::get_json_txn(txn, STAGED_TABLE, &collection_key(club_id, week))?.unwrap_or_default())
    }

    pub fn put_staged_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
        movements: &[StagedMovement],
    ) -> StorageResult<()> {
        Self::put_json_txn(txn, STAGED_TABLE, &collection_key(club_id, week), movements)
    }

    // ========== Rate overrides ==========

    pub fn rate_overrides(&self, club_id: &str, week: &WeekKey) -> StorageResult<RateOverrides> {
        Ok(self
            .get_json(RATE_OVERRIDES_TABLE, &collection_key(club_id, week))?
            .unwrap_or_default())
    }

    pub fn rate_overrides_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<RateOverrides> {
        Ok(
            Self::get_json_txn(txn, RATE_OVERRIDES_TABLE, &collection_key(club_id, week))?
                .unwrap_or_default(),
        )
    }

    pub fn put_rate_overrides_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
        overrides: &RateOverrides,
    ) -> StorageResult<()> {
        Self::put_json_txn(txn, RATE_OVERRIDES_TABLE, &collection_key(club_id, week), overrides)
    }

    // ========== Snapshots and locks ==========

    pub fn snapshot(&self, club_id: &str, week: &WeekKey) -> StorageResult<Option<WeekSnapshot>> {
        self.get_json(SNAPSHOTS_TABLE, &collection_key(club_id, week))
    }

    /// Store a snapshot, replacing any retained one for the same week
    pub fn put_snapshot_txn(&self, txn: &WriteTransaction, snapshot: &WeekSnapshot) -> StorageResult<()> {
        let key = collection_key(&snapshot.club_id, &snapshot.week);
        Self::put_json_txn(txn, SNAPSHOTS_TABLE, &key, snapshot)
    }

    pub fn week_lock(&self, club_id: &str, week: &WeekKey) -> StorageResult<Option<WeekLock>> {
        self.get_json(WEEK_LOCKS_TABLE, &collection_key(club_id, week))
    }

    pub fn week_lock_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<Option<WeekLock>> {
        Self::get_json_txn(txn, WEEK_LOCKS_TABLE, &collection_key(club_id, week))
    }

    pub fn put_week_lock_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        lock: &WeekLock,
    ) -> StorageResult<()> {
        Self::put_json_txn(txn, WEEK_LOCKS_TABLE, &collection_key(club_id, &lock.week), lock)
    }

    /// Returns true if a lock flag was removed
    pub fn remove_week_lock_txn(
        &self,
        txn: &WriteTransaction,
        club_id: &str,
        week: &WeekKey,
    ) -> StorageResult<bool> {
        Self::remove_txn(txn, WEEK_LOCKS_TABLE, &collection_key(club_id, week))
    }

    // ========== Memo cache ==========

    /// All learned memo links of a club
    pub fn memo_entries(&self, club_id: &str) -> StorageResult<Vec<(String, EntityRef)>> {
        let prefix = format!("{}{}", club_id, KEY_SEPARATOR);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMO_CACHE_TABLE)?;

        let mut entries = Vec::new();
        for result in table.range(prefix.as_str()..)? {
            let (key, value) = result?;
            let key = key.value();
            let Some(memo) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            let entity: EntityRef = serde_json::from_slice(value.value())?;
            entries.push((memo.to_string(), entity));
        }
        Ok(entries)
    }

    pub fn put_memo(&self, club_id: &str, memo_key: &str, entity: &EntityRef) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        let key = format!("{}{}{}", club_id, KEY_SEPARATOR, memo_key);
        Self::put_json_txn(&txn, MEMO_CACHE_TABLE, &key, entity)?;
        txn.commit()?;
        Ok(())
    }
}
