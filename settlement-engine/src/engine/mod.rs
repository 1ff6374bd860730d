//! SettlementEngine - per-club settlement service
//!
//! Owns every mutation path of a club's weeks: statement imports, linking,
//! posting to the ledger, rate overrides and week locks. Each mutation runs
//! in a single redb write transaction, so the ledger and the staging
//! collections it touches change together or not at all.
//!
//! # Concurrency
//!
//! One active editor per club week is assumed. The engine does not order
//! concurrent callers; redb serializes write transactions, and the memo cache
//! is last-write-wins.
//!
//! # Flow
//!
//! ```text
//! import_ofx / import_chippix ──▶ matcher ──▶ imports (pending | linked)
//!        link / lock / ignore ──▶ imports
//!  apply_transaction(s)       ──▶ ledger + imports (one transaction)
//!  verify ──▶ lock_week ──▶ snapshots + week_locks
//! ```

use crate::carry_forward::{CarryForward, WeekFrame};
use crate::core::{EngineConfig, RetainedSnapshotPolicy};
use crate::directory::EntityDirectory;
use crate::error::{EngineError, EngineResult};
use crate::fees::{ClubFinancials, compute_club_financials};
use crate::ledger::{self, Posting};
use crate::lock::{LockMode, LockOutcome, build_snapshot};
use crate::matcher::{Candidates, EntityMatcher, MatcherSettings, MemoCache};
use crate::money::{validate_amount, validate_rate};
use crate::rates::{LiveRates, resolve_rate};
use crate::staging::{ImportedTransaction, MovementStatus, NewMovement, StagedMovement, TransitionError};
use crate::storage::{SettlementStorage, StorageError};
use crate::verify;
use chrono::NaiveDate;
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{
    ApplyFailure, ApplyOutcome, ApplySummary, Balance, ChipPixRow, EntityRef, EntitySettlement,
    ImportSummary, LedgerEntry, OfxRow, PaymentMethod, VerificationReport, WeekKey, WeekLock,
    WeekSnapshot,
};
use shared::util::now_millis;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Settlement service of one club
pub struct SettlementEngine {
    club_id: String,
    storage: SettlementStorage,
    directory: Arc<dyn EntityDirectory>,
    config: EngineConfig,
    memo_cache: MemoCache,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("club_id", &self.club_id)
            .field("memo_cache_size", &self.memo_cache.len())
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Create the engine for a club and warm the memo cache from storage
    pub fn new(
        club_id: impl Into<String>,
        storage: SettlementStorage,
        directory: Arc<dyn EntityDirectory>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let club_id = club_id.into();
        let memo_cache = MemoCache::new(config.memo_key_max_len);
        let restored = memo_cache.load(storage.memo_entries(&club_id)?);
        tracing::info!(club_id = %club_id, restored, "Settlement engine ready");

        Ok(Self {
            club_id,
            storage,
            directory,
            config,
            memo_cache,
        })
    }

    pub fn club_id(&self) -> &str {
        &self.club_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========== Timeline and locks ==========

    /// The club's weeks, oldest first
    pub fn timeline(&self) -> Vec<WeekKey> {
        let mut weeks = self.directory.weeks(&self.club_id);
        weeks.sort();
        weeks.dedup();
        weeks
    }

    fn week_index(&self, weeks: &[WeekKey], week: &WeekKey) -> EngineResult<usize> {
        weeks
            .binary_search(week)
            .map_err(|_| EngineError::UnknownWeek(week.clone()))
    }

    fn ensure_known_week(&self, week: &WeekKey) -> EngineResult<()> {
        self.week_index(&self.timeline(), week).map(|_| ())
    }

    /// Agents and players must be active in the week; clubs must be siblings
    fn ensure_entity(&self, week: &WeekKey, entity: &EntityRef) -> EngineResult<()> {
        let known = match entity {
            EntityRef::Agent(id) => self
                .directory
                .agents(&self.club_id, week)
                .iter()
                .any(|a| &a.id == id),
            EntityRef::Player(id) => self
                .directory
                .players(&self.club_id, week)
                .iter()
                .any(|p| &p.id == id),
            EntityRef::Club(id) => self
                .directory
                .sibling_clubs(&self.club_id)
                .iter()
                .any(|c| &c.id == id),
            EntityRef::Expense(_) => true,
        };
        if known {
            Ok(())
        } else {
            Err(EngineError::EntityNotFound(entity.clone()))
        }
    }

    pub fn is_locked(&self, week: &WeekKey) -> EngineResult<bool> {
        Ok(self.storage.week_lock(&self.club_id, week)?.is_some())
    }

    fn ensure_unlocked(&self, txn: &WriteTransaction, week: &WeekKey) -> EngineResult<()> {
        if self.storage.week_lock_txn(txn, &self.club_id, week)?.is_some() {
            return Err(EngineError::week_locked(&self.club_id, week));
        }
        Ok(())
    }

    /// Snapshot consulted for a week under the retained-snapshot policy
    fn effective_snapshot(&self, week: &WeekKey, locked: bool) -> EngineResult<Option<WeekSnapshot>> {
        let Some(snapshot) = self.storage.snapshot(&self.club_id, week)? else {
            return Ok(None);
        };
        if !snapshot.verify_digest() {
            tracing::error!(club_id = %self.club_id, week = %week, "Snapshot digest mismatch");
        }
        if locked {
            return Ok(Some(snapshot));
        }
        match self.config.retained_snapshot_policy {
            RetainedSnapshotPolicy::Honor => {
                tracing::warn!(
                    club_id = %self.club_id,
                    week = %week,
                    locked_at = snapshot.locked_at,
                    "Reading retained snapshot of an unlocked week"
                );
                Ok(Some(snapshot))
            }
            RetainedSnapshotPolicy::Ignore => Ok(None),
        }
    }

    fn load_frame(&self, week: &WeekKey) -> EngineResult<WeekFrame> {
        let locked = self.is_locked(week)?;
        Ok(WeekFrame {
            week: week.clone(),
            locked,
            snapshot: self.effective_snapshot(week, locked)?,
            ledger: self.storage.ledger(&self.club_id, week)?,
            agents: self.directory.agents(&self.club_id, week),
            players: self.directory.players(&self.club_id, week),
            overrides: self.storage.rate_overrides(&self.club_id, week)?,
        })
    }

    /// Frames of the timeline up to and including `week`, and its index
    fn frames_through(&self, week: &WeekKey) -> EngineResult<(Vec<WeekFrame>, usize)> {
        let weeks = self.timeline();
        let index = self.week_index(&weeks, week)?;
        let frames = weeks[..=index]
            .iter()
            .map(|w| self.load_frame(w))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok((frames, index))
    }

    pub fn week_snapshot(&self, week: &WeekKey) -> EngineResult<Option<WeekSnapshot>> {
        Ok(self.storage.snapshot(&self.club_id, week)?)
    }

    // ========== Imports ==========

    /// Import parsed bank statement rows
    pub fn import_ofx(&self, week: &WeekKey, rows: &[OfxRow]) -> EngineResult<ImportSummary> {
        let rows = rows.iter().map(ImportedTransaction::from_ofx).collect();
        self.import_rows(week, PaymentMethod::Ofx, rows)
    }

    /// Import parsed ChipPix export rows
    pub fn import_chippix(&self, week: &WeekKey, rows: &[ChipPixRow]) -> EngineResult<ImportSummary> {
        let fallback_date = week_start(week);
        let rows = rows
            .iter()
            .map(|r| ImportedTransaction::from_chippix(r, fallback_date))
            .collect();
        self.import_rows(week, PaymentMethod::ChipPix, rows)
    }

    fn import_rows(
        &self,
        week: &WeekKey,
        method: PaymentMethod,
        rows: Vec<ImportedTransaction>,
    ) -> EngineResult<ImportSummary> {
        self.ensure_known_week(week)?;

        let players = self.directory.players(&self.club_id, week);
        let agents = self.directory.agents(&self.club_id, week);
        let sibling_clubs = self.directory.sibling_clubs(&self.club_id);
        let matcher = EntityMatcher::new(
            self.matcher_settings(),
            &self.memo_cache,
            Candidates {
                players: &players,
                agents: &agents,
                sibling_clubs: &sibling_clubs,
            },
        );

        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut imports = self.storage.imports_txn(&txn, &self.club_id, week)?;
        let mut seen: HashSet<(PaymentMethod, String)> = imports
            .iter()
            .map(|r| (r.method(), r.id.clone()))
            .collect();

        let mut summary = ImportSummary::default();
        for mut row in rows {
            if !seen.insert((row.method(), row.id.clone())) {
                summary.already_present += 1;
                continue;
            }
            if let Some(hit) = matcher.resolve(&row.id, &row.memo) {
                row.link(hit.entity, hit.label)?;
                summary.auto_linked += 1;
            }
            imports.push(row);
            summary.imported += 1;
        }

        self.storage
            .put_imports_txn(&txn, &self.club_id, week, &imports)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            method = %method,
            imported = summary.imported,
            already_present = summary.already_present,
            auto_linked = summary.auto_linked,
            "Statement imported"
        );
        Ok(summary)
    }

    /// Discard a statement's imported rows so it can be imported again
    ///
    /// Ledger entries stay; re-applying re-imported rows is absorbed by the
    /// external-ref guard.
    pub fn clear_imports(&self, week: &WeekKey, method: PaymentMethod) -> EngineResult<usize> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut imports = self.storage.imports_txn(&txn, &self.club_id, week)?;
        let before = imports.len();
        imports.retain(|r| r.method() != method);
        let removed = before - imports.len();
        self.storage
            .put_imports_txn(&txn, &self.club_id, week, &imports)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(club_id = %self.club_id, week = %week, method = %method, removed, "Imports cleared");
        Ok(removed)
    }

    pub fn list_imports(&self, week: &WeekKey) -> EngineResult<Vec<ImportedTransaction>> {
        Ok(self.storage.imports(&self.club_id, week)?)
    }

    fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            memo_key_max_len: self.config.memo_key_max_len,
            min_prefix_digits: self.config.min_prefix_digits,
            min_containment_len: self.config.min_containment_len,
            min_name_len: self.config.min_name_len,
        }
    }

    // ========== Row transitions ==========

    /// Run a transition on one imported row inside a write transaction
    fn update_import<T>(
        &self,
        week: &WeekKey,
        txn_id: &str,
        f: impl FnOnce(&mut ImportedTransaction) -> EngineResult<T>,
    ) -> EngineResult<(T, ImportedTransaction)> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut imports = self.storage.imports_txn(&txn, &self.club_id, week)?;
        let row = imports
            .iter_mut()
            .find(|r| r.id == txn_id)
            .ok_or_else(|| EngineError::TransactionNotFound(txn_id.to_string()))?;
        let value = f(row)?;
        let updated = row.clone();
        self.storage
            .put_imports_txn(&txn, &self.club_id, week, &imports)?;
        txn.commit().map_err(StorageError::from)?;
        Ok((value, updated))
    }

    /// Manually link a row and teach the memo cache
    pub fn link_transaction(
        &self,
        week: &WeekKey,
        txn_id: &str,
        entity: EntityRef,
    ) -> EngineResult<ImportedTransaction> {
        self.ensure_known_week(week)?;
        self.ensure_entity(week, &entity)?;
        let players = self.directory.players(&self.club_id, week);
        let agents = self.directory.agents(&self.club_id, week);
        let sibling_clubs = self.directory.sibling_clubs(&self.club_id);
        let label = Candidates {
            players: &players,
            agents: &agents,
            sibling_clubs: &sibling_clubs,
        }
        .label_of(&entity);

        let ((), row) = self.update_import(week, txn_id, |row| {
            row.link(entity.clone(), label)?;
            Ok(())
        })?;

        if let Some(key) = self.memo_cache.learn(&row.memo, entity.clone()) {
            self.storage.put_memo(&self.club_id, &key, &entity)?;
        }

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            txn_id,
            entity = %entity,
            "Transaction linked"
        );
        Ok(row)
    }

    /// Freeze a linked ChipPix row before posting
    pub fn lock_transaction(&self, week: &WeekKey, txn_id: &str) -> EngineResult<ImportedTransaction> {
        let ((), row) = self.update_import(week, txn_id, |row| Ok(row.lock()?))?;
        tracing::info!(club_id = %self.club_id, week = %week, txn_id, "Transaction locked");
        Ok(row)
    }

    pub fn ignore_transaction(&self, week: &WeekKey, txn_id: &str) -> EngineResult<ImportedTransaction> {
        let ((), row) = self.update_import(week, txn_id, |row| Ok(row.ignore()?))?;
        tracing::info!(club_id = %self.club_id, week = %week, txn_id, "Transaction ignored");
        Ok(row)
    }

    pub fn restore_transaction(&self, week: &WeekKey, txn_id: &str) -> EngineResult<ImportedTransaction> {
        let ((), row) = self.update_import(week, txn_id, |row| Ok(row.restore()?))?;
        tracing::info!(club_id = %self.club_id, week = %week, txn_id, status = %row.status(), "Transaction restored");
        Ok(row)
    }

    // ========== Posting ==========

    fn apply_in_txn(&self, txn: &WriteTransaction, week: &WeekKey, txn_id: &str) -> EngineResult<ApplyOutcome> {
        let mut imports = self.storage.imports_txn(txn, &self.club_id, week)?;
        let mut entries = self.storage.ledger_txn(txn, &self.club_id, week)?;
        let row = imports
            .iter_mut()
            .find(|r| r.id == txn_id)
            .ok_or_else(|| EngineError::TransactionNotFound(txn_id.to_string()))?;

        if row.is_applied() {
            return Ok(ApplyOutcome::AlreadyApplied(
                row.applied_movement_id.clone().unwrap_or_default(),
            ));
        }
        let Some(entity) = row.entity.clone() else {
            return Err(EngineError::UnresolvedEntity(txn_id.to_string()));
        };
        if !row.is_ready() {
            return Err(TransitionError::new("apply", row.status()).into());
        }
        if row.is_zero_impact() {
            return Err(EngineError::Validation(format!(
                "transaction {} has no financial impact",
                txn_id
            )));
        }

        let external_ref = row.external_ref();
        let existing_id = ledger::find_by_external_ref(&entries, &external_ref).map(|e| e.id.clone());
        let outcome = match existing_id {
            Some(existing_id) => {
                tracing::warn!(
                    club_id = %self.club_id,
                    week = %week,
                    txn_id,
                    external_ref = %external_ref,
                    existing_id = %existing_id,
                    "Duplicate posting skipped"
                );
                row.mark_applied(existing_id.clone())?;
                ApplyOutcome::Duplicate(existing_id)
            }
            None => {
                let entry = Posting {
                    entity: entity.clone(),
                    direction: row.direction(),
                    amount: row.amount(),
                    fee: row.taxa,
                    method: row.method(),
                    external_ref: Some(external_ref),
                    timestamp: now_millis(),
                    description: row.memo.clone(),
                }
                .into_entry(&self.club_id, week);
                row.mark_applied(entry.id.clone())?;
                tracing::info!(
                    club_id = %self.club_id,
                    week = %week,
                    txn_id,
                    entry_id = %entry.id,
                    entity = %entity,
                    amount = %entry.amount,
                    direction = ?entry.direction,
                    "Transaction applied"
                );
                let id = entry.id.clone();
                entries.push(entry);
                ApplyOutcome::Applied(id)
            }
        };

        self.storage
            .put_imports_txn(txn, &self.club_id, week, &imports)?;
        self.storage
            .put_ledger_txn(txn, &self.club_id, week, &entries)?;
        Ok(outcome)
    }

    /// Post one imported row to the ledger
    pub fn apply_transaction(&self, week: &WeekKey, txn_id: &str) -> EngineResult<ApplyOutcome> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let outcome = self.apply_in_txn(&txn, week, txn_id)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(outcome)
    }

    /// Post every linked or locked row, continuing past failures
    ///
    /// Each row commits on its own, so an interrupted run leaves finished rows
    /// applied and a rerun only picks up the remainder.
    pub fn apply_transactions(&self, week: &WeekKey) -> EngineResult<ApplySummary> {
        if self.is_locked(week)? {
            return Err(EngineError::week_locked(&self.club_id, week));
        }

        let entries = self.storage.ledger(&self.club_id, week)?;
        let mut summary = ApplySummary::default();
        let mut ready = Vec::new();
        for row in self.storage.imports(&self.club_id, week)? {
            // A rerun over posted rows reports them as duplicates, posting nothing
            if row.is_applied() {
                let posted = row
                    .applied_movement_id
                    .as_ref()
                    .is_some_and(|id| entries.iter().any(|e| &e.id == id))
                    || ledger::find_by_external_ref(&entries, &row.external_ref()).is_some();
                if posted {
                    summary.duplicates += 1;
                }
                continue;
            }
            if !row.is_ready() {
                continue;
            }
            if row.is_zero_impact() {
                summary.zero_impact += 1;
            } else {
                ready.push(row.id);
            }
        }

        for txn_id in ready {
            match self.apply_transaction(week, &txn_id) {
                Ok(ApplyOutcome::Applied(_)) => summary.applied += 1,
                Ok(ApplyOutcome::Duplicate(_)) | Ok(ApplyOutcome::AlreadyApplied(_)) => {
                    summary.duplicates += 1
                }
                Err(e) => {
                    tracing::warn!(club_id = %self.club_id, week = %week, txn_id = %txn_id, error = %e, "Apply failed");
                    summary.failed += 1;
                    summary.failures.push(ApplyFailure {
                        txn_id,
                        code: e.code(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            applied = summary.applied,
            duplicates = summary.duplicates,
            failed = summary.failed,
            zero_impact = summary.zero_impact,
            "Bulk apply finished"
        );
        Ok(summary)
    }

    /// Undo the posting of an applied row
    ///
    /// The ledger entry is found by the id the row recorded, falling back to
    /// the row's external ref.
    pub fn revert_transaction(&self, week: &WeekKey, txn_id: &str) -> EngineResult<ImportedTransaction> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut imports = self.storage.imports_txn(&txn, &self.club_id, week)?;
        let mut entries = self.storage.ledger_txn(&txn, &self.club_id, week)?;
        let row = imports
            .iter_mut()
            .find(|r| r.id == txn_id)
            .ok_or_else(|| EngineError::TransactionNotFound(txn_id.to_string()))?;

        let entry_id = row.revert()?;
        let external_ref = row.external_ref();
        let target = entry_id
            .filter(|id| entries.iter().any(|e| &e.id == id))
            .or_else(|| ledger::find_by_external_ref(&entries, &external_ref).map(|e| e.id.clone()));
        let removed = target.and_then(|id| ledger::remove_entry(&mut entries, &id));
        match &removed {
            Some(entry) => tracing::info!(
                club_id = %self.club_id,
                week = %week,
                txn_id,
                entry_id = %entry.id,
                "Transaction reverted"
            ),
            None => tracing::warn!(
                club_id = %self.club_id,
                week = %week,
                txn_id,
                "Transaction reverted without a ledger entry to remove"
            ),
        }
        let updated = row.clone();

        self.storage
            .put_imports_txn(&txn, &self.club_id, week, &imports)?;
        self.storage
            .put_ledger_txn(&txn, &self.club_id, week, &entries)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(updated)
    }

    // ========== Manual movements ==========

    pub fn stage_movement(&self, week: &WeekKey, input: NewMovement) -> EngineResult<StagedMovement> {
        validate_amount(input.amount)?;
        self.ensure_known_week(week)?;

        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut staged = self.storage.staged_txn(&txn, &self.club_id, week)?;
        let movement = StagedMovement::new(
            Uuid::new_v4().to_string(),
            &self.club_id,
            week.clone(),
            input,
            now_millis(),
        );
        staged.push(movement.clone());
        self.storage
            .put_staged_txn(&txn, &self.club_id, week, &staged)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            movement_id = %movement.id,
            entity = %movement.entity,
            amount = %movement.amount,
            "Movement staged"
        );
        Ok(movement)
    }

    /// Post a staged movement
    ///
    /// Without an external ref, an entry for the same entity and amount inside
    /// the duplicate window is reported as `PossibleDuplicate` unless
    /// `confirm_duplicate` is set.
    pub fn apply_movement(
        &self,
        week: &WeekKey,
        movement_id: &str,
        confirm_duplicate: bool,
    ) -> EngineResult<ApplyOutcome> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut staged = self.storage.staged_txn(&txn, &self.club_id, week)?;
        let mut entries = self.storage.ledger_txn(&txn, &self.club_id, week)?;
        let movement = staged
            .iter_mut()
            .find(|m| m.id == movement_id)
            .ok_or_else(|| EngineError::MovementNotFound(movement_id.to_string()))?;

        if movement.status() == MovementStatus::Applied {
            return Ok(ApplyOutcome::AlreadyApplied(
                movement.applied_movement_id.clone().unwrap_or_default(),
            ));
        }

        let existing_id = movement
            .external_ref
            .as_ref()
            .and_then(|external_ref| ledger::find_by_external_ref(&entries, external_ref))
            .map(|e| e.id.clone());
        let outcome = if let Some(existing_id) = existing_id {
            tracing::warn!(
                club_id = %self.club_id,
                week = %week,
                movement_id,
                existing_id = %existing_id,
                "Duplicate posting skipped"
            );
            movement.mark_applied(existing_id.clone())?;
            ApplyOutcome::Duplicate(existing_id)
        } else {
            if movement.external_ref.is_none()
                && let Some(similar) = ledger::find_possible_duplicate(
                    &entries,
                    &movement.entity,
                    movement.amount,
                    movement.timestamp,
                    self.config.duplicate_window_millis(),
                )
            {
                if !confirm_duplicate {
                    tracing::warn!(
                        club_id = %self.club_id,
                        week = %week,
                        movement_id,
                        existing_id = %similar.id,
                        "Possible duplicate movement"
                    );
                    return Err(EngineError::PossibleDuplicate {
                        entity: movement.entity.clone(),
                        amount: movement.amount,
                        existing_id: similar.id.clone(),
                    });
                }
                tracing::warn!(
                    club_id = %self.club_id,
                    week = %week,
                    movement_id,
                    existing_id = %similar.id,
                    "Possible duplicate confirmed by operator"
                );
            }

            let entry = Posting {
                entity: movement.entity.clone(),
                direction: movement.direction,
                amount: movement.amount,
                fee: Decimal::ZERO,
                method: movement.method,
                external_ref: movement.external_ref.clone(),
                timestamp: movement.timestamp,
                description: movement.description.clone(),
            }
            .into_entry(&self.club_id, week);
            movement.mark_applied(entry.id.clone())?;
            tracing::info!(
                club_id = %self.club_id,
                week = %week,
                movement_id,
                entry_id = %entry.id,
                entity = %entry.entity,
                amount = %entry.amount,
                "Movement applied"
            );
            let id = entry.id.clone();
            entries.push(entry);
            ApplyOutcome::Applied(id)
        };

        self.storage
            .put_staged_txn(&txn, &self.club_id, week, &staged)?;
        self.storage
            .put_ledger_txn(&txn, &self.club_id, week, &entries)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(outcome)
    }

    pub fn reject_movement(&self, week: &WeekKey, movement_id: &str) -> EngineResult<StagedMovement> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut staged = self.storage.staged_txn(&txn, &self.club_id, week)?;
        let movement = staged
            .iter_mut()
            .find(|m| m.id == movement_id)
            .ok_or_else(|| EngineError::MovementNotFound(movement_id.to_string()))?;
        movement.reject()?;
        let updated = movement.clone();
        self.storage
            .put_staged_txn(&txn, &self.club_id, week, &staged)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(club_id = %self.club_id, week = %week, movement_id, "Movement rejected");
        Ok(updated)
    }

    pub fn list_staged(&self, week: &WeekKey) -> EngineResult<Vec<StagedMovement>> {
        Ok(self.storage.staged(&self.club_id, week)?)
    }

    // ========== Ledger ==========

    /// Posted entries of a week, oldest first
    pub fn list_ledger(&self, week: &WeekKey) -> EngineResult<Vec<LedgerEntry>> {
        let mut entries = self.storage.ledger(&self.club_id, week)?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Delete an entry and put whatever pointed at it back in staging
    pub fn delete_ledger_entry(&self, week: &WeekKey, entry_id: &str) -> EngineResult<LedgerEntry> {
        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut entries = self.storage.ledger_txn(&txn, &self.club_id, week)?;
        let removed = ledger::remove_entry(&mut entries, entry_id)
            .ok_or_else(|| EngineError::LedgerEntryNotFound(entry_id.to_string()))?;

        let mut imports = self.storage.imports_txn(&txn, &self.club_id, week)?;
        let mut reverted_rows = 0usize;
        for row in imports
            .iter_mut()
            .filter(|r| r.is_applied() && r.applied_movement_id.as_deref() == Some(entry_id))
        {
            row.revert()?;
            reverted_rows += 1;
        }

        let mut staged = self.storage.staged_txn(&txn, &self.club_id, week)?;
        let mut reverted_movements = 0usize;
        for movement in staged.iter_mut().filter(|m| {
            m.status() == MovementStatus::Applied && m.applied_movement_id.as_deref() == Some(entry_id)
        }) {
            movement.revert()?;
            reverted_movements += 1;
        }

        self.storage
            .put_ledger_txn(&txn, &self.club_id, week, &entries)?;
        self.storage
            .put_imports_txn(&txn, &self.club_id, week, &imports)?;
        self.storage
            .put_staged_txn(&txn, &self.club_id, week, &staged)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            entry_id,
            reverted_rows,
            reverted_movements,
            "Ledger entry deleted"
        );
        Ok(removed)
    }

    // ========== Rates ==========

    pub fn set_rate_override(&self, week: &WeekKey, entity: &EntityRef, rate: Decimal) -> EngineResult<()> {
        validate_rate(rate, "rakeback rate")?;
        self.ensure_known_week(week)?;
        self.ensure_entity(week, entity)?;

        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut overrides = self.storage.rate_overrides_txn(&txn, &self.club_id, week)?;
        overrides.set(entity, rate)?;
        self.storage
            .put_rate_overrides_txn(&txn, &self.club_id, week, &overrides)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(club_id = %self.club_id, week = %week, entity = %entity, rate = %rate, "Rate override set");
        Ok(())
    }

    /// Returns true if an override was removed
    pub fn clear_rate_override(&self, week: &WeekKey, entity: &EntityRef) -> EngineResult<bool> {
        self.ensure_known_week(week)?;

        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        let mut overrides = self.storage.rate_overrides_txn(&txn, &self.club_id, week)?;
        let removed = overrides.clear(entity);
        self.storage
            .put_rate_overrides_txn(&txn, &self.club_id, week, &overrides)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(club_id = %self.club_id, week = %week, entity = %entity, removed, "Rate override cleared");
        Ok(removed)
    }

    /// Effective rakeback rate of an entity for a week
    pub fn resolve_rate(&self, week: &WeekKey, entity: &EntityRef) -> EngineResult<Decimal> {
        self.ensure_known_week(week)?;
        let locked = self.is_locked(week)?;
        let snapshot = self.effective_snapshot(week, locked)?;
        let overrides = self.storage.rate_overrides(&self.club_id, week)?;
        let agents = self.directory.agents(&self.club_id, week);
        let players = self.directory.players(&self.club_id, week);
        let live = LiveRates::new(&overrides, &agents, &players);
        Ok(resolve_rate(snapshot.as_ref(), &live, entity))
    }

    // ========== Balances ==========

    /// Balances carried into `week` (end of the previous week)
    pub fn get_carry_forward(&self, week: &WeekKey) -> EngineResult<BTreeMap<EntityRef, Decimal>> {
        let (frames, index) = self.frames_through(week)?;
        let mut pass = CarryForward::new(&frames);
        Ok(pass
            .universe(index)
            .into_iter()
            .map(|entity| {
                let balance = pass.balance_before(&entity, index);
                (entity, balance.value)
            })
            .collect())
    }

    /// End-of-week balances with their status
    pub fn balances_at(&self, week: &WeekKey) -> EngineResult<BTreeMap<EntityRef, Balance>> {
        let (frames, index) = self.frames_through(week)?;
        let mut pass = CarryForward::new(&frames);
        Ok(pass
            .universe(index)
            .into_iter()
            .map(|entity| {
                let balance = pass.balance_at(&entity, index);
                (entity, balance)
            })
            .collect())
    }

    // ========== Verification and locking ==========

    pub fn verify(&self, week: &WeekKey) -> EngineResult<VerificationReport> {
        let imports = self.storage.imports(&self.club_id, week)?;
        let entries = self.storage.ledger(&self.club_id, week)?;
        let report = verify::verify(&imports, &entries);
        if !report.ok {
            tracing::info!(
                club_id = %self.club_id,
                week = %week,
                failures = report.failures().count(),
                "Verification found mismatches"
            );
        }
        Ok(report)
    }

    /// Freeze a week's rates and balances
    ///
    /// `Strict` refuses when verification fails and hands the report back;
    /// `Override` proceeds and records the override on the lock.
    pub fn lock_week(&self, week: &WeekKey, mode: LockMode) -> EngineResult<LockOutcome> {
        if self.is_locked(week)? {
            return Err(EngineError::week_locked(&self.club_id, week));
        }
        let report = self.verify(week)?;
        if !report.ok {
            match mode {
                LockMode::Strict => {
                    tracing::warn!(club_id = %self.club_id, week = %week, "Lock blocked by verification");
                    return Ok(LockOutcome::Blocked(report));
                }
                LockMode::Override => {
                    tracing::warn!(
                        club_id = %self.club_id,
                        week = %week,
                        "Locking despite failing verification"
                    );
                }
            }
        }

        let (frames, index) = self.frames_through(week)?;
        let locked_at = now_millis();
        let snapshot = build_snapshot(&self.club_id, frames, index, report.ok, locked_at)
            .ok_or_else(|| EngineError::UnknownWeek(week.clone()))?;

        let txn = self.storage.begin_write()?;
        self.ensure_unlocked(&txn, week)?;
        self.storage.put_snapshot_txn(&txn, &snapshot)?;
        self.storage.put_week_lock_txn(
            &txn,
            &self.club_id,
            &WeekLock {
                week: week.clone(),
                locked_at,
                overridden: !report.ok,
            },
        )?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            club_id = %self.club_id,
            week = %week,
            entities = snapshot.balances_by_entity.len(),
            verification_ok = report.ok,
            digest = %snapshot.digest,
            "Week locked"
        );
        Ok(LockOutcome::Locked(snapshot))
    }

    /// Clear the lock flag; the snapshot is retained
    pub fn unlock_week(&self, week: &WeekKey) -> EngineResult<bool> {
        let txn = self.storage.begin_write()?;
        let removed = self
            .storage
            .remove_week_lock_txn(&txn, &self.club_id, week)?;
        txn.commit().map_err(StorageError::from)?;

        if removed {
            tracing::info!(club_id = %self.club_id, week = %week, "Week unlocked");
        }
        Ok(removed)
    }

    // ========== Reporting ==========

    /// Per-entity settlement ("acerto") of a week
    pub fn settlement_statement(&self, week: &WeekKey) -> EngineResult<Vec<EntitySettlement>> {
        let (frames, index) = self.frames_through(week)?;
        let frame = &frames[index];
        let sibling_clubs = self.directory.sibling_clubs(&self.club_id);
        let candidates = Candidates {
            players: &frame.players,
            agents: &frame.agents,
            sibling_clubs: &sibling_clubs,
        };

        let mut pass = CarryForward::new(&frames);
        let universe = pass.universe(index);
        let statement = universe
            .into_iter()
            .map(|entity| {
                let previous = pass.balance_before(&entity, index);
                let current = pass.balance_at(&entity, index);
                let block = frame.settle(&entity).unwrap_or_default();
                EntitySettlement {
                    label: candidates.label_of(&entity),
                    previous_balance: previous.value,
                    winnings: block.winnings,
                    rake: block.rake,
                    rb_rate: match entity {
                        EntityRef::Agent(_) | EntityRef::Player(_) => frame.rate(&entity),
                        EntityRef::Club(_) | EntityRef::Expense(_) => Decimal::ZERO,
                    },
                    rakeback: block.rakeback,
                    resultado: block.resultado,
                    ledger_net: frame.ledger_net(&entity),
                    balance: current.value,
                    status: current.status,
                    entity,
                }
            })
            .collect();
        Ok(statement)
    }

    /// Club totals and taxes of a week
    pub fn club_financials(&self, week: &WeekKey) -> EngineResult<ClubFinancials> {
        self.ensure_known_week(week)?;
        let rates = self.directory.fee_rates(&self.club_id);
        rates.validate()?;
        let players = self.directory.players(&self.club_id, week);
        Ok(compute_club_financials(&players, &rates))
    }
}

/// First day of a week key, falling back to today
fn week_start(week: &WeekKey) -> NaiveDate {
    NaiveDate::parse_from_str(week.as_str(), "%Y-%m-%d")
        .unwrap_or_else(|_| chrono::Utc::now().date_naive())
}

#[cfg(test)]
mod tests;
