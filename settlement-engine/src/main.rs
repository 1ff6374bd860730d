//! settle - operator CLI for the settlement engine
//!
//! Usage:
//!   settle --directory league.json --club c1 import-chippix --week 2026-01-05 --file rows.json
//!   settle --directory league.json --club c1 apply --week 2026-01-05
//!   settle --directory league.json --club c1 lock --week 2026-01-05 --force
//!
//! Every command prints an `ApiResponse` JSON envelope on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use settlement_engine::{
    ApiResponse, AppError, EngineConfig, EngineError, ErrorCode, InMemoryDirectory, LockMode,
    LockOutcome, NewMovement, SettlementEngine, SettlementStorage, init_logger_with_file,
};
use shared::models::{
    Balance, ChipPixRow, EntityRef, OfxRow, PaymentMethod, VerificationReport, WeekKey,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "settle")]
#[command(about = "Weekly league settlement: import, link, post, reconcile and lock")]
struct Args {
    /// Directory JSON with clubs, weeks, agents and players
    #[arg(long, env = "DIRECTORY_FILE")]
    directory: PathBuf,

    /// Club to operate on
    #[arg(long, env = "CLUB_ID")]
    club: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import parsed bank statement rows (JSON array)
    ImportOfx {
        #[arg(long)]
        week: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Import parsed ChipPix rows (JSON array)
    ImportChippix {
        #[arg(long)]
        week: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Discard a statement's imported rows
    ClearImports {
        #[arg(long)]
        week: String,
        #[arg(long, value_enum)]
        method: StatementMethod,
    },
    /// Link an imported row to an entity
    Link {
        #[arg(long)]
        week: String,
        #[arg(long)]
        txn: String,
        #[arg(long, value_enum)]
        kind: EntityKind,
        #[arg(long)]
        id: String,
    },
    /// Ignore an imported row
    Ignore {
        #[arg(long)]
        week: String,
        #[arg(long)]
        txn: String,
    },
    /// Put an ignored row back
    Restore {
        #[arg(long)]
        week: String,
        #[arg(long)]
        txn: String,
    },
    /// Post one row, or every linked row when --txn is omitted
    Apply {
        #[arg(long)]
        week: String,
        #[arg(long)]
        txn: Option<String>,
    },
    /// Undo the posting of a row
    Revert {
        #[arg(long)]
        week: String,
        #[arg(long)]
        txn: String,
    },
    /// Stage a manual movement (JSON object)
    Stage {
        #[arg(long)]
        week: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Post a staged movement
    ApplyMovement {
        #[arg(long)]
        week: String,
        #[arg(long)]
        movement: String,
        /// Post even when a similar entry was just posted
        #[arg(long, default_value = "false")]
        confirm: bool,
    },
    /// Reject a staged movement
    RejectMovement {
        #[arg(long)]
        week: String,
        #[arg(long)]
        movement: String,
    },
    /// Delete a ledger entry, restaging whatever pointed at it
    DeleteEntry {
        #[arg(long)]
        week: String,
        #[arg(long)]
        entry: String,
    },
    /// Set a rakeback override for one week
    SetRate {
        #[arg(long)]
        week: String,
        #[arg(long, value_enum)]
        kind: EntityKind,
        #[arg(long)]
        id: String,
        #[arg(long)]
        rate: Decimal,
    },
    /// Drop a rakeback override
    ClearRate {
        #[arg(long)]
        week: String,
        #[arg(long, value_enum)]
        kind: EntityKind,
        #[arg(long)]
        id: String,
    },
    /// Reconcile statements against the ledger
    Verify {
        #[arg(long)]
        week: String,
    },
    /// Lock a week
    Lock {
        #[arg(long)]
        week: String,
        /// Lock even when verification fails
        #[arg(long, default_value = "false")]
        force: bool,
    },
    Unlock {
        #[arg(long)]
        week: String,
    },
    Ledger {
        #[arg(long)]
        week: String,
    },
    /// Balances carried into a week
    CarryForward {
        #[arg(long)]
        week: String,
    },
    /// End-of-week balances
    Balances {
        #[arg(long)]
        week: String,
    },
    /// Per-entity settlement of a week
    Statement {
        #[arg(long)]
        week: String,
    },
    /// Club totals and taxes
    Financials {
        #[arg(long)]
        week: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatementMethod {
    Ofx,
    Chippix,
}

impl From<StatementMethod> for PaymentMethod {
    fn from(method: StatementMethod) -> Self {
        match method {
            StatementMethod::Ofx => PaymentMethod::Ofx,
            StatementMethod::Chippix => PaymentMethod::ChipPix,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntityKind {
    Agent,
    Player,
    Club,
    Expense,
}

impl EntityKind {
    fn entity(self, id: String) -> EntityRef {
        match self {
            EntityKind::Agent => EntityRef::Agent(id),
            EntityKind::Player => EntityRef::Player(id),
            EntityKind::Club => EntityRef::Club(id),
            EntityKind::Expense => EntityRef::Expense(id),
        }
    }
}

/// Balance keyed by entity; JSON object keys must be strings
#[derive(Serialize)]
struct EntityBalance {
    entity: EntityRef,
    #[serde(flatten)]
    balance: Balance,
}

#[derive(Serialize)]
struct CarriedBalance {
    entity: EntityRef,
    value: Decimal,
}

fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let config = EngineConfig::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    let args = Args::parse();

    let directory = InMemoryDirectory::from_json(
        &std::fs::read_to_string(&args.directory)
            .with_context(|| format!("Failed to read directory file {}", args.directory.display()))?,
    )
    .context("Failed to parse directory file")?;

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("Failed to create work dir {}", config.work_dir))?;
    let storage = SettlementStorage::open(config.db_path()).context("Failed to open database")?;
    let engine = SettlementEngine::new(args.club.clone(), storage, Arc::new(directory), config)
        .context("Failed to start settlement engine")?;

    match execute(&engine, args.command) {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&ApiResponse::success(data))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let app_error = match e.downcast::<EngineError>() {
                Ok(engine_error) => AppError::from(engine_error),
                Err(other) => match other.downcast::<AppError>() {
                    Ok(app_error) => app_error,
                    Err(other) => AppError::with_message(ErrorCode::InvalidRequest, format!("{:#}", other)),
                },
            };
            tracing::warn!(code = ?app_error.code, "Command failed: {}", app_error.message);
            println!("{}", serde_json::to_string_pretty(&ApiResponse::<()>::error(&app_error))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn execute(engine: &SettlementEngine, command: Command) -> Result<serde_json::Value> {
    let value = match command {
        Command::ImportOfx { week, file } => {
            let rows: Vec<OfxRow> = read_json(&file)?;
            to_json(engine.import_ofx(&WeekKey::new(week), &rows)?)?
        }
        Command::ImportChippix { week, file } => {
            let rows: Vec<ChipPixRow> = read_json(&file)?;
            to_json(engine.import_chippix(&WeekKey::new(week), &rows)?)?
        }
        Command::ClearImports { week, method } => {
            to_json(engine.clear_imports(&WeekKey::new(week), method.into())?)?
        }
        Command::Link { week, txn, kind, id } => {
            to_json(engine.link_transaction(&WeekKey::new(week), &txn, kind.entity(id))?)?
        }
        Command::Ignore { week, txn } => to_json(engine.ignore_transaction(&WeekKey::new(week), &txn)?)?,
        Command::Restore { week, txn } => to_json(engine.restore_transaction(&WeekKey::new(week), &txn)?)?,
        Command::Apply { week, txn: Some(txn) } => {
            to_json(engine.apply_transaction(&WeekKey::new(week), &txn)?)?
        }
        Command::Apply { week, txn: None } => to_json(engine.apply_transactions(&WeekKey::new(week))?)?,
        Command::Revert { week, txn } => to_json(engine.revert_transaction(&WeekKey::new(week), &txn)?)?,
        Command::Stage { week, file } => {
            let input: NewMovement = read_json(&file)?;
            to_json(engine.stage_movement(&WeekKey::new(week), input)?)?
        }
        Command::ApplyMovement {
            week,
            movement,
            confirm,
        } => to_json(engine.apply_movement(&WeekKey::new(week), &movement, confirm)?)?,
        Command::RejectMovement { week, movement } => {
            to_json(engine.reject_movement(&WeekKey::new(week), &movement)?)?
        }
        Command::DeleteEntry { week, entry } => {
            to_json(engine.delete_ledger_entry(&WeekKey::new(week), &entry)?)?
        }
        Command::SetRate { week, kind, id, rate } => {
            let week = WeekKey::new(week);
            let entity = kind.entity(id);
            engine.set_rate_override(&week, &entity, rate)?;
            to_json(engine.resolve_rate(&week, &entity)?)?
        }
        Command::ClearRate { week, kind, id } => {
            let week = WeekKey::new(week);
            let entity = kind.entity(id);
            engine.clear_rate_override(&week, &entity)?;
            to_json(engine.resolve_rate(&week, &entity)?)?
        }
        Command::Verify { week } => to_json(engine.verify(&WeekKey::new(week))?)?,
        Command::Lock { week, force } => {
            let mode = if force { LockMode::Override } else { LockMode::Strict };
            match engine.lock_week(&WeekKey::new(week), mode)? {
                LockOutcome::Locked(snapshot) => to_json(snapshot)?,
                LockOutcome::Blocked(report) => return Err(reconciliation_error(&report).into()),
            }
        }
        Command::Unlock { week } => to_json(engine.unlock_week(&WeekKey::new(week))?)?,
        Command::Ledger { week } => to_json(engine.list_ledger(&WeekKey::new(week))?)?,
        Command::CarryForward { week } => {
            let carried: Vec<_> = engine
                .get_carry_forward(&WeekKey::new(week))?
                .into_iter()
                .map(|(entity, value)| CarriedBalance { entity, value })
                .collect();
            to_json(carried)?
        }
        Command::Balances { week } => {
            let balances: Vec<_> = engine
                .balances_at(&WeekKey::new(week))?
                .into_iter()
                .map(|(entity, balance)| EntityBalance { entity, balance })
                .collect();
            to_json(balances)?
        }
        Command::Statement { week } => to_json(engine.settlement_statement(&WeekKey::new(week))?)?,
        Command::Financials { week } => to_json(engine.club_financials(&WeekKey::new(week))?)?,
    };
    Ok(value)
}

/// Strict lock refused; failing checks travel as details
fn reconciliation_error(report: &VerificationReport) -> AppError {
    let failures = report.failures().cloned().collect::<Vec<_>>();
    AppError::with_message(
        ErrorCode::ReconciliationMismatch,
        format!("{} reconciliation checks failed; use --force to lock anyway", failures.len()),
    )
    .with_detail("failures", serde_json::to_value(failures).unwrap_or_default())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).map_err(|e| {
        anyhow::Error::new(
            AppError::with_message(ErrorCode::InvalidFormat, format!("Failed to parse {}: {}", path.display(), e))
                .with_detail("file", path.display().to_string()),
        )
    })
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}
