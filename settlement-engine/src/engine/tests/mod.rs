use super::*;
use crate::directory::InMemoryDirectory;
use crate::fees::FeeRates;
use crate::staging::TxnStatus;
use shared::models::{Agent, BalanceStatus, Club, Direction, Player};
use std::str::FromStr;

const CLUB: &str = "c1";

fn w1() -> WeekKey {
    WeekKey::new("2026-01-05")
}

fn w2() -> WeekKey {
    WeekKey::new("2026-01-12")
}

fn w3() -> WeekKey {
    WeekKey::new("2026-01-19")
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn agent(id: &str, name: &str, rate: Option<u32>, is_direct: bool) -> Agent {
    Agent {
        id: id.to_string(),
        name: name.to_string(),
        default_rb_rate: rate.map(Decimal::from),
        is_direct,
    }
}

fn player(id: &str, external_id: &str, nickname: &str, agent_name: &str, rake: i64, winnings: i64) -> Player {
    Player {
        id: id.to_string(),
        external_id: external_id.to_string(),
        nickname: nickname.to_string(),
        agent_name: agent_name.to_string(),
        rake: Decimal::from(rake),
        winnings: Decimal::from(winnings),
        ggr: Decimal::ZERO,
        rb_rate_override: None,
    }
}

/// One week of play:
/// - agent a1 "ABC" (20%) with player p1 "Joao": rake 100, winnings −100
/// - direct agent d1 "DIRETO" with player p2 "Maria" (own rate 10%): rake 50, winnings 200
///
/// Resultados: a1 = −(−100 + 20) = 80, p2 = −(200 + 5) = −205
fn roster(a1_rate: u32) -> (Vec<Agent>, Vec<Player>) {
    let mut maria = player("p2", "2220001", "Maria", "DIRETO", 50, 200);
    maria.rb_rate_override = Some(Decimal::from(10));
    (
        vec![
            agent("a1", "ABC", Some(a1_rate), false),
            agent("d1", "DIRETO", None, true),
        ],
        vec![player("p1", "1610051", "Joao", "ABC", 100, -100), maria],
    )
}

fn create_test_directory() -> Arc<InMemoryDirectory> {
    let directory = InMemoryDirectory::new();
    directory.upsert_club(
        Club {
            id: CLUB.to_string(),
            name: "Clube Um".to_string(),
            icon: None,
            logo: None,
        },
        FeeRates {
            app: Decimal::from(8),
            liga: Decimal::from(10),
            rodeo_ggr: Decimal::from(12),
            rodeo_app: Decimal::from(18),
        },
    );
    directory.upsert_club(
        Club {
            id: "c2".to_string(),
            name: "Imperio".to_string(),
            icon: None,
            logo: None,
        },
        FeeRates::default(),
    );
    for week in [w1(), w2(), w3()] {
        let (agents, players) = roster(20);
        directory.upsert_week(CLUB, week, agents, players);
    }
    Arc::new(directory)
}

fn create_engine_with(directory: Arc<InMemoryDirectory>, config: EngineConfig) -> SettlementEngine {
    let storage = SettlementStorage::open_in_memory().unwrap();
    SettlementEngine::new(CLUB, storage, directory, config).unwrap()
}

fn create_test_engine() -> (SettlementEngine, Arc<InMemoryDirectory>) {
    let directory = create_test_directory();
    let engine = create_engine_with(directory.clone(), EngineConfig::default());
    (engine, directory)
}

fn chippix_row(id: &str, nome: &str, entrada: &str, saida: &str, taxa: &str) -> ChipPixRow {
    ChipPixRow {
        id_jog: id.to_string(),
        nome: nome.to_string(),
        entrada: dec(entrada),
        saida: dec(saida),
        taxa: dec(taxa),
        txns: 1,
        datas: vec![NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()],
    }
}

fn ofx_row(fitid: &str, amount: &str, memo: &str) -> OfxRow {
    OfxRow {
        fitid: fitid.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
        amount: dec(amount),
        memo: memo.to_string(),
        bank: "Banco X".to_string(),
    }
}

fn find_row(engine: &SettlementEngine, week: &WeekKey, id: &str) -> ImportedTransaction {
    engine
        .list_imports(week)
        .unwrap()
        .into_iter()
        .find(|r| r.id == id)
        .unwrap()
}

fn manual(entity: EntityRef, direction: Direction, amount: &str) -> NewMovement {
    NewMovement {
        entity,
        direction,
        amount: dec(amount),
        method: PaymentMethod::Pix,
        external_id: None,
        description: String::new(),
        timestamp: None,
    }
}

mod test_posting;
mod test_balances;
mod test_locking;
