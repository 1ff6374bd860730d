use super::*;


fn lock(engine: &SettlementEngine, week: &WeekKey) -> WeekSnapshot {
    match engine.lock_week(week, LockMode::Strict).unwrap() {
        LockOutcome::Locked(snapshot) => snapshot,
        LockOutcome::Blocked(report) => panic!("lock blocked: {:?}", report),
    }
}

#[test]
fn test_lock_freezes_rates_and_balances() {
    let (engine, directory) = create_test_engine();
    engine
        .set_rate_override(&w1(), &EntityRef::agent("a1"), Decimal::from(25))
        .unwrap();

    let snapshot = lock(&engine, &w1());
    assert!(engine.is_locked(&w1()).unwrap());
    assert_eq!(snapshot.rb_rates_by_agent["a1"], Decimal::from(25));
    assert!(snapshot.verification_ok);
    assert_eq!(engine.week_snapshot(&w1()).unwrap(), Some(snapshot));

    // Directory data changes after the lock; the week keeps its frozen values
    let (agents, mut players) = roster(30);
    players[0].winnings = Decimal::from(-1000);
    directory.upsert_week(CLUB, w1(), agents, players);

    assert_eq!(engine.resolve_rate(&w1(), &EntityRef::agent("a1")).unwrap(), Decimal::from(25));
    let balance = engine.balances_at(&w1()).unwrap()[&EntityRef::agent("a1")];
    assert_eq!(balance.value, dec("75"));
    assert_eq!(balance.status, BalanceStatus::Locked);

    // The following week carries the frozen balance forward
    assert_eq!(engine.get_carry_forward(&w2()).unwrap()[&EntityRef::agent("a1")], dec("75"));
    assert_eq!(engine.balances_at(&w2()).unwrap()[&EntityRef::agent("a1")].value, dec("155"));
}


#[test]
fn test_locked_week_rejects_mutations() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();
    let ApplyOutcome::Applied(entry_id) = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap() else {
        panic!("apply should post");
    };
    lock(&engine, &w1());

    let is_locked = |r: EngineResult<()>| matches!(r, Err(EngineError::WeekLocked { .. }));
    let a1 = EntityRef::agent("a1");

    assert!(is_locked(
        engine
            .import_chippix(&w1(), &[chippix_row("cp_2220001x", "", "5", "0", "0")])
            .map(|_| ())
    ));
    assert!(is_locked(engine.clear_imports(&w1(), PaymentMethod::ChipPix).map(|_| ())));
    assert!(is_locked(engine.revert_transaction(&w1(), "cp_1610051AG").map(|_| ())));
    assert!(is_locked(engine.apply_transactions(&w1()).map(|_| ())));
    assert!(is_locked(engine.delete_ledger_entry(&w1(), &entry_id).map(|_| ())));
    assert!(is_locked(engine.set_rate_override(&w1(), &a1, Decimal::from(30))));
    assert!(is_locked(engine.clear_rate_override(&w1(), &a1).map(|_| ())));
    assert!(is_locked(
        engine
            .stage_movement(&w1(), manual(a1.clone(), Direction::In, "10"))
            .map(|_| ())
    ));
    assert!(is_locked(engine.lock_week(&w1(), LockMode::Override).map(|_| ())));

    // Other weeks stay open
    assert!(engine.set_rate_override(&w2(), &a1, Decimal::from(30)).is_ok());
    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 1);
}


#[test]
fn test_strict_lock_blocked_by_verification() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();

    let outcome = engine.lock_week(&w1(), LockMode::Strict).unwrap();

    let LockOutcome::Blocked(report) = outcome else {
        panic!("unposted statement should block the lock");
    };
    assert!(!report.ok);
    assert!(report.failures().count() > 0);
    assert!(!engine.is_locked(&w1()).unwrap());
    assert!(engine.week_snapshot(&w1()).unwrap().is_none());

    // The operator may acknowledge the mismatch
    let outcome = engine.lock_week(&w1(), LockMode::Override).unwrap();
    let LockOutcome::Locked(snapshot) = outcome else {
        panic!("override should lock");
    };
    assert!(!snapshot.verification_ok);
    assert!(engine.is_locked(&w1()).unwrap());
}


#[test]
fn test_unlock_keeps_snapshot_and_honors_it() {
    let (engine, _) = create_test_engine();
    lock(&engine, &w1());

    assert!(engine.unlock_week(&w1()).unwrap());
    assert!(!engine.unlock_week(&w1()).unwrap());
    assert!(engine.week_snapshot(&w1()).unwrap().is_some());

    // Writable again, but the retained snapshot still answers
    engine
        .set_rate_override(&w1(), &EntityRef::agent("a1"), Decimal::from(50))
        .unwrap();
    assert_eq!(engine.resolve_rate(&w1(), &EntityRef::agent("a1")).unwrap(), Decimal::from(20));
    let balance = engine.balances_at(&w1()).unwrap()[&EntityRef::agent("a1")];
    assert_eq!(balance.value, dec("80"));
    assert_eq!(balance.status, BalanceStatus::Provisional);

    // Locking again recomputes from live data
    let relocked = lock(&engine, &w1());
    assert_eq!(relocked.rb_rates_by_agent["a1"], Decimal::from(50));
    assert_eq!(relocked.balance_for(&EntityRef::agent("a1")), Some(dec("50")));
}


#[test]
fn test_ignore_policy_skips_retained_snapshot() {
    let config = EngineConfig {
        retained_snapshot_policy: RetainedSnapshotPolicy::Ignore,
        ..EngineConfig::default()
    };
    let engine = create_engine_with(create_test_directory(), config);
    lock(&engine, &w1());
    engine.unlock_week(&w1()).unwrap();

    engine
        .set_rate_override(&w1(), &EntityRef::agent("a1"), Decimal::from(50))
        .unwrap();

    assert_eq!(engine.resolve_rate(&w1(), &EntityRef::agent("a1")).unwrap(), Decimal::from(50));
    assert_eq!(
        engine.balances_at(&w1()).unwrap()[&EntityRef::agent("a1")].value,
        dec("50")
    );
}


#[test]
fn test_lock_unknown_week() {
    let (engine, _) = create_test_engine();

    assert!(matches!(
        engine.lock_week(&WeekKey::new("2030-01-07"), LockMode::Strict),
        Err(EngineError::UnknownWeek(_))
    ));
}
