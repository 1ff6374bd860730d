use super::*;


fn post(engine: &SettlementEngine, week: &WeekKey, entity: EntityRef, direction: Direction, amount: &str) {
    let movement = engine
        .stage_movement(week, manual(entity, direction, amount))
        .unwrap();
    engine.apply_movement(week, &movement.id, true).unwrap();
}


#[test]
fn test_sub_cent_postings_follow_closed_form() {
    let (engine, _) = create_test_engine();
    let fees = EntityRef::expense("tarifas");
    post(&engine, &w1(), fees.clone(), Direction::In, "0.005");
    post(&engine, &w2(), fees.clone(), Direction::In, "0.005");

    // Σ ledgerNet = −0.010; the running balance is rounded once, not per week
    assert_eq!(engine.balances_at(&w1()).unwrap()[&fees].value, dec("-0.01"));
    assert_eq!(engine.balances_at(&w2()).unwrap()[&fees].value, dec("-0.01"));
    assert_eq!(engine.get_carry_forward(&w3()).unwrap()[&fees], dec("-0.01"));
}

#[test]
fn test_carry_forward_closed_form() {
    let (engine, _) = create_test_engine();
    // a1 owes 80 a week and pays week 1; the club pays p2 410 in week 3
    post(&engine, &w1(), EntityRef::agent("a1"), Direction::In, "80");
    post(&engine, &w3(), EntityRef::player("p2"), Direction::Out, "410");

    let carried = engine.get_carry_forward(&w3()).unwrap();
    assert_eq!(carried[&EntityRef::agent("a1")], dec("80"));
    assert_eq!(carried[&EntityRef::player("p2")], dec("-410"));

    let balances = engine.balances_at(&w3()).unwrap();
    let a1 = balances[&EntityRef::agent("a1")];
    assert_eq!(a1.value, dec("160"));
    assert_eq!(a1.status, BalanceStatus::Provisional);
    assert_eq!(balances[&EntityRef::player("p2")].value, dec("-205"));

    // Direct agent never settles and never got paid
    let d1 = balances[&EntityRef::agent("d1")];
    assert_eq!(d1.value, Decimal::ZERO);
    assert_eq!(d1.status, BalanceStatus::New);

    // Players of a non-direct agent settle through the agent
    assert!(!balances.contains_key(&EntityRef::player("p1")));
}


#[test]
fn test_first_week_carries_nothing() {
    let (engine, _) = create_test_engine();

    let carried = engine.get_carry_forward(&w1()).unwrap();

    assert!(carried.values().all(|v| v.is_zero()));
    assert!(carried.contains_key(&EntityRef::agent("a1")));
}


#[test]
fn test_unknown_week() {
    let (engine, _) = create_test_engine();

    assert!(matches!(
        engine.get_carry_forward(&WeekKey::new("2030-01-07")),
        Err(EngineError::UnknownWeek(_))
    ));
}


#[test]
fn test_rate_override_feeds_balances() {
    let (engine, _) = create_test_engine();

    engine
        .set_rate_override(&w2(), &EntityRef::agent("a1"), Decimal::from(25))
        .unwrap();

    assert_eq!(engine.resolve_rate(&w1(), &EntityRef::agent("a1")).unwrap(), Decimal::from(20));
    assert_eq!(engine.resolve_rate(&w2(), &EntityRef::agent("a1")).unwrap(), Decimal::from(25));
    // The agent override is not a player override
    assert_eq!(engine.resolve_rate(&w2(), &EntityRef::player("p1")).unwrap(), Decimal::from(20));
    assert_eq!(engine.resolve_rate(&w2(), &EntityRef::player("p2")).unwrap(), Decimal::from(10));

    // 80 + 75 + 80
    let balances = engine.balances_at(&w3()).unwrap();
    assert_eq!(balances[&EntityRef::agent("a1")].value, dec("235"));

    assert!(engine.clear_rate_override(&w2(), &EntityRef::agent("a1")).unwrap());
    assert!(!engine.clear_rate_override(&w2(), &EntityRef::agent("a1")).unwrap());
    let balances = engine.balances_at(&w3()).unwrap();
    assert_eq!(balances[&EntityRef::agent("a1")].value, dec("240"));
}


#[test]
fn test_rate_override_validation() {
    let (engine, _) = create_test_engine();

    assert!(matches!(
        engine.set_rate_override(&w1(), &EntityRef::agent("a1"), Decimal::from(120)),
        Err(EngineError::OutOfRange(_))
    ));
    assert!(matches!(
        engine.set_rate_override(&w1(), &EntityRef::club("c2"), Decimal::from(10)),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.set_rate_override(&w1(), &EntityRef::agent("zz"), Decimal::from(10)),
        Err(EngineError::EntityNotFound(_))
    ));
    assert!(matches!(
        engine.set_rate_override(&WeekKey::new("2030-01-07"), &EntityRef::agent("a1"), Decimal::from(10)),
        Err(EngineError::UnknownWeek(_))
    ));
}


#[test]
fn test_settlement_statement() {
    let (engine, _) = create_test_engine();
    post(&engine, &w1(), EntityRef::agent("a1"), Direction::In, "80");
    post(&engine, &w1(), EntityRef::expense("aluguel"), Direction::Out, "1500");

    let statement = engine.settlement_statement(&w1()).unwrap();

    let a1 = statement
        .iter()
        .find(|s| s.entity == EntityRef::agent("a1"))
        .unwrap();
    assert_eq!(a1.label, "ABC");
    assert_eq!(a1.previous_balance, Decimal::ZERO);
    assert_eq!(a1.winnings, dec("-100"));
    assert_eq!(a1.rake, dec("100"));
    assert_eq!(a1.rb_rate, Decimal::from(20));
    assert_eq!(a1.rakeback, dec("20"));
    assert_eq!(a1.resultado, dec("80"));
    assert_eq!(a1.ledger_net, dec("80"));
    assert_eq!(a1.balance, Decimal::ZERO);
    assert_eq!(a1.status, BalanceStatus::Provisional);

    let p2 = statement
        .iter()
        .find(|s| s.entity == EntityRef::player("p2"))
        .unwrap();
    assert_eq!(p2.label, "Maria");
    assert_eq!(p2.rb_rate, Decimal::from(10));
    assert_eq!(p2.resultado, dec("-205"));

    // Expenses carry the payment only
    let rent = statement
        .iter()
        .find(|s| s.entity == EntityRef::expense("aluguel"))
        .unwrap();
    assert_eq!(rent.resultado, Decimal::ZERO);
    assert_eq!(rent.rb_rate, Decimal::ZERO);
    assert_eq!(rent.balance, dec("1500"));

    // Next week starts from this week's balances
    let next = engine.settlement_statement(&w2()).unwrap();
    let p2_next = next
        .iter()
        .find(|s| s.entity == EntityRef::player("p2"))
        .unwrap();
    assert_eq!(p2_next.previous_balance, dec("-205"));
    assert_eq!(p2_next.balance, dec("-410"));
}


#[test]
fn test_club_financials() {
    let (engine, _) = create_test_engine();

    let financials = engine.club_financials(&w1()).unwrap();

    assert_eq!(financials.rake, dec("150"));
    assert_eq!(financials.profit_loss, dec("100"));
    assert_eq!(financials.resultado_clube, dec("250"));
    assert_eq!(financials.taxa_app, dec("12"));
    assert_eq!(financials.taxa_liga, dec("15"));
    // No GGR, no rodeo taxes
    assert_eq!(financials.taxa_rodeo_ggr, Decimal::ZERO);
    assert_eq!(financials.taxa_rodeo_app, Decimal::ZERO);
    assert_eq!(financials.total_taxas, dec("27"));
}
