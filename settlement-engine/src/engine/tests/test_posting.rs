use super::*;


#[test]
fn test_apply_posts_one_entry() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "Joao", "150", "30", "1.20")])
        .unwrap();

    let outcome = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap();

    let ApplyOutcome::Applied(entry_id) = outcome else {
        panic!("expected a new entry");
    };
    let ledger = engine.list_ledger(&w1()).unwrap();
    assert_eq!(ledger.len(), 1);
    let entry = &ledger[0];
    assert_eq!(entry.id, entry_id);
    assert_eq!(entry.entity, EntityRef::player("p1"));
    assert_eq!(entry.direction, Direction::In);
    assert_eq!(entry.amount, dec("120"));
    assert_eq!(entry.fee, dec("1.20"));
    assert_eq!(entry.method, PaymentMethod::ChipPix);
    assert_eq!(
        entry.external_ref,
        Some(shared::models::ExternalRef::new(PaymentMethod::ChipPix, "cp_1610051AG"))
    );

    let row = find_row(&engine, &w1(), "cp_1610051AG");
    assert_eq!(row.status(), TxnStatus::Applied);
    assert_eq!(row.applied_movement_id, Some(entry_id));
}


#[test]
fn test_apply_is_idempotent() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();

    let first = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap();
    let second = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap();

    let ApplyOutcome::Applied(id) = first else {
        panic!("first apply should post");
    };
    assert_eq!(second, ApplyOutcome::AlreadyApplied(id));
    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 1);
}


#[test]
fn test_apply_requires_entity_and_ready_row() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(
            &w1(),
            &[
                chippix_row("cp_zz99", "Fulano Silva", "40", "0", "0"),
                chippix_row("cp_1610051AG", "", "150", "30", "1.20"),
                chippix_row("cp_2220001x", "", "10", "10", "0"),
            ],
        )
        .unwrap();
    engine.ignore_transaction(&w1(), "cp_1610051AG").unwrap();

    assert!(matches!(
        engine.apply_transaction(&w1(), "cp_zz99"),
        Err(EngineError::UnresolvedEntity(_))
    ));
    assert!(matches!(
        engine.apply_transaction(&w1(), "cp_1610051AG"),
        Err(EngineError::InvalidTransition(_))
    ));
    assert!(matches!(
        engine.apply_transaction(&w1(), "cp_2220001x"),
        Err(EngineError::Validation(_))
    ));
    assert!(engine.list_ledger(&w1()).unwrap().is_empty());
}


#[test]
fn test_bulk_apply_summary() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(
            &w1(),
            &[
                chippix_row("cp_1610051AG", "", "150", "30", "1.20"),
                chippix_row("cp_1610051ZZ", "", "0", "80", "0.40"),
                chippix_row("cp_2220001x", "", "10", "10", "0"),
                chippix_row("cp_zz99", "Fulano Silva", "40", "0", "0"),
            ],
        )
        .unwrap();
    engine.lock_transaction(&w1(), "cp_1610051ZZ").unwrap();

    let summary = engine.apply_transactions(&w1()).unwrap();

    assert_eq!(summary.applied, 2);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.zero_impact, 1);
    assert!(summary.failures.is_empty());

    let entries = engine.list_ledger(&w1()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(ledger::ledger_net(&entries, &EntityRef::player("p1")), dec("40"));
    assert_eq!(find_row(&engine, &w1(), "cp_zz99").status(), TxnStatus::Pending);
    assert_eq!(find_row(&engine, &w1(), "cp_2220001x").status(), TxnStatus::Linked);

    // A second run posts nothing and reports both posted rows as duplicates
    let again = engine.apply_transactions(&w1()).unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.duplicates, 2);
    assert_eq!(again.zero_impact, 1);
    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 2);
}


#[test]
fn test_identical_reimport_then_bulk_apply_counts_duplicate() {
    let (engine, _) = create_test_engine();
    let rows = [chippix_row("cp_1610051AG", "", "150", "30", "1.20")];
    engine.import_chippix(&w1(), &rows).unwrap();
    assert_eq!(engine.apply_transactions(&w1()).unwrap().applied, 1);

    let reimport = engine.import_chippix(&w1(), &rows).unwrap();
    assert_eq!(reimport.imported, 0);
    assert_eq!(reimport.already_present, 1);

    let second = engine.apply_transactions(&w1()).unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(second.failed, 0);
    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 1);
}


#[test]
fn test_clear_reimport_reapply_hits_external_ref_guard() {
    let (engine, _) = create_test_engine();
    let rows = [chippix_row("cp_1610051AG", "", "150", "30", "1.20")];
    engine.import_chippix(&w1(), &rows).unwrap();
    let ApplyOutcome::Applied(original) = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap() else {
        panic!("first apply should post");
    };

    assert_eq!(engine.clear_imports(&w1(), PaymentMethod::ChipPix).unwrap(), 1);
    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 1);

    let summary = engine.import_chippix(&w1(), &rows).unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.auto_linked, 1);

    let applied = engine.apply_transactions(&w1()).unwrap();
    assert_eq!(applied.applied, 0);
    assert_eq!(applied.duplicates, 1);

    assert_eq!(engine.list_ledger(&w1()).unwrap().len(), 1);
    let row = find_row(&engine, &w1(), "cp_1610051AG");
    assert_eq!(row.status(), TxnStatus::Applied);
    assert_eq!(row.applied_movement_id, Some(original));
    assert!(engine.verify(&w1()).unwrap().ok);
}


#[test]
fn test_revert_removes_entry() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();
    engine.apply_transaction(&w1(), "cp_1610051AG").unwrap();

    let row = engine.revert_transaction(&w1(), "cp_1610051AG").unwrap();

    assert_eq!(row.status(), TxnStatus::Linked);
    assert!(row.applied_movement_id.is_none());
    assert!(engine.list_ledger(&w1()).unwrap().is_empty());

    // Not applied anymore
    assert!(matches!(
        engine.revert_transaction(&w1(), "cp_1610051AG"),
        Err(EngineError::InvalidTransition(_))
    ));

    // And can be applied again
    assert!(matches!(
        engine.apply_transaction(&w1(), "cp_1610051AG").unwrap(),
        ApplyOutcome::Applied(_)
    ));
}


#[test]
fn test_revert_falls_back_to_external_ref() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();
    engine.apply_transaction(&w1(), "cp_1610051AG").unwrap();

    // The row's recorded entry id no longer points at anything in the ledger
    let txn = engine.storage.begin_write().unwrap();
    let mut imports = engine.storage.imports_txn(&txn, CLUB, &w1()).unwrap();
    imports[0].applied_movement_id = Some("stale-entry".to_string());
    engine.storage.put_imports_txn(&txn, CLUB, &w1(), &imports).unwrap();
    txn.commit().unwrap();

    let row = engine.revert_transaction(&w1(), "cp_1610051AG").unwrap();

    assert_eq!(row.status(), TxnStatus::Linked);
    assert!(engine.list_ledger(&w1()).unwrap().is_empty());
}


#[test]
fn test_delete_entry_restages_row() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(&w1(), &[chippix_row("cp_1610051AG", "", "150", "30", "1.20")])
        .unwrap();
    let ApplyOutcome::Applied(entry_id) = engine.apply_transaction(&w1(), "cp_1610051AG").unwrap() else {
        panic!("apply should post");
    };

    let removed = engine.delete_ledger_entry(&w1(), &entry_id).unwrap();

    assert_eq!(removed.id, entry_id);
    assert!(engine.list_ledger(&w1()).unwrap().is_empty());
    assert_eq!(find_row(&engine, &w1(), "cp_1610051AG").status(), TxnStatus::Linked);
    assert!(matches!(
        engine.delete_ledger_entry(&w1(), &entry_id),
        Err(EngineError::LedgerEntryNotFound(_))
    ));
}


#[test]
fn test_verify_tracks_postings() {
    let (engine, _) = create_test_engine();
    engine
        .import_chippix(
            &w1(),
            &[
                chippix_row("cp_1610051AG", "", "150", "30", "1.20"),
                chippix_row("cp_zz99", "Fulano Silva", "40", "0", "0"),
            ],
        )
        .unwrap();

    let report = engine.verify(&w1()).unwrap();
    assert!(!report.ok);

    engine.ignore_transaction(&w1(), "cp_zz99").unwrap();
    engine.apply_transactions(&w1()).unwrap();

    let report = engine.verify(&w1()).unwrap();
    assert!(report.ok, "{:?}", report.failures().collect::<Vec<_>>());
}
