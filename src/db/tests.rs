#![allow(clippy::unwrap_used)]

use super::*;
use crate::reset::{GateState, ResetRequest, ResetTransaction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn request(period_id: i64, income: &str, gate: GateState) -> ResetRequest {
    ResetRequest {
        period_id,
        raw_income: income.into(),
        gate,
        observed_balance: Decimal::ZERO,
    }
}

fn setup_budget(db: &mut Database) -> (i64, i64) {
    let (budget_id, period_id) = db.create_budget("Household", "2024-01", dec!(50000)).unwrap();
    db.insert_allocation(&Allocation::new(period_id, 1, dec!(50000)))
        .unwrap();
    db.insert_expense(&Expense::new(period_id, 1, dec!(20000), "Rent".into()))
        .unwrap();
    db.insert_expense(&Expense::new(period_id, 2, dec!(12500), "Groceries".into()))
        .unwrap();
    (budget_id, period_id)
}

/// Snapshot of everything a failed reset must leave untouched.
fn snapshot(
    db: &Database,
    budget_id: i64,
    period_id: i64,
) -> (Vec<Allocation>, Vec<Expense>, Option<BudgetPeriod>, usize) {
    (
        db.get_allocations(period_id).unwrap(),
        db.get_expenses(period_id).unwrap(),
        db.get_active_period(budget_id).unwrap(),
        db.get_periods(budget_id).unwrap().len(),
    )
}

// ── Default data ──────────────────────────────────────────────

#[test]
fn test_default_categories_seeded() {
    let db = Database::open_in_memory().unwrap();
    let cats = db.get_categories().unwrap();
    assert!(!cats.is_empty());
    assert!(cats.iter().any(|c| c.name == "Groceries"));
    assert!(cats.iter().any(|c| c.name == "Uncategorized"));
}

#[test]
fn test_insert_category() {
    let db = Database::open_in_memory().unwrap();
    let id = db.insert_category(&Category::new("Pets".into())).unwrap();
    let cats = db.get_categories().unwrap();
    assert_eq!(Category::find_by_name(&cats, "pets").unwrap().id, Some(id));
    assert!(db.insert_category(&Category::new("Pets".into())).is_err());
}

#[test]
fn test_reopen_file_database_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.db");
    let count = {
        let mut db = Database::open(&path).unwrap();
        db.create_budget("Home", "2024-01", dec!(100)).unwrap();
        db.get_categories().unwrap().len()
    };
    let db = Database::open(&path).unwrap();
    assert_eq!(db.get_categories().unwrap().len(), count);
    assert_eq!(db.get_budgets().unwrap().len(), 1);
}

// ── Budgets & periods ─────────────────────────────────────────

#[test]
fn test_create_budget_has_one_active_period() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = db.create_budget("Home", "2024-03", dec!(4200.50)).unwrap();

    let budgets = db.get_budgets().unwrap();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].name, "Home");

    let period = db.get_active_period(budget_id).unwrap().unwrap();
    assert_eq!(period.id, Some(period_id));
    assert_eq!(period.month, "2024-03");
    assert_eq!(period.income, dec!(4200.50));
    assert!(period.is_active());
    assert_eq!(db.count_active_periods(budget_id).unwrap(), 1);
}

#[test]
fn test_create_budget_validation() {
    let mut db = Database::open_in_memory().unwrap();
    assert!(db.create_budget("  ", "2024-01", dec!(1)).is_err());
    assert!(db.create_budget("Home", "2024-1x", dec!(1)).is_err());
    assert!(db.create_budget("Home", "2024-01", dec!(-1)).is_err());
    assert!(db.get_budgets().unwrap().is_empty());
}

#[test]
fn test_period_not_found() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.get_period(999).unwrap().is_none());
    assert!(db.get_active_period(999).unwrap().is_none());
}

#[test]
fn test_second_active_period_rejected_by_schema() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, _) = db.create_budget("Home", "2024-01", dec!(1)).unwrap();
    let result = db.conn().execute(
        "INSERT INTO periods (budget_id, month, income, created_at) VALUES (?1, '2024-02', '1', 'now')",
        params![budget_id],
    );
    assert!(result.is_err());
    assert_eq!(db.count_active_periods(budget_id).unwrap(), 1);
}

// ── Allocations & expenses ────────────────────────────────────

#[test]
fn test_allocations_and_expenses_roundtrip() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = setup_budget(&mut db);

    let allocs = db.get_allocations(period_id).unwrap();
    assert_eq!(allocs.len(), 1);
    assert_eq!(allocs[0].amount, dec!(50000));

    let expenses = db.get_expenses(period_id).unwrap();
    assert_eq!(expenses.len(), 2);
    let total: Decimal = expenses.iter().map(|e| e.amount).sum();
    assert_eq!(total, dec!(32500));
}

#[test]
fn test_negative_amounts_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = db.create_budget("Home", "2024-01", dec!(1)).unwrap();
    assert!(db
        .insert_allocation(&Allocation::new(period_id, 1, dec!(-5)))
        .is_err());
    assert!(db
        .insert_expense(&Expense::new(period_id, 1, dec!(-5), "refund".into()))
        .is_err());
}

#[test]
fn test_corrupt_amount_is_a_read_error() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = db.create_budget("Home", "2024-01", dec!(1)).unwrap();
    db.conn()
        .execute(
            "INSERT INTO expenses (period_id, category_id, amount, spent_at) VALUES (?1, 1, 'lots', 'now')",
            params![period_id],
        )
        .unwrap();
    assert!(db.get_expenses(period_id).is_err());
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn test_reset_include_rollover() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = setup_budget(&mut db);

    let receipt =
        ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Include))
            .unwrap();
    let new_id = receipt.new_period_id();

    let new_period = db.get_period(new_id).unwrap().unwrap();
    assert_eq!(new_period.income, dec!(77500));
    assert_eq!(new_period.month, "2024-02");
    assert!(new_period.is_active());

    let rollover = db.get_rollover_for_source(period_id).unwrap().unwrap();
    assert_eq!(rollover.new_period_id, new_id);
    assert_eq!(rollover.decision, RolloverDecision::Included);
    assert_eq!(rollover.amount, dec!(17500));
    assert_eq!(rollover.new_income, dec!(77500));
    assert_eq!(rollover, receipt.rollover);

    assert_eq!(db.count_active_periods(budget_id).unwrap(), 1);
}

#[test]
fn test_reset_exclude_rollover() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = setup_budget(&mut db);

    let receipt =
        ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Exclude))
            .unwrap();
    let new_period = db.get_period(receipt.new_period_id()).unwrap().unwrap();
    assert_eq!(new_period.income, dec!(60000));

    let rollover = db.get_rollover_for_source(period_id).unwrap().unwrap();
    assert_eq!(rollover.decision, RolloverDecision::Excluded);
    assert_eq!(rollover.amount, Decimal::ZERO);
}

#[test]
fn test_reset_archives_source_and_keeps_history() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = setup_budget(&mut db);
    let allocs_before = db.get_allocations(period_id).unwrap();
    let expenses_before = db.get_expenses(period_id).unwrap();

    ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Include)).unwrap();

    let old = db.get_period(period_id).unwrap().unwrap();
    assert!(!old.is_active());
    assert!(old.archived_at.is_some());
    assert_eq!(db.get_allocations(period_id).unwrap(), allocs_before);
    assert_eq!(db.get_expenses(period_id).unwrap(), expenses_before);

    let periods = db.get_periods(budget_id).unwrap();
    assert_eq!(periods.len(), 2);
    assert_eq!(periods.iter().filter(|p| p.is_active()).count(), 1);
}

#[test]
fn test_reset_across_year_boundary() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = db.create_budget("Home", "2024-12", dec!(100)).unwrap();
    ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Undecided)).unwrap();
    let active = db.get_active_period(budget_id).unwrap().unwrap();
    assert_eq!(active.month, "2025-01");
}

#[test]
fn test_consecutive_resets_build_history() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, first) = setup_budget(&mut db);
    let second = ResetTransaction::execute(&mut db, &request(first, "1000", GateState::Include))
        .unwrap()
        .new_period_id();
    db.insert_allocation(&Allocation::new(second, 1, dec!(400)))
        .unwrap();
    let third = ResetTransaction::execute(&mut db, &request(second, "1000", GateState::Include))
        .unwrap()
        .new_period_id();

    let rollovers = db.get_rollovers(budget_id).unwrap();
    assert_eq!(rollovers.len(), 2);
    assert_eq!(rollovers[0].source_period_id, first);
    assert_eq!(rollovers[1].source_period_id, second);
    assert_eq!(rollovers[1].new_period_id, third);
    assert_eq!(rollovers[1].amount, dec!(400));
    assert_eq!(db.count_active_periods(budget_id).unwrap(), 1);
    assert_eq!(
        db.get_active_period(budget_id).unwrap().unwrap().month,
        "2024-03"
    );
}

#[test]
fn test_reset_archived_period_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = setup_budget(&mut db);
    ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude)).unwrap();

    let err = ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude))
        .unwrap_err();
    assert!(matches!(err, ResetError::TransactionFailed(_)));
    assert_eq!(db.get_periods(budget_id).unwrap().len(), 2);
    assert_eq!(db.get_rollovers(budget_id).unwrap().len(), 1);
}

#[test]
fn test_reset_unknown_period() {
    let mut db = Database::open_in_memory().unwrap();
    let err = ResetTransaction::execute(&mut db, &request(42, "100", GateState::Exclude))
        .unwrap_err();
    assert!(matches!(err, ResetError::TransactionFailed(_)));
}

#[test]
fn test_decision_required_leaves_state_unchanged() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = setup_budget(&mut db);
    let before = snapshot(&db, budget_id, period_id);

    let err = ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Undecided))
        .unwrap_err();
    assert_eq!(err, ResetError::DecisionRequired);
    assert_eq!(snapshot(&db, budget_id, period_id), before);
    assert!(db.get_rollover_for_source(period_id).unwrap().is_none());
}

#[test]
fn test_failed_commit_rolls_back_everything() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = setup_budget(&mut db);
    let before = snapshot(&db, budget_id, period_id);

    // Archive and successor insert succeed, then the rollover write blows up.
    db.conn()
        .execute_batch(
            "CREATE TRIGGER fail_rollover BEFORE INSERT ON rollovers
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

    let err = ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Include))
        .unwrap_err();
    assert!(matches!(err, ResetError::TransactionFailed(_)));
    assert_eq!(snapshot(&db, budget_id, period_id), before);
    assert!(db.get_period(period_id).unwrap().unwrap().is_active());
    assert!(db.get_rollovers(budget_id).unwrap().is_empty());

    // Retry after the fault clears recomputes and succeeds.
    db.conn().execute_batch("DROP TRIGGER fail_rollover;").unwrap();
    let receipt =
        ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Include))
            .unwrap();
    assert_eq!(receipt.new_period.income, dec!(77500));
}

#[test]
fn test_overflowing_totals_roll_back() {
    let mut db = Database::open_in_memory().unwrap();
    let (budget_id, period_id) = db.create_budget("Huge", "2024-01", dec!(100)).unwrap();
    db.insert_allocation(&Allocation::new(period_id, 1, Decimal::MAX))
        .unwrap();
    db.insert_allocation(&Allocation::new(period_id, 2, dec!(1)))
        .unwrap();
    let before = snapshot(&db, budget_id, period_id);

    let err = ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude))
        .unwrap_err();
    assert!(matches!(err, ResetError::TransactionFailed(_)));
    assert_eq!(snapshot(&db, budget_id, period_id), before);
    assert!(db.get_rollovers(budget_id).unwrap().is_empty());
}

#[test]
fn test_concurrent_resets_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let (budget_id, period_id) = {
        let mut db = Database::open(&path).unwrap();
        setup_budget(&mut db)
    };

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let mut db = Database::open(&path).unwrap();
                ResetTransaction::execute(&mut db, &request(period_id, "60000", GateState::Include))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ResetError::TransactionFailed(_)))));

    let db = Database::open(&path).unwrap();
    assert_eq!(db.count_active_periods(budget_id).unwrap(), 1);
    assert_eq!(db.get_rollovers(budget_id).unwrap().len(), 1);
    assert_eq!(db.get_periods(budget_id).unwrap().len(), 2);
}

// ── Archival immutability ─────────────────────────────────────

#[test]
fn test_archived_period_records_are_frozen() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = setup_budget(&mut db);
    ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude)).unwrap();

    assert!(db
        .insert_allocation(&Allocation::new(period_id, 1, dec!(10)))
        .is_err());
    assert!(db
        .insert_expense(&Expense::new(period_id, 1, dec!(10), "late".into()))
        .is_err());
    assert!(db
        .conn()
        .execute("UPDATE expenses SET amount = '0' WHERE period_id = ?1", params![period_id])
        .is_err());
    assert!(db
        .conn()
        .execute("DELETE FROM allocations WHERE period_id = ?1", params![period_id])
        .is_err());
    assert_eq!(db.get_expenses(period_id).unwrap().len(), 2);
}

#[test]
fn test_archived_period_cannot_be_reactivated_or_deleted() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = setup_budget(&mut db);
    ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude)).unwrap();

    assert!(db
        .conn()
        .execute("UPDATE periods SET archived_at = NULL WHERE id = ?1", params![period_id])
        .is_err());
    assert!(db
        .conn()
        .execute("DELETE FROM periods WHERE id = ?1", params![period_id])
        .is_err());
    assert!(!db.get_period(period_id).unwrap().unwrap().is_active());
}

// ── Export ────────────────────────────────────────────────────

#[test]
fn test_export_archived_period() {
    let mut db = Database::open_in_memory().unwrap();
    let (_, period_id) = setup_budget(&mut db);
    ResetTransaction::execute(&mut db, &request(period_id, "100", GateState::Exclude)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jan.csv");
    let count = db.export_period_csv(period_id, &path).unwrap();
    assert_eq!(count, 3);

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Month,Kind,Category,Amount,Description,Date"
    );
    assert_eq!(content.matches(",expense,").count(), 2);
    assert_eq!(content.matches(",allocation,").count(), 1);
    assert!(content.contains("Groceries"));
}

#[test]
fn test_export_unknown_period() {
    let db = Database::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    assert!(db
        .export_period_csv(7, &dir.path().join("x.csv"))
        .is_err());
}
