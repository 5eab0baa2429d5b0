mod schema;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ResetError;
use crate::models::*;
use crate::reset::{BalanceCalculator, PeriodStore, ResetPlan, ResetReceipt};

/// How long a writer waits on another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PERIOD_COLUMNS: &str = "id, budget_id, month, income, created_at, archived_at";
const ROLLOVER_COLUMNS: &str =
    "id, budget_id, source_period_id, new_period_id, decision, amount, new_income, created_at";

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        db.seed_default_categories()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        db.seed_default_categories()?;
        Ok(db)
    }

    /// Raw access for tests that need to break things on purpose.
    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            let tx = self.conn.transaction()?;
            tx.execute_batch(schema::SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tx.commit()?;
            tracing::info!(version = schema::CURRENT_VERSION, "created database schema");
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    fn seed_default_categories(&mut self) -> Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let defaults = [
            "Bills & Utilities",
            "Education",
            "Entertainment",
            "Food & Dining",
            "Groceries",
            "Health",
            "Housing",
            "Insurance",
            "Personal Care",
            "Savings",
            "Shopping",
            "Transportation",
            "Travel",
            "Uncategorized",
        ];

        let tx = self.conn.transaction()?;
        for name in &defaults {
            tx.execute(
                "INSERT OR IGNORE INTO categories (name) VALUES (?1)",
                params![name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── Budgets ───────────────────────────────────────────────

    /// Start a new budget lineage with its first active period.
    /// Returns `(budget_id, period_id)`.
    pub(crate) fn create_budget(
        &mut self,
        name: &str,
        month: &str,
        income: Decimal,
    ) -> Result<(i64, i64)> {
        if name.trim().is_empty() {
            anyhow::bail!("Budget name cannot be empty");
        }
        if income < Decimal::ZERO {
            anyhow::bail!("Income cannot be negative: {income}");
        }
        parse_month(month)?;

        let budget = Budget::new(name.trim().to_string());

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO budgets (name, created_at) VALUES (?1, ?2)",
            params![budget.name, budget.created_at],
        )?;
        let budget_id = tx.last_insert_rowid();
        let period = BudgetPeriod::new(budget_id, month.trim().to_string(), income);
        tx.execute(
            "INSERT INTO periods (budget_id, month, income, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                budget_id,
                period.month,
                period.income.to_string(),
                period.created_at
            ],
        )?;
        let period_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(budget_id, period_id, month = %period.month, "created budget");
        Ok((budget_id, period_id))
    }

    pub(crate) fn get_budgets(&self) -> Result<Vec<Budget>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM budgets ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Budget {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Periods ───────────────────────────────────────────────

    pub(crate) fn get_period(&self, id: i64) -> Result<Option<BudgetPeriod>> {
        Ok(query_period(&self.conn, id)?)
    }

    pub(crate) fn get_active_period(&self, budget_id: i64) -> Result<Option<BudgetPeriod>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {PERIOD_COLUMNS} FROM periods WHERE budget_id = ?1 AND archived_at IS NULL"
                ),
                params![budget_id],
                period_from_row,
            )
            .optional()?)
    }

    /// All periods of a lineage, newest first.
    pub(crate) fn get_periods(&self, budget_id: i64) -> Result<Vec<BudgetPeriod>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERIOD_COLUMNS} FROM periods WHERE budget_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map(params![budget_id], period_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    #[cfg(test)]
    pub(crate) fn count_active_periods(&self, budget_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM periods WHERE budget_id = ?1 AND archived_at IS NULL",
            params![budget_id],
            |row| row.get(0),
        )?)
    }

    // ── Allocations & Expenses ────────────────────────────────

    pub(crate) fn insert_allocation(&self, alloc: &Allocation) -> Result<i64> {
        if alloc.amount < Decimal::ZERO {
            anyhow::bail!("Allocation amount cannot be negative: {}", alloc.amount);
        }
        self.conn
            .execute(
                "INSERT INTO allocations (period_id, category_id, amount, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    alloc.period_id,
                    alloc.category_id,
                    alloc.amount.to_string(),
                    alloc.created_at,
                ],
            )
            .with_context(|| format!("Failed to add allocation to period {}", alloc.period_id))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn insert_expense(&self, expense: &Expense) -> Result<i64> {
        if expense.amount < Decimal::ZERO {
            anyhow::bail!("Expense amount cannot be negative: {}", expense.amount);
        }
        self.conn
            .execute(
                "INSERT INTO expenses (period_id, category_id, amount, description, spent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    expense.period_id,
                    expense.category_id,
                    expense.amount.to_string(),
                    expense.description,
                    expense.spent_at,
                ],
            )
            .with_context(|| format!("Failed to add expense to period {}", expense.period_id))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn get_allocations(&self, period_id: i64) -> Result<Vec<Allocation>> {
        Ok(query_allocations(&self.conn, period_id)?)
    }

    pub(crate) fn get_expenses(&self, period_id: i64) -> Result<Vec<Expense>> {
        Ok(query_expenses(&self.conn, period_id)?)
    }

    // ── Categories ────────────────────────────────────────────

    pub(crate) fn get_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: Some(row.get(0)?),
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn insert_category(&self, cat: &Category) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO categories (name) VALUES (?1)",
            params![cat.name.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    // ── Rollovers ─────────────────────────────────────────────

    /// Rollover history for a lineage, oldest first.
    pub(crate) fn get_rollovers(&self, budget_id: i64) -> Result<Vec<RolloverRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROLLOVER_COLUMNS} FROM rollovers WHERE budget_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![budget_id], rollover_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    #[cfg(test)]
    pub(crate) fn get_rollover_for_source(
        &self,
        source_period_id: i64,
    ) -> Result<Option<RolloverRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ROLLOVER_COLUMNS} FROM rollovers WHERE source_period_id = ?1"),
                params![source_period_id],
                rollover_from_row,
            )
            .optional()?)
    }

    // ── Export ────────────────────────────────────────────────

    /// Write a period's allocations and expenses to CSV. Returns the number of data rows.
    pub(crate) fn export_period_csv(&self, period_id: i64, path: &Path) -> Result<usize> {
        let period = self
            .get_period(period_id)?
            .ok_or_else(|| anyhow::anyhow!("Period {period_id} not found"))?;
        let categories = self.get_categories()?;
        let category_name = |id: i64| {
            Category::find_by_id(&categories, id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "Unknown".into())
        };

        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        wtr.write_record(["Month", "Kind", "Category", "Amount", "Description", "Date"])?;

        let mut count = 0;
        for alloc in self.get_allocations(period_id)? {
            let category = category_name(alloc.category_id);
            let amount = alloc.amount.to_string();
            wtr.write_record([
                period.month.as_str(),
                "allocation",
                category.as_str(),
                amount.as_str(),
                "",
                alloc.created_at.as_str(),
            ])?;
            count += 1;
        }
        for exp in self.get_expenses(period_id)? {
            let category = category_name(exp.category_id);
            let amount = exp.amount.to_string();
            wtr.write_record([
                period.month.as_str(),
                "expense",
                category.as_str(),
                amount.as_str(),
                exp.description.as_str(),
                exp.spent_at.as_str(),
            ])?;
            count += 1;
        }
        wtr.flush()?;
        Ok(count)
    }
}

impl PeriodStore for Database {
    fn get_allocations(&self, period_id: i64) -> Result<Vec<Allocation>> {
        Database::get_allocations(self, period_id)
    }

    fn get_expenses(&self, period_id: i64) -> Result<Vec<Expense>> {
        Database::get_expenses(self, period_id)
    }

    /// Archive + successor + rollover record under one IMMEDIATE transaction.
    ///
    /// The write lock is taken before the balance is re-read, so a second reset of the
    /// same lineage waits here and then sees the source already archived. Returning
    /// early drops `tx`, which rolls everything back.
    fn reset_period<F>(&mut self, period_id: i64, plan: F) -> Result<ResetReceipt, ResetError>
    where
        F: FnOnce(&crate::reset::PeriodBalance) -> Result<ResetPlan, ResetError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let source = query_period(&tx, period_id)?.ok_or_else(|| {
            ResetError::TransactionFailed(format!("period {period_id} not found"))
        })?;
        if !source.is_active() {
            return Err(ResetError::TransactionFailed(format!(
                "period {period_id} is already archived"
            )));
        }

        let allocations = query_allocations(&tx, period_id)?;
        let expenses = query_expenses(&tx, period_id)?;
        let balance = BalanceCalculator::summarize(&allocations, &expenses)
            .map_err(ResetError::transaction_failed)?;
        let plan = plan(&balance)?;

        let now = chrono::Utc::now().to_rfc3339();
        let month = source.next_month().map_err(ResetError::transaction_failed)?;

        let archived = tx.execute(
            "UPDATE periods SET archived_at = ?1 WHERE id = ?2 AND archived_at IS NULL",
            params![now, period_id],
        )?;
        if archived != 1 {
            return Err(ResetError::TransactionFailed(format!(
                "period {period_id} changed during reset"
            )));
        }

        tx.execute(
            "INSERT INTO periods (budget_id, month, income, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![source.budget_id, month, plan.new_income.to_string(), now],
        )?;
        let new_period_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO rollovers (budget_id, source_period_id, new_period_id, decision, amount, new_income, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                source.budget_id,
                period_id,
                new_period_id,
                plan.decision.as_str(),
                plan.rollover_amount.to_string(),
                plan.new_income.to_string(),
                now,
            ],
        )?;
        let rollover_id = tx.last_insert_rowid();

        tx.commit()?;

        Ok(ResetReceipt {
            balance,
            new_period: BudgetPeriod {
                id: Some(new_period_id),
                budget_id: source.budget_id,
                month,
                income: plan.new_income,
                created_at: now.clone(),
                archived_at: None,
            },
            rollover: RolloverRecord {
                id: Some(rollover_id),
                budget_id: source.budget_id,
                source_period_id: period_id,
                new_period_id,
                decision: plan.decision,
                amount: plan.rollover_amount,
                new_income: plan.new_income,
                created_at: now,
            },
        })
    }
}

// ── Row mapping ───────────────────────────────────────────────
//
// Free functions over `&Connection` so the same reads run on a plain connection or
// inside a transaction (which derefs to `Connection`).

fn query_period(conn: &Connection, id: i64) -> rusqlite::Result<Option<BudgetPeriod>> {
    conn.query_row(
        &format!("SELECT {PERIOD_COLUMNS} FROM periods WHERE id = ?1"),
        params![id],
        period_from_row,
    )
    .optional()
}

fn query_allocations(conn: &Connection, period_id: i64) -> rusqlite::Result<Vec<Allocation>> {
    let mut stmt = conn.prepare(
        "SELECT id, period_id, category_id, amount, created_at
         FROM allocations WHERE period_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![period_id], |row| {
        Ok(Allocation {
            id: Some(row.get(0)?),
            period_id: row.get(1)?,
            category_id: row.get(2)?,
            amount: decimal_at(row, 3)?,
            created_at: row.get(4)?,
        })
    })?;
    rows.collect()
}

fn query_expenses(conn: &Connection, period_id: i64) -> rusqlite::Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "SELECT id, period_id, category_id, amount, description, spent_at
         FROM expenses WHERE period_id = ?1 ORDER BY spent_at, id",
    )?;
    let rows = stmt.query_map(params![period_id], |row| {
        Ok(Expense {
            id: Some(row.get(0)?),
            period_id: row.get(1)?,
            category_id: row.get(2)?,
            amount: decimal_at(row, 3)?,
            description: row.get(4)?,
            spent_at: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn period_from_row(row: &Row<'_>) -> rusqlite::Result<BudgetPeriod> {
    Ok(BudgetPeriod {
        id: Some(row.get(0)?),
        budget_id: row.get(1)?,
        month: row.get(2)?,
        income: decimal_at(row, 3)?,
        created_at: row.get(4)?,
        archived_at: row.get(5)?,
    })
}

fn rollover_from_row(row: &Row<'_>) -> rusqlite::Result<RolloverRecord> {
    let decision: String = row.get(4)?;
    Ok(RolloverRecord {
        id: Some(row.get(0)?),
        budget_id: row.get(1)?,
        source_period_id: row.get(2)?,
        new_period_id: row.get(3)?,
        decision: RolloverDecision::parse(&decision).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown rollover decision '{decision}'").into(),
            )
        })?,
        amount: decimal_at(row, 5)?,
        new_income: decimal_at(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Amounts are stored as TEXT. A value that does not parse is a read error, never zero.
fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests;
