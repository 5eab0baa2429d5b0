pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS budgets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS periods (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    budget_id   INTEGER NOT NULL REFERENCES budgets(id),
    month       TEXT NOT NULL,
    income      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    archived_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_periods_budget ON periods(budget_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_periods_one_active ON periods(budget_id) WHERE archived_at IS NULL;

CREATE TABLE IF NOT EXISTS categories (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS allocations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    period_id   INTEGER NOT NULL REFERENCES periods(id),
    category_id INTEGER NOT NULL REFERENCES categories(id),
    amount      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_allocations_period ON allocations(period_id);

CREATE TABLE IF NOT EXISTS expenses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    period_id   INTEGER NOT NULL REFERENCES periods(id),
    category_id INTEGER NOT NULL REFERENCES categories(id),
    amount      TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    spent_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_expenses_period ON expenses(period_id);

CREATE TABLE IF NOT EXISTS rollovers (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    budget_id        INTEGER NOT NULL REFERENCES budgets(id),
    source_period_id INTEGER NOT NULL UNIQUE REFERENCES periods(id),
    new_period_id    INTEGER NOT NULL UNIQUE REFERENCES periods(id),
    decision         TEXT NOT NULL CHECK (decision IN ('included', 'excluded')),
    amount           TEXT NOT NULL,
    new_income       TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

-- Archived periods keep their records exactly as they were.

CREATE TRIGGER IF NOT EXISTS trg_allocations_frozen_insert BEFORE INSERT ON allocations
WHEN (SELECT archived_at FROM periods WHERE id = NEW.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_allocations_frozen_update BEFORE UPDATE ON allocations
WHEN (SELECT archived_at FROM periods WHERE id = OLD.period_id) IS NOT NULL
  OR (SELECT archived_at FROM periods WHERE id = NEW.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_allocations_frozen_delete BEFORE DELETE ON allocations
WHEN (SELECT archived_at FROM periods WHERE id = OLD.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_expenses_frozen_insert BEFORE INSERT ON expenses
WHEN (SELECT archived_at FROM periods WHERE id = NEW.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_expenses_frozen_update BEFORE UPDATE ON expenses
WHEN (SELECT archived_at FROM periods WHERE id = OLD.period_id) IS NOT NULL
  OR (SELECT archived_at FROM periods WHERE id = NEW.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_expenses_frozen_delete BEFORE DELETE ON expenses
WHEN (SELECT archived_at FROM periods WHERE id = OLD.period_id) IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'period is archived'); END;

CREATE TRIGGER IF NOT EXISTS trg_periods_archive_once BEFORE UPDATE ON periods
WHEN OLD.archived_at IS NOT NULL
BEGIN SELECT RAISE(ABORT, 'archived periods are immutable'); END;

CREATE TRIGGER IF NOT EXISTS trg_periods_no_delete BEFORE DELETE ON periods
BEGIN SELECT RAISE(ABORT, 'periods cannot be deleted'); END;

CREATE TRIGGER IF NOT EXISTS trg_rollovers_append_only BEFORE UPDATE ON rollovers
BEGIN SELECT RAISE(ABORT, 'rollover records are append-only'); END;
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
