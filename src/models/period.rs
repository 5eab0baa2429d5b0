use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetPeriod {
    pub id: Option<i64>,
    pub budget_id: i64,
    /// Format: "YYYY-MM"
    pub month: String,
    pub income: Decimal,
    pub created_at: String,
    /// Set exactly once, by a completed reset. `None` while active.
    pub archived_at: Option<String>,
}

impl BudgetPeriod {
    pub fn new(budget_id: i64, month: String, income: Decimal) -> Self {
        Self {
            id: None,
            budget_id,
            month,
            income,
            created_at: chrono::Utc::now().to_rfc3339(),
            archived_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.archived_at.is_none()
    }

    /// Month label of the period that follows this one.
    pub fn next_month(&self) -> Result<String> {
        next_month_label(&self.month)
    }
}

/// "2024-12" -> "2025-01"
pub(crate) fn next_month_label(month: &str) -> Result<String> {
    let first = parse_month(month)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .ok_or_else(|| anyhow!("Month out of range: {month}"))?;
    Ok(next.format("%Y-%m").to_string())
}

/// Validate a "YYYY-MM" label and return the first day of that month.
pub(crate) fn parse_month(month: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid month '{month}', expected YYYY-MM"))
}
