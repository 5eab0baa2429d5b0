use rust_decimal::Decimal;

use super::PeriodStore;
use crate::error::ResetError;
use crate::models::{Allocation, Expense};

/// Totals for one period as read from its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeriodBalance {
    pub(crate) allocated: Decimal,
    pub(crate) spent: Decimal,
    /// `allocated - spent`, floored at zero. Overspending never goes negative.
    pub(crate) remaining_balance: Decimal,
    /// Only for telling the user how many records get archived.
    pub(crate) expense_count: usize,
}

impl PeriodBalance {
    pub(crate) fn has_remaining(&self) -> bool {
        self.remaining_balance > Decimal::ZERO
    }
}

pub(crate) struct BalanceCalculator;

impl BalanceCalculator {
    /// Totals over already-loaded records. A sum too large for `Decimal` is
    /// `DataUnavailable`.
    pub(crate) fn summarize(
        allocations: &[Allocation],
        expenses: &[Expense],
    ) -> Result<PeriodBalance, ResetError> {
        let allocated = checked_total(allocations.iter().map(|a| a.amount), "allocations")?;
        let spent = checked_total(expenses.iter().map(|e| e.amount), "expenses")?;
        Ok(PeriodBalance {
            allocated,
            spent,
            remaining_balance: (allocated - spent).max(Decimal::ZERO),
            expense_count: expenses.len(),
        })
    }

    /// Read both record sets for `period_id`. Either read failing is `DataUnavailable`;
    /// no partial balance is ever returned.
    pub(crate) fn compute<S: PeriodStore>(
        store: &S,
        period_id: i64,
    ) -> Result<PeriodBalance, ResetError> {
        let allocations = store
            .get_allocations(period_id)
            .map_err(ResetError::data_unavailable)?;
        let expenses = store
            .get_expenses(period_id)
            .map_err(ResetError::data_unavailable)?;
        let balance = Self::summarize(&allocations, &expenses)?;
        tracing::debug!(
            period_id,
            allocated = %balance.allocated,
            spent = %balance.spent,
            remaining = %balance.remaining_balance,
            expenses = balance.expense_count,
            "computed period balance"
        );
        Ok(balance)
    }
}

fn checked_total(
    mut amounts: impl Iterator<Item = Decimal>,
    what: &str,
) -> Result<Decimal, ResetError> {
    amounts
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| ResetError::DataUnavailable(format!("{what} total overflowed")))
}
