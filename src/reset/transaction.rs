use rust_decimal::Decimal;
use std::str::FromStr;

use super::gate::decision_for;
use super::{GateState, PeriodBalance, PeriodStore};
use crate::error::ResetError;
use crate::models::{BudgetPeriod, RolloverDecision, RolloverRecord};

/// Input for one reset attempt.
#[derive(Debug, Clone)]
pub(crate) struct ResetRequest {
    pub(crate) period_id: i64,
    /// Exactly what the user typed.
    pub(crate) raw_income: String,
    pub(crate) gate: GateState,
    /// Balance the user was shown. Informational only; the commit re-reads.
    pub(crate) observed_balance: Decimal,
}

/// What the commit will write, derived from the commit-time balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResetPlan {
    pub(crate) decision: RolloverDecision,
    pub(crate) rollover_amount: Decimal,
    pub(crate) new_income: Decimal,
}

#[derive(Debug, Clone)]
pub(crate) struct ResetReceipt {
    /// Balance of the archived period as read inside the commit.
    pub(crate) balance: PeriodBalance,
    pub(crate) new_period: BudgetPeriod,
    pub(crate) rollover: RolloverRecord,
}

impl ResetReceipt {
    pub(crate) fn new_period_id(&self) -> i64 {
        self.rollover.new_period_id
    }
}

pub(crate) struct ResetTransaction;

impl ResetTransaction {
    /// Parse user-entered income. Accepts `$` and thousands separators.
    pub(crate) fn parse_income(raw: &str) -> Result<Decimal, ResetError> {
        let cleaned = raw.trim().replace(['$', ','], "");
        if cleaned.is_empty() {
            return Err(ResetError::InvalidIncome(raw.to_string()));
        }
        match Decimal::from_str(&cleaned) {
            Ok(income) if income > Decimal::ZERO => Ok(income),
            _ => Err(ResetError::InvalidIncome(raw.to_string())),
        }
    }

    /// Decide the rollover from the balance read at commit time.
    pub(crate) fn plan(
        balance: &PeriodBalance,
        new_income: Decimal,
        gate: GateState,
    ) -> Result<ResetPlan, ResetError> {
        let decision = decision_for(gate, balance.remaining_balance)?;
        let rollover_amount = match decision {
            RolloverDecision::Included => balance.remaining_balance,
            RolloverDecision::Excluded => Decimal::ZERO,
        };
        let total = new_income
            .checked_add(rollover_amount)
            .ok_or_else(|| ResetError::InvalidIncome(new_income.to_string()))?;
        Ok(ResetPlan {
            decision,
            rollover_amount,
            new_income: total,
        })
    }

    /// Validate, then commit through the store's single atomic reset.
    ///
    /// Income and the decision against the shown balance are checked before the store
    /// is touched. The decision is checked again against the balance re-read inside
    /// the commit, so an expense recorded after the user
    /// opened the form can still turn a zero balance into `DecisionRequired`.
    pub(crate) fn execute<S: PeriodStore>(
        store: &mut S,
        request: &ResetRequest,
    ) -> Result<ResetReceipt, ResetError> {
        let income = Self::parse_income(&request.raw_income)?;
        let period_id = request.period_id;
        let gate = request.gate;
        let observed = request.observed_balance;
        // Undecided against a balance the user was already shown fails without locking.
        decision_for(gate, observed)?;

        let result = store.reset_period(period_id, |balance| {
            if balance.remaining_balance != observed {
                tracing::warn!(
                    period_id,
                    observed = %observed,
                    actual = %balance.remaining_balance,
                    "remaining balance changed since it was shown; using current value"
                );
            }
            Self::plan(balance, income, gate)
        });

        match &result {
            Ok(receipt) => tracing::info!(
                period_id,
                new_period_id = receipt.new_period_id(),
                month = %receipt.new_period.month,
                decision = %receipt.rollover.decision,
                rollover = %receipt.rollover.amount,
                new_income = %receipt.new_period.income,
                "budget period reset"
            ),
            Err(e) => tracing::warn!(period_id, error = %e, "budget reset rolled back"),
        }
        result
    }
}
