use rust_decimal::Decimal;

use super::{
    BalanceCalculator, GateState, Notice, Notifier, PeriodBalance, PeriodStore, ResetReceipt,
    ResetRequest, ResetTransaction, RolloverGate, RESET_INVALIDATIONS,
};
use crate::error::ResetError;

/// Form state for resetting one period.
///
/// Opening computes the balance (a read failure means the reset is not offered).
/// Submitting validates locally, runs the transaction and reports the outcome to
/// the notifier: all cache keys plus a success notice, or a failure notice alone.
/// The submit runs under `&mut self`, so a second submit can only follow a finished
/// one; after a success the closed gate rejects it.
pub(crate) struct ResetController<'a, S: PeriodStore, N: Notifier> {
    store: &'a mut S,
    notifier: &'a mut N,
    period_id: i64,
    balance: PeriodBalance,
    gate: RolloverGate,
    income_input: String,
    validation_error: Option<&'static str>,
    completed: Option<i64>,
}

impl<'a, S: PeriodStore, N: Notifier> ResetController<'a, S, N> {
    pub(crate) fn open(
        store: &'a mut S,
        notifier: &'a mut N,
        period_id: i64,
    ) -> Result<Self, ResetError> {
        let balance = BalanceCalculator::compute(&*store, period_id)?;
        Ok(Self {
            store,
            notifier,
            period_id,
            balance,
            gate: RolloverGate::new(balance.remaining_balance),
            income_input: String::new(),
            validation_error: None,
            completed: None,
        })
    }

    pub(crate) fn remaining_balance(&self) -> Decimal {
        self.balance.remaining_balance
    }

    pub(crate) fn expense_count(&self) -> usize {
        self.balance.expense_count
    }

    pub(crate) fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Whether the include/exclude choice has to be shown at all.
    pub(crate) fn gate_required(&self) -> bool {
        self.gate.is_required()
    }

    pub(crate) fn validation_error(&self) -> Option<&'static str> {
        self.validation_error
    }

    pub(crate) fn new_period_id(&self) -> Option<i64> {
        self.completed
    }

    pub(crate) fn set_income(&mut self, raw: &str) {
        self.income_input = raw.to_string();
    }

    pub(crate) fn choose_include(&mut self) -> Result<(), ResetError> {
        self.gate.choose_include()
    }

    pub(crate) fn choose_exclude(&mut self) -> Result<(), ResetError> {
        self.gate.choose_exclude()
    }

    pub(crate) fn change_choice(&mut self) -> Result<(), ResetError> {
        self.gate.change_choice()
    }

    /// New income plus whatever the current choice rolls forward.
    pub(crate) fn total_available(&self) -> Option<Decimal> {
        ResetTransaction::parse_income(&self.income_input)
            .ok()
            .map(|income| income + self.gate.rollover_amount())
    }

    #[cfg(test)]
    pub(crate) fn can_submit(&self) -> bool {
        !self.gate.is_closed()
            && ResetTransaction::parse_income(&self.income_input).is_ok()
            && self.gate.effective_decision().is_ok()
    }

    pub(crate) fn submit(&mut self) -> Result<ResetReceipt, ResetError> {
        if self.gate.is_closed() {
            return Err(ResetError::AlreadySubmitted);
        }
        self.validation_error = None;

        if let Err(e) = ResetTransaction::parse_income(&self.income_input)
            .and_then(|_| self.gate.effective_decision())
        {
            self.validation_error = Some(e.user_message());
            return Err(e);
        }

        let request = ResetRequest {
            period_id: self.period_id,
            raw_income: self.income_input.clone(),
            gate: self.gate.state(),
            observed_balance: self.balance.remaining_balance,
        };

        match ResetTransaction::execute(&mut *self.store, &request) {
            Ok(receipt) => {
                self.gate.close();
                self.completed = Some(receipt.new_period_id());
                self.balance = receipt.balance;
                self.income_input.clear();
                self.notifier.invalidate(&RESET_INVALIDATIONS);
                self.notifier.notify(Notice::reset_succeeded());
                Ok(receipt)
            }
            Err(ResetError::DecisionRequired) => {
                // The balance grew after the form opened. Show the new amount and ask.
                self.validation_error = Some(ResetError::DecisionRequired.user_message());
                match BalanceCalculator::compute(&*self.store, self.period_id) {
                    Ok(balance) => {
                        self.balance = balance;
                        self.gate = RolloverGate::new(balance.remaining_balance);
                        Err(ResetError::DecisionRequired)
                    }
                    Err(e) => {
                        self.validation_error = Some(e.user_message());
                        Err(e)
                    }
                }
            }
            Err(e) if e.is_validation() => {
                self.validation_error = Some(e.user_message());
                Err(e)
            }
            Err(e) => {
                self.notifier.notify(Notice::reset_failed());
                Err(e)
            }
        }
    }
}
