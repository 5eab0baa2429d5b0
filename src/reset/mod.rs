//! Closing a budget period and opening the next one.
//!
//! `BalanceCalculator` reads what is left, `RolloverGate` holds the user's choice
//! about it, and `ResetTransaction` commits archive + successor + rollover record
//! through a single `PeriodStore::reset_period` call. `ResetController` wires the
//! three to whatever collects input and shows notices.

mod balance;
mod controller;
mod gate;
mod notify;
mod transaction;

use anyhow::Result;

use crate::error::ResetError;
use crate::models::{Allocation, Expense};

pub(crate) use balance::{BalanceCalculator, PeriodBalance};
pub(crate) use controller::ResetController;
pub(crate) use gate::{GateState, RolloverGate};
pub(crate) use notify::{CacheKey, ConsoleNotifier, Notice, Notifier, RESET_INVALIDATIONS};
pub(crate) use transaction::{ResetPlan, ResetReceipt, ResetRequest, ResetTransaction};

/// The persistence collaborator the reset core depends on.
pub(crate) trait PeriodStore {
    fn get_allocations(&self, period_id: i64) -> Result<Vec<Allocation>>;

    fn get_expenses(&self, period_id: i64) -> Result<Vec<Expense>>;

    /// Atomically archive `period_id`, create its successor and record the rollover.
    ///
    /// Implementations must re-read the period's allocations and expenses inside the
    /// commit boundary and hand the fresh balance to `plan`. If `plan` or any write
    /// fails, nothing is applied.
    fn reset_period<F>(&mut self, period_id: i64, plan: F) -> Result<ResetReceipt, ResetError>
    where
        F: FnOnce(&PeriodBalance) -> Result<ResetPlan, ResetError>;
}
