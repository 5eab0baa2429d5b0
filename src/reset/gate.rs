use rust_decimal::Decimal;

use crate::error::ResetError;
use crate::models::RolloverDecision;

/// The user's answer to "add the remaining balance to the new income?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum GateState {
    #[default]
    Undecided,
    Include,
    Exclude,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undecided => write!(f, "undecided"),
            Self::Include => write!(f, "include"),
            Self::Exclude => write!(f, "exclude"),
        }
    }
}

/// Single-use decision gate for one reset attempt.
///
/// Undecided -> Include | Exclude on a choice, back to Undecided on "change choice".
/// Once closed by a successful reset every transition fails with `GateClosed`.
#[derive(Debug, Clone)]
pub(crate) struct RolloverGate {
    state: GateState,
    remaining_balance: Decimal,
    closed: bool,
}

impl RolloverGate {
    pub(crate) fn new(remaining_balance: Decimal) -> Self {
        Self {
            state: GateState::Undecided,
            remaining_balance,
            closed: false,
        }
    }

    pub(crate) fn state(&self) -> GateState {
        self.state
    }

    /// With nothing left over there is nothing to decide.
    pub(crate) fn is_required(&self) -> bool {
        self.remaining_balance > Decimal::ZERO
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn choose_include(&mut self) -> Result<(), ResetError> {
        self.choose(GateState::Include)
    }

    pub(crate) fn choose_exclude(&mut self) -> Result<(), ResetError> {
        self.choose(GateState::Exclude)
    }

    pub(crate) fn change_choice(&mut self) -> Result<(), ResetError> {
        self.ensure_open()?;
        if self.state != GateState::Undecided {
            tracing::debug!(from = %self.state, "rollover choice cleared");
            self.state = GateState::Undecided;
        }
        Ok(())
    }

    fn choose(&mut self, next: GateState) -> Result<(), ResetError> {
        self.ensure_open()?;
        // A decided gate has to go back through Undecided first.
        if self.state != GateState::Undecided {
            return Ok(());
        }
        tracing::debug!(to = %next, "rollover choice made");
        self.state = next;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ResetError> {
        if self.closed {
            return Err(ResetError::GateClosed);
        }
        Ok(())
    }

    /// The decision a submit would carry right now.
    pub(crate) fn effective_decision(&self) -> Result<RolloverDecision, ResetError> {
        decision_for(self.state, self.remaining_balance)
    }

    /// Amount that would roll forward under the current state.
    pub(crate) fn rollover_amount(&self) -> Decimal {
        match self.effective_decision() {
            Ok(RolloverDecision::Included) => self.remaining_balance,
            _ => Decimal::ZERO,
        }
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }
}

/// Gate rule shared by the gate and the transaction: a zero balance needs no
/// decision and counts as excluded; a positive one needs an explicit choice.
pub(crate) fn decision_for(
    state: GateState,
    remaining_balance: Decimal,
) -> Result<RolloverDecision, ResetError> {
    match state {
        _ if remaining_balance <= Decimal::ZERO => Ok(RolloverDecision::Excluded),
        GateState::Include => Ok(RolloverDecision::Included),
        GateState::Exclude => Ok(RolloverDecision::Excluded),
        GateState::Undecided => Err(ResetError::DecisionRequired),
    }
}
