//! Errors raised by the period reset core.
//!
//! The validation family (`InvalidIncome`, `DecisionRequired`, `GateClosed`,
//! `AlreadySubmitted`) is detected before anything is written and is meant to be
//! shown inline. `DataUnavailable` and `TransactionFailed` come from the store.
//! None of them are fatal: retrying recomputes everything from fresh reads.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum ResetError {
    /// New income was empty, not a number, or not strictly positive.
    #[error("invalid income: {0:?}")]
    InvalidIncome(String),

    /// A remaining balance exists and no rollover choice was made.
    #[error("a rollover decision is required for the remaining balance")]
    DecisionRequired,

    /// The gate has already been used for a completed reset.
    #[error("rollover choice is closed after a completed reset")]
    GateClosed,

    /// This controller already completed its reset.
    #[error("reset already submitted")]
    AlreadySubmitted,

    /// Allocations or expenses for the period could not be read.
    #[error("budget data unavailable: {0}")]
    DataUnavailable(String),

    /// The atomic commit did not happen. Source period state is unchanged.
    #[error("reset transaction failed: {0}")]
    TransactionFailed(String),
}

impl ResetError {
    pub(crate) fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidIncome(_) | Self::DecisionRequired | Self::GateClosed | Self::AlreadySubmitted
        )
    }

    /// Message suitable for showing next to the form.
    pub(crate) fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidIncome(_) => "Please enter a valid income amount",
            Self::DecisionRequired => "Please choose whether to include remaining balance",
            Self::GateClosed | Self::AlreadySubmitted => "This budget has already been reset",
            Self::DataUnavailable(_) => "Could not load budget data. Please try again.",
            Self::TransactionFailed(_) => "Failed to reset budget. Please try again.",
        }
    }

    pub(crate) fn data_unavailable(err: impl std::fmt::Display) -> Self {
        Self::DataUnavailable(err.to_string())
    }

    pub(crate) fn transaction_failed(err: impl std::fmt::Display) -> Self {
        Self::TransactionFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for ResetError {
    fn from(err: rusqlite::Error) -> Self {
        Self::transaction_failed(err)
    }
}
