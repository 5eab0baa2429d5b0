/// Cached views that go stale when a period is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Budget,
    Expenses,
    BudgetSummary,
    CategoriesWithAllocations,
}

impl CacheKey {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Expenses => "expenses",
            Self::BudgetSummary => "budget-summary",
            Self::CategoriesWithAllocations => "categories-with-allocations",
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a successful reset invalidates. Sent as one batch, never on failure.
pub(crate) const RESET_INVALIDATIONS: [CacheKey; 4] = [
    CacheKey::Budget,
    CacheKey::Expenses,
    CacheKey::BudgetSummary,
    CacheKey::CategoriesWithAllocations,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    Success { title: String, description: String },
    Failure { title: String, description: String },
}

impl Notice {
    pub(crate) fn reset_succeeded() -> Self {
        Self::Success {
            title: "Budget Reset Successfully".into(),
            description: "Your monthly budget has been reset with new income.".into(),
        }
    }

    pub(crate) fn reset_failed() -> Self {
        Self::Failure {
            title: "Error".into(),
            description: "Failed to reset budget. Please try again.".into(),
        }
    }
}

/// Receives cache invalidations and user notices from the controller.
pub(crate) trait Notifier {
    fn invalidate(&mut self, keys: &[CacheKey]);
    fn notify(&mut self, notice: Notice);
}

/// Prints notices for the command line. There is no cache, so invalidations are
/// only logged.
#[derive(Debug, Default)]
pub(crate) struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn invalidate(&mut self, keys: &[CacheKey]) {
        for key in keys {
            tracing::debug!(key = %key, "invalidated");
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Success { title, description } => println!("{title}: {description}"),
            Notice::Failure { title, description } => eprintln!("{title}: {description}"),
        }
    }
}
