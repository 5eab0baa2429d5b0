mod allocation;
mod budget;
mod category;
mod expense;
mod period;
mod rollover;

pub use allocation::Allocation;
pub use budget::Budget;
pub use category::Category;
pub use expense::Expense;
pub use period::BudgetPeriod;
pub(crate) use period::parse_month;
pub use rollover::{RolloverDecision, RolloverRecord};
