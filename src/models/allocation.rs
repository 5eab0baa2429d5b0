use rust_decimal::Decimal;

/// Money planned for one category within one period.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub id: Option<i64>,
    pub period_id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub created_at: String,
}

impl Allocation {
    pub fn new(period_id: i64, category_id: i64, amount: Decimal) -> Self {
        Self {
            id: None,
            period_id,
            category_id,
            amount,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
