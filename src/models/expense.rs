use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: Option<i64>,
    pub period_id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub spent_at: String,
}

impl Expense {
    pub fn new(period_id: i64, category_id: i64, amount: Decimal, description: String) -> Self {
        Self {
            id: None,
            period_id,
            category_id,
            amount,
            description,
            spent_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
