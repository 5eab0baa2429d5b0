use rust_decimal::Decimal;

/// What the user chose to do with the remaining balance at reset time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverDecision {
    Included,
    Excluded,
}

impl RolloverDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Included => "included",
            Self::Excluded => "excluded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "included" => Some(Self::Included),
            "excluded" => Some(Self::Excluded),
            _ => None,
        }
    }
}

impl std::fmt::Display for RolloverDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Written once per completed reset, linking the archived period to its successor.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverRecord {
    pub id: Option<i64>,
    pub budget_id: i64,
    pub source_period_id: i64,
    pub new_period_id: i64,
    pub decision: RolloverDecision,
    /// Remaining balance carried forward; zero when excluded.
    pub amount: Decimal,
    pub new_income: Decimal,
    pub created_at: String,
}
