/// A budget lineage: the stable "my budget" identity that spans periods.
#[derive(Debug, Clone)]
pub struct Budget {
    pub id: Option<i64>,
    pub name: String,
    pub created_at: String,
}

impl Budget {
    pub fn new(name: String) -> Self {
        Self {
            id: None,
            name,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
