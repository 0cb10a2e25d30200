use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticTest {
    pub id: i64,
    pub consultation_id: i64,
    pub test_name: String,
    pub test_type: Option<String>,
    pub priority: Option<String>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDiagnosticTest {
    pub test_name: String,
    pub test_type: Option<String>,
    pub priority: Option<String>,
    pub reason: Option<String>,
}
