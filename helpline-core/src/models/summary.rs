use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Generated summary of an expired session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Summary {
    pub session_id: String,
    pub bot_id: i64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(session_id: impl Into<String>, bot_id: i64, summary: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            bot_id,
            summary: summary.into(),
            created_at: Utc::now(),
        }
    }
}
