use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Communication channel a session arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "channel_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Whatsapp,
    Sdk,
}

/// One record per chat session: channel, language preference, contact info
/// and activity timestamps. Created at first contact, touched on every
/// exchange.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub session_id: String,
    pub workspace_id: i64,
    pub channel: Channel,
    /// Display-language preference, matched against the message catalog.
    pub preference: String,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub latest_timestamp: DateTime<Utc>,
}

impl Profile {
    pub fn new(
        session_id: impl Into<String>,
        workspace_id: i64,
        channel: Channel,
        preference: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            workspace_id,
            channel,
            preference: preference.into(),
            contact: None,
            created_at: now,
            latest_timestamp: now,
        }
    }
}
