use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::error::HelplineError;

/// Composite identity of a human support agent. Its rendered form
/// ("id:name:email") doubles as the agent's active-session queue key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentKey {
    pub agent_id: String,
    pub agent_name: String,
    pub agent_email: String,
}

impl AgentKey {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        agent_email: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            agent_email: agent_email.into(),
        }
    }
}

impl std::fmt::Display for AgentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.agent_id, self.agent_name, self.agent_email)
    }
}

impl FromStr for AgentKey {
    type Err = HelplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(name), Some(email)) if !id.is_empty() && !email.is_empty() => {
                Ok(AgentKey::new(id, name, email))
            }
            _ => Err(HelplineError::InvalidAgentKey(s.to_string())),
        }
    }
}

/// A human support agent scoped to a workspace. `is_active` is toggled on
/// login/logout; membership in the agent queue is ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub agent_id: String,
    pub agent_name: String,
    pub agent_email: String,
    pub workspace_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Agent {
    pub fn key(&self) -> AgentKey {
        AgentKey::new(
            self.agent_id.clone(),
            self.agent_name.clone(),
            self.agent_email.clone(),
        )
    }
}
