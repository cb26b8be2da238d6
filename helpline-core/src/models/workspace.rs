use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which chat backend serves a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "llm_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LlmKind {
    Openai,
    Groq,
    Ollama,
    Anythingllm,
}

impl std::fmt::Display for LlmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmKind::Openai => write!(f, "openai"),
            LlmKind::Groq => write!(f, "groq"),
            LlmKind::Ollama => write!(f, "ollama"),
            LlmKind::Anythingllm => write!(f, "anythingllm"),
        }
    }
}

/// A configured conversational context within a tenant: one LLM
/// configuration plus a concurrent-session limit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workspace {
    pub bot_id: i64,
    pub workspace_id: i64,
    pub llm: LlmKind,
    pub model: String,
    pub llm_api_key: Option<String>,
    pub llm_url: Option<String>,
    /// Max concurrent sessions per agent under auto-assignment.
    pub sessions_limit: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Per-workspace coordinator toggles (the original "configuration"
/// collection).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkspaceSettings {
    pub bot_id: i64,
    pub workspace_id: i64,
    pub auto_assignment: bool,
    /// Conversation-level sentiment + language classification.
    pub conversation_sentiment: bool,
    /// Agent-response sentiment capture. Also controls whether synthetic
    /// arrival messages carry a default "Neutral" sentiment.
    pub agent_sentiment: bool,
    /// Summary generation for sessions that expire without handoff.
    pub summary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_kind_serde_names() {
        assert_eq!(
            serde_json::to_value(LlmKind::Anythingllm).unwrap(),
            serde_json::json!("anythingllm")
        );
        let kind: LlmKind = serde_json::from_value(serde_json::json!("groq")).unwrap();
        assert_eq!(kind, LlmKind::Groq);
    }

    #[test]
    fn test_llm_kind_display() {
        assert_eq!(LlmKind::Openai.to_string(), "openai");
        assert_eq!(LlmKind::Ollama.to_string(), "ollama");
    }
}
