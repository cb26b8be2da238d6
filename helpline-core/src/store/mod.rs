//! Tenant directory and per-tenant document access.
//!
//! The coordinator consumes these narrow interfaces only: tenant discovery
//! through the main schema, and per-tenant session/profile/agent/history/
//! summary collections behind a [`TenantStore`] handle. Backends: Postgres
//! (schema-per-tenant) for production, in-memory twins for tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::HelplineResult;
use crate::models::{
    Agent, AgentKey, Profile, RoleEntry, SessionRecord, Summary, Tenant, Workspace,
    WorkspaceSettings,
};

pub use memory::{MemoryDirectory, MemoryTenantStore};
pub use postgres::{PgDirectory, PgTenantStore};

/// Global directory: tenants, workspaces and settings in the main schema,
/// plus discovery of tenant schemas by naming convention.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Enumerate tenant slugs from the schemas carrying the tenancy suffix.
    /// This is the "list all tenants" operation every pass starts from.
    async fn list_tenant_slugs(&self) -> HelplineResult<Vec<String>>;

    async fn find_active_tenant(&self, slug: &str) -> HelplineResult<Option<Tenant>>;

    async fn active_workspaces(&self, bot_id: i64) -> HelplineResult<Vec<Workspace>>;

    async fn find_workspace(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<Workspace>>;

    async fn find_settings(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<WorkspaceSettings>>;

    /// Open the per-tenant collections for a discovered slug.
    async fn tenant_store(&self, slug: &str) -> HelplineResult<Arc<dyn TenantStore>>;
}

/// Per-tenant collections: sessions, profiles, agents, history buffers and
/// summaries.
#[async_trait]
pub trait TenantStore: Send + Sync {
    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------
    async fn active_agents(&self, workspace_id: i64) -> HelplineResult<Vec<Agent>>;

    async fn find_active_agent(
        &self,
        key: &AgentKey,
        workspace_id: i64,
    ) -> HelplineResult<Option<Agent>>;

    async fn insert_agent(&self, agent: &Agent) -> HelplineResult<()>;

    async fn deactivate_agent(&self, key: &AgentKey, workspace_id: i64) -> HelplineResult<()>;

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------
    async fn insert_session(&self, session: &SessionRecord) -> HelplineResult<()>;

    async fn find_session(&self, session_id: &str) -> HelplineResult<Option<SessionRecord>>;

    async fn all_sessions(&self) -> HelplineResult<Vec<SessionRecord>>;

    /// Open sessions with a transfer or intervention set: the agent-side
    /// expiry scan.
    async fn open_handoff_sessions(&self) -> HelplineResult<Vec<SessionRecord>>;

    /// Sessions with both sentiment and language unset.
    async fn sessions_awaiting_sentiment(&self) -> HelplineResult<Vec<SessionRecord>>;

    /// Ended sessions with agent sentiment unset.
    async fn sessions_awaiting_agent_sentiment(&self) -> HelplineResult<Vec<SessionRecord>>;

    /// Sessions never tag-classified.
    async fn sessions_awaiting_tags(&self) -> HelplineResult<Vec<SessionRecord>>;

    /// Atomically append a turn to a session's role array and advance its
    /// latest timestamp. The store-side array append replaces the original
    /// read-modify-write, so concurrent passes cannot clobber each other.
    async fn append_role(
        &self,
        session_id: &str,
        entry: &RoleEntry,
        latest: DateTime<Utc>,
    ) -> HelplineResult<()>;

    /// Mark a session ended; `agent_expiry` records a pre-connection
    /// timeout. Already-ended sessions are left untouched.
    async fn mark_session_ended(&self, session_id: &str, agent_expiry: bool)
        -> HelplineResult<()>;

    async fn set_language_sentiment(
        &self,
        session_id: &str,
        language: &str,
        sentiment: &str,
    ) -> HelplineResult<()>;

    async fn set_agent_sentiment(&self, session_id: &str, sentiment: &str) -> HelplineResult<()>;

    async fn set_tags(&self, session_id: &str, tags: &[String]) -> HelplineResult<()>;

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------
    async fn insert_profile(&self, profile: &Profile) -> HelplineResult<()>;

    async fn find_profile(&self, session_id: &str) -> HelplineResult<Option<Profile>>;

    async fn touch_profile(&self, session_id: &str, ts: DateTime<Utc>) -> HelplineResult<()>;

    // ------------------------------------------------------------------
    // History buffers and summaries
    // ------------------------------------------------------------------
    /// Delete a session's LLM context buffer. Idempotent; returns the number
    /// of rows reclaimed.
    async fn purge_history(&self, session_id: &str) -> HelplineResult<u64>;

    async fn find_summary(&self, session_id: &str) -> HelplineResult<Option<Summary>>;

    async fn insert_summary(&self, summary: &Summary) -> HelplineResult<()>;
}
