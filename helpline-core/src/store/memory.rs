//! In-memory directory and tenant store.
//!
//! Mirrors the Postgres backend's visible behavior so scheduler passes and
//! services can be exercised without a database. Also useful for local
//! single-process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{HelplineError, HelplineResult};
use crate::models::{
    Agent, AgentKey, Profile, RoleEntry, SessionRecord, Summary, Tenant, Workspace,
    WorkspaceSettings,
};

use super::{Directory, TenantStore};

#[derive(Default)]
struct DirectoryState {
    tenants: Vec<Tenant>,
    workspaces: Vec<Workspace>,
    settings: Vec<WorkspaceSettings>,
    stores: HashMap<String, Arc<MemoryTenantStore>>,
}

/// Directory over plain vectors. Tenants are "discovered" in insertion
/// order, matching the schema scan of the Postgres backend.
#[derive(Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant together with a fresh empty store, returning the
    /// store handle for direct seeding.
    pub async fn add_tenant(&self, tenant: Tenant) -> Arc<MemoryTenantStore> {
        let mut state = self.state.write().await;
        let store = Arc::new(MemoryTenantStore::new());
        state.stores.insert(tenant.slug.clone(), Arc::clone(&store));
        state.tenants.push(tenant);
        store
    }

    pub async fn add_workspace(&self, workspace: Workspace) {
        self.state.write().await.workspaces.push(workspace);
    }

    pub async fn add_settings(&self, settings: WorkspaceSettings) {
        self.state.write().await.settings.push(settings);
    }

    pub async fn deactivate_tenant(&self, bot_id: i64) {
        let mut state = self.state.write().await;
        for tenant in &mut state.tenants {
            if tenant.bot_id == bot_id {
                tenant.is_active = false;
                tenant.modified_at = Utc::now();
            }
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn list_tenant_slugs(&self) -> HelplineResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.tenants.iter().map(|t| t.slug.clone()).collect())
    }

    async fn find_active_tenant(&self, slug: &str) -> HelplineResult<Option<Tenant>> {
        let state = self.state.read().await;
        Ok(state
            .tenants
            .iter()
            .find(|t| t.slug == slug && t.is_active)
            .cloned())
    }

    async fn active_workspaces(&self, bot_id: i64) -> HelplineResult<Vec<Workspace>> {
        let state = self.state.read().await;
        Ok(state
            .workspaces
            .iter()
            .filter(|w| w.bot_id == bot_id && w.is_active)
            .cloned()
            .collect())
    }

    async fn find_workspace(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<Workspace>> {
        let state = self.state.read().await;
        Ok(state
            .workspaces
            .iter()
            .find(|w| w.bot_id == bot_id && w.workspace_id == workspace_id && w.is_active)
            .cloned())
    }

    async fn find_settings(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<WorkspaceSettings>> {
        let state = self.state.read().await;
        Ok(state
            .settings
            .iter()
            .find(|s| s.bot_id == bot_id && s.workspace_id == workspace_id)
            .cloned())
    }

    async fn tenant_store(&self, slug: &str) -> HelplineResult<Arc<dyn TenantStore>> {
        let state = self.state.read().await;
        state
            .stores
            .get(slug)
            .map(|s| Arc::clone(s) as Arc<dyn TenantStore>)
            .ok_or_else(|| HelplineError::TenantNotFound(slug.to_string()))
    }
}

#[derive(Default)]
struct TenantState {
    agents: Vec<Agent>,
    sessions: HashMap<String, SessionRecord>,
    profiles: HashMap<String, Profile>,
    /// Row counts per session id, standing in for the context buffer.
    history: HashMap<String, u64>,
    summaries: HashMap<String, Summary>,
}

/// One tenant's collections behind a single lock.
#[derive(Default)]
pub struct MemoryTenantStore {
    state: RwLock<TenantState>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context buffer of `rows` entries for a session.
    pub async fn seed_history(&self, session_id: &str, rows: u64) {
        self.state
            .write()
            .await
            .history
            .insert(session_id.to_string(), rows);
    }

    pub async fn history_rows(&self, session_id: &str) -> u64 {
        self.state
            .read()
            .await
            .history
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn active_agents(&self, workspace_id: i64) -> HelplineResult<Vec<Agent>> {
        let state = self.state.read().await;
        Ok(state
            .agents
            .iter()
            .filter(|a| a.workspace_id == workspace_id && a.is_active)
            .cloned()
            .collect())
    }

    async fn find_active_agent(
        &self,
        key: &AgentKey,
        workspace_id: i64,
    ) -> HelplineResult<Option<Agent>> {
        let state = self.state.read().await;
        Ok(state
            .agents
            .iter()
            .find(|a| a.workspace_id == workspace_id && a.is_active && a.key() == *key)
            .cloned())
    }

    async fn insert_agent(&self, agent: &Agent) -> HelplineResult<()> {
        self.state.write().await.agents.push(agent.clone());
        Ok(())
    }

    async fn deactivate_agent(&self, key: &AgentKey, workspace_id: i64) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        for agent in &mut state.agents {
            if agent.workspace_id == workspace_id && agent.key() == *key {
                agent.is_active = false;
                agent.modified_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn insert_session(&self, session: &SessionRecord) -> HelplineResult<()> {
        self.state
            .write()
            .await
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> HelplineResult<Option<SessionRecord>> {
        Ok(self.state.read().await.sessions.get(session_id).cloned())
    }

    async fn all_sessions(&self) -> HelplineResult<Vec<SessionRecord>> {
        let state = self.state.read().await;
        let mut sessions: Vec<_> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn open_handoff_sessions(&self) -> HelplineResult<Vec<SessionRecord>> {
        let state = self.state.read().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| !s.end_conversation && (s.transfer_conversation || s.human_intervention))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn sessions_awaiting_sentiment(&self) -> HelplineResult<Vec<SessionRecord>> {
        let state = self.state.read().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.sentiment.is_none() && s.language.is_none())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn sessions_awaiting_agent_sentiment(&self) -> HelplineResult<Vec<SessionRecord>> {
        let state = self.state.read().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.end_conversation && s.agent_sentiment.is_none())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn sessions_awaiting_tags(&self) -> HelplineResult<Vec<SessionRecord>> {
        let state = self.state.read().await;
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.tags.is_none())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn append_role(
        &self,
        session_id: &str,
        entry: &RoleEntry,
        latest: DateTime<Utc>,
    ) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| HelplineError::SessionNotFound(session_id.to_string()))?;
        session.roles.0.push(entry.clone());
        session.latest_timestamp = latest;
        Ok(())
    }

    async fn mark_session_ended(
        &self,
        session_id: &str,
        agent_expiry: bool,
    ) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(session_id) {
            if !session.end_conversation {
                session.end_conversation = true;
                session.agent_expiry = session.agent_expiry || agent_expiry;
            }
        }
        Ok(())
    }

    async fn set_language_sentiment(
        &self,
        session_id: &str,
        language: &str,
        sentiment: &str,
    ) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.language = Some(language.to_string());
            session.sentiment = Some(sentiment.to_string());
        }
        Ok(())
    }

    async fn set_agent_sentiment(&self, session_id: &str, sentiment: &str) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.agent_sentiment = Some(sentiment.to_string());
        }
        Ok(())
    }

    async fn set_tags(&self, session_id: &str, tags: &[String]) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.tags = Some(tags.to_vec());
        }
        Ok(())
    }

    async fn insert_profile(&self, profile: &Profile) -> HelplineResult<()> {
        self.state
            .write()
            .await
            .profiles
            .insert(profile.session_id.clone(), profile.clone());
        Ok(())
    }

    async fn find_profile(&self, session_id: &str) -> HelplineResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(session_id).cloned())
    }

    async fn touch_profile(&self, session_id: &str, ts: DateTime<Utc>) -> HelplineResult<()> {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(session_id) {
            profile.latest_timestamp = ts;
        }
        Ok(())
    }

    async fn purge_history(&self, session_id: &str) -> HelplineResult<u64> {
        let mut state = self.state.write().await;
        Ok(state.history.remove(session_id).unwrap_or(0))
    }

    async fn find_summary(&self, session_id: &str) -> HelplineResult<Option<Summary>> {
        Ok(self.state.read().await.summaries.get(session_id).cloned())
    }

    async fn insert_summary(&self, summary: &Summary) -> HelplineResult<()> {
        self.state
            .write()
            .await
            .summaries
            .insert(summary.session_id.clone(), summary.clone());
        Ok(())
    }
}
