//! Auto-assignment: drain workspace wait-queues onto the least-loaded
//! eligible agents.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ProviderFactory;
use crate::config::MessageCatalog;
use crate::error::HelplineResult;
use crate::models::{
    AgentKey, RoleEntry, SessionRecord, Tenant, TurnKind, Workspace, WorkspaceSettings,
};
use crate::queue::{wait_queue_key, QueueStore};
use crate::store::{Directory, TenantStore};

pub struct AssignmentPass {
    directory: Arc<dyn Directory>,
    queue: Arc<dyn QueueStore>,
    providers: Arc<dyn ProviderFactory>,
    messages: MessageCatalog,
    transfer_prefix: String,
}

impl AssignmentPass {
    pub fn new(
        directory: Arc<dyn Directory>,
        queue: Arc<dyn QueueStore>,
        providers: Arc<dyn ProviderFactory>,
        messages: MessageCatalog,
        transfer_prefix: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            queue,
            providers,
            messages,
            transfer_prefix: transfer_prefix.into(),
        }
    }

    pub async fn run(&self) -> HelplineResult<()> {
        for (tenant, store) in super::discover_tenants(self.directory.as_ref()).await? {
            let workspaces = match self.directory.active_workspaces(tenant.bot_id).await {
                Ok(workspaces) => workspaces,
                Err(error) => {
                    warn!(tenant = %tenant.slug, %error, "workspace listing failed, skipping tenant");
                    continue;
                }
            };

            for workspace in workspaces {
                if let Err(error) = self.drain_workspace(&tenant, store.as_ref(), &workspace).await
                {
                    warn!(
                        tenant = %tenant.slug,
                        workspace = workspace.workspace_id,
                        %error,
                        "wait-queue drain failed, skipping workspace"
                    );
                }
            }
        }

        Ok(())
    }

    /// Drain one workspace's wait-queue front-to-back. Stops at the first
    /// queued session with no eligible agent so later arrivals cannot jump
    /// ahead of it.
    async fn drain_workspace(
        &self,
        tenant: &Tenant,
        store: &dyn TenantStore,
        workspace: &Workspace,
    ) -> HelplineResult<()> {
        let settings = match self
            .directory
            .find_settings(tenant.bot_id, workspace.workspace_id)
            .await?
        {
            Some(settings) if settings.auto_assignment => settings,
            Some(_) => return Ok(()),
            None => {
                debug!(
                    tenant = %tenant.slug,
                    workspace = workspace.workspace_id,
                    "no settings record, skipping workspace"
                );
                return Ok(());
            }
        };

        let agents = store.active_agents(workspace.workspace_id).await?;
        if agents.is_empty() {
            return Ok(());
        }

        // BTreeMap keeps agent iteration order stable, making the
        // least-loaded tie-break deterministic within a pass.
        let mut agent_sessions: BTreeMap<AgentKey, Vec<String>> = BTreeMap::new();
        for agent in &agents {
            let key = agent.key();
            let active = self.queue.view(&key.to_string()).await?;
            agent_sessions.insert(key, active);
        }

        let wait_key = wait_queue_key(&self.transfer_prefix, tenant.bot_id, workspace.workspace_id);
        let pending = self.queue.view(&wait_key).await?;

        for session_id in pending {
            let session = match store.find_session(&session_id).await? {
                Some(session) if !session.end_conversation => session,
                _ => {
                    // Stale entry at the head: pop it so it cannot block
                    // the queue forever.
                    debug!(%session_id, "queued session missing or ended, dropping entry");
                    self.queue.dequeue(&wait_key).await?;
                    continue;
                }
            };

            // Limits are workspace-specific and may change mid-drain.
            let workspace = match self
                .directory
                .find_workspace(tenant.bot_id, workspace.workspace_id)
                .await?
            {
                Some(workspace) => workspace,
                None => break,
            };

            let winner = agent_sessions
                .iter()
                .filter(|(_, active)| (active.len() as i64) < workspace.sessions_limit)
                .min_by_key(|(_, active)| active.len())
                .map(|(key, _)| key.clone());

            let Some(winner) = winner else {
                debug!(
                    tenant = %tenant.slug,
                    workspace = workspace.workspace_id,
                    "no eligible agent, leaving remaining sessions queued"
                );
                break;
            };

            // The authoritative hand-off: the session moves from the wait
            // queue onto exactly one agent list.
            self.queue.dequeue(&wait_key).await?;
            self.queue.enqueue(&session_id, &winner.to_string()).await?;
            if let Some(active) = agent_sessions.get_mut(&winner) {
                active.push(session_id.clone());
            }

            info!(
                tenant = %tenant.slug,
                workspace = workspace.workspace_id,
                %session_id,
                agent = %winner,
                "session assigned"
            );

            // Arrival notification is best-effort: the assignment above
            // already holds, a failed greeting retries nothing.
            if let Err(error) = self
                .notify_arrival(store, &workspace, &settings, &session, &winner)
                .await
            {
                warn!(%session_id, %error, "arrival notification failed");
            }
        }

        Ok(())
    }

    /// Persist a localized "agent has joined" turn carrying the assigned
    /// agent's identity, and touch the session and profile activity clocks.
    async fn notify_arrival(
        &self,
        store: &dyn TenantStore,
        workspace: &Workspace,
        settings: &WorkspaceSettings,
        session: &SessionRecord,
        agent: &AgentKey,
    ) -> HelplineResult<()> {
        let preference = store
            .find_profile(&session.session_id)
            .await?
            .map(|profile| profile.preference)
            .unwrap_or_default();
        let pack = self.messages.pack_for(&preference);

        let provider = self
            .providers
            .provider(workspace, session.thread_slug.as_deref())?;
        let text = provider.chat(&pack.arrival_prompt(&agent.agent_name)).await?;

        let now = Utc::now();
        let mut entry = RoleEntry::new(TurnKind::HumanAgent, text, now);
        entry.agent_id = Some(agent.agent_id.clone());
        entry.agent_name = Some(agent.agent_name.clone());
        entry.agent_email = Some(agent.agent_email.clone());
        if settings.agent_sentiment {
            entry.sentiment = Some("Neutral".to_string());
        }

        store.append_role(&session.session_id, &entry, now).await?;
        store.touch_profile(&session.session_id, now).await?;

        Ok(())
    }
}
