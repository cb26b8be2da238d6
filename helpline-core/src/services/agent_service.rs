//! Agent login and logout.
//!
//! Logout under auto-assignment pushes the agent's active sessions back
//! onto the workspace wait-queue so the next fast tick can reassign them.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::{HelplineError, HelplineResult};
use crate::models::{Agent, AgentKey, Tenant};
use crate::queue::{wait_queue_key, QueueStore};
use crate::store::Directory;

pub struct AgentService {
    directory: Arc<dyn Directory>,
    queue: Arc<dyn QueueStore>,
    transfer_prefix: String,
}

impl AgentService {
    pub fn new(
        directory: Arc<dyn Directory>,
        queue: Arc<dyn QueueStore>,
        transfer_prefix: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            queue,
            transfer_prefix: transfer_prefix.into(),
        }
    }

    async fn resolve_tenant(&self, slug: &str) -> HelplineResult<Tenant> {
        self.directory
            .find_active_tenant(slug)
            .await?
            .ok_or_else(|| HelplineError::TenantNotFound(slug.to_string()))
    }

    /// Activate an agent in a workspace. A key that is already active is
    /// rejected so one identity cannot hold two session lists.
    pub async fn login(
        &self,
        tenant_slug: &str,
        workspace_id: i64,
        key: &AgentKey,
    ) -> HelplineResult<()> {
        let tenant = self.resolve_tenant(tenant_slug).await?;
        self.directory
            .find_workspace(tenant.bot_id, workspace_id)
            .await?
            .ok_or(HelplineError::WorkspaceNotFound {
                bot_id: tenant.bot_id,
                workspace_id,
            })?;

        let store = self.directory.tenant_store(tenant_slug).await?;
        if store.find_active_agent(key, workspace_id).await?.is_some() {
            return Err(HelplineError::AgentAlreadyActive(key.to_string()));
        }

        let now = Utc::now();
        store
            .insert_agent(&Agent {
                agent_id: key.agent_id.clone(),
                agent_name: key.agent_name.clone(),
                agent_email: key.agent_email.clone(),
                workspace_id,
                is_active: true,
                created_at: now,
                modified_at: now,
            })
            .await?;

        info!(tenant = %tenant.slug, workspace_id, agent = %key, "agent logged in");
        Ok(())
    }

    /// Deactivate an agent. Under auto-assignment its active sessions are
    /// requeued in order and its session list deleted.
    pub async fn logout(
        &self,
        tenant_slug: &str,
        workspace_id: i64,
        key: &AgentKey,
    ) -> HelplineResult<()> {
        let tenant = self.resolve_tenant(tenant_slug).await?;
        let store = self.directory.tenant_store(tenant_slug).await?;

        store
            .find_active_agent(key, workspace_id)
            .await?
            .ok_or_else(|| HelplineError::AgentNotFound(key.to_string()))?;
        store.deactivate_agent(key, workspace_id).await?;

        let auto_assignment = self
            .directory
            .find_settings(tenant.bot_id, workspace_id)
            .await?
            .is_some_and(|settings| settings.auto_assignment);

        let mut requeued = 0;
        if auto_assignment {
            let agent_queue = key.to_string();
            let wait_key = wait_queue_key(&self.transfer_prefix, tenant.bot_id, workspace_id);

            // Oldest-first so requeued sessions keep their relative order.
            let active = self.queue.view(&agent_queue).await?;
            self.queue.delete(&agent_queue).await?;
            for session_id in &active {
                self.queue.enqueue(session_id, &wait_key).await?;
            }
            requeued = active.len();
        }

        info!(tenant = %tenant.slug, workspace_id, agent = %key, requeued, "agent logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LlmKind, Workspace, WorkspaceSettings};
    use crate::queue::MemoryQueueStore;
    use crate::store::MemoryDirectory;

    const BOT: i64 = 1;
    const WS: i64 = 7;

    async fn fixture(auto_assignment: bool) -> (AgentService, Arc<MemoryQueueStore>) {
        let directory = Arc::new(MemoryDirectory::new());
        directory
            .add_tenant(Tenant::new(BOT, "Acme", 30).unwrap())
            .await;
        let now = Utc::now();
        directory
            .add_workspace(Workspace {
                bot_id: BOT,
                workspace_id: WS,
                llm: LlmKind::Openai,
                model: "gpt-4o-mini".to_string(),
                llm_api_key: None,
                llm_url: None,
                sessions_limit: 3,
                is_active: true,
                created_at: now,
                modified_at: now,
            })
            .await;
        directory
            .add_settings(WorkspaceSettings {
                bot_id: BOT,
                workspace_id: WS,
                auto_assignment,
                conversation_sentiment: false,
                agent_sentiment: false,
                summary: false,
            })
            .await;

        let queue = Arc::new(MemoryQueueStore::new());
        let service = AgentService::new(
            directory as Arc<dyn Directory>,
            Arc::clone(&queue) as Arc<dyn QueueStore>,
            "transfer",
        );
        (service, queue)
    }

    fn key() -> AgentKey {
        AgentKey::new("17", "Sara", "sara@example.com")
    }

    #[tokio::test]
    async fn test_login_rejects_duplicate() {
        let (service, _) = fixture(true).await;
        service.login("acme", WS, &key()).await.unwrap();
        assert!(matches!(
            service.login("acme", WS, &key()).await,
            Err(HelplineError::AgentAlreadyActive(_))
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_tenant_fails() {
        let (service, _) = fixture(true).await;
        assert!(matches!(
            service.login("initech", WS, &key()).await,
            Err(HelplineError::TenantNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_requeues_active_sessions_in_order() {
        let (service, queue) = fixture(true).await;
        let key = key();
        service.login("acme", WS, &key).await.unwrap();

        queue.enqueue("s1", &key.to_string()).await.unwrap();
        queue.enqueue("s2", &key.to_string()).await.unwrap();

        service.logout("acme", WS, &key).await.unwrap();

        let wait_key = wait_queue_key("transfer", BOT, WS);
        assert_eq!(queue.view(&wait_key).await.unwrap(), vec!["s1", "s2"]);
        assert!(queue.view(&key.to_string()).await.unwrap().is_empty());

        // Logged out: a second logout finds no active agent.
        assert!(matches!(
            service.logout("acme", WS, &key).await,
            Err(HelplineError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_without_auto_assignment_leaves_queues_alone() {
        let (service, queue) = fixture(false).await;
        let key = key();
        service.login("acme", WS, &key).await.unwrap();
        queue.enqueue("s1", &key.to_string()).await.unwrap();

        service.logout("acme", WS, &key).await.unwrap();

        let wait_key = wait_queue_key("transfer", BOT, WS);
        assert!(queue.view(&wait_key).await.unwrap().is_empty());
        assert_eq!(queue.view(&key.to_string()).await.unwrap(), vec!["s1"]);
    }
}
