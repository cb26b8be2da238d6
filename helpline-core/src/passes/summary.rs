//! Summaries for sessions that expired without ever reaching an agent.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ProviderFactory;
use crate::config::MessageCatalog;
use crate::error::HelplineResult;
use crate::models::{SessionRecord, Summary, Tenant};
use crate::store::{Directory, TenantStore};

pub struct SummaryPass {
    directory: Arc<dyn Directory>,
    providers: Arc<dyn ProviderFactory>,
    messages: MessageCatalog,
}

impl SummaryPass {
    pub fn new(
        directory: Arc<dyn Directory>,
        providers: Arc<dyn ProviderFactory>,
        messages: MessageCatalog,
    ) -> Self {
        Self {
            directory,
            providers,
            messages,
        }
    }

    pub async fn run(&self) -> HelplineResult<()> {
        for (tenant, store) in super::discover_tenants(self.directory.as_ref()).await? {
            let sessions = match store.all_sessions().await {
                Ok(sessions) => sessions,
                Err(error) => {
                    warn!(tenant = %tenant.slug, %error, "session scan failed, skipping tenant");
                    continue;
                }
            };

            for session in sessions {
                // Only bot-owned sessions that quietly timed out: handoff
                // sessions have an agent-side record instead.
                let eligible = !session.end_conversation
                    && !session.transfer_conversation
                    && !session.human_intervention
                    && session.is_expired(Utc::now());
                if !eligible {
                    continue;
                }

                if let Err(error) = self.summarize(&tenant, store.as_ref(), &session).await {
                    warn!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %error,
                        "summary generation failed, will retry"
                    );
                }
            }
        }

        Ok(())
    }

    async fn summarize(
        &self,
        tenant: &Tenant,
        store: &dyn TenantStore,
        session: &SessionRecord,
    ) -> HelplineResult<()> {
        let Some(settings) = self
            .directory
            .find_settings(tenant.bot_id, session.workspace_id)
            .await?
        else {
            debug!(
                tenant = %tenant.slug,
                workspace = session.workspace_id,
                "no settings record, skipping session"
            );
            return Ok(());
        };
        if !settings.summary {
            return Ok(());
        }

        if store.find_summary(&session.session_id).await?.is_some() {
            return Ok(());
        }

        let transcript = session.human_transcript();
        if transcript.is_empty() {
            return Ok(());
        }

        let Some(workspace) = self
            .directory
            .find_workspace(tenant.bot_id, session.workspace_id)
            .await?
        else {
            return Ok(());
        };

        let preference = store
            .find_profile(&session.session_id)
            .await?
            .map(|profile| profile.preference)
            .unwrap_or_default();
        let pack = self.messages.pack_for(&preference);

        let provider = self
            .providers
            .provider(&workspace, session.thread_slug.as_deref())?;
        let text = provider.chat(&pack.summary_prompt(&transcript)).await?;

        store
            .insert_summary(&Summary::new(session.session_id.clone(), tenant.bot_id, text))
            .await?;

        info!(
            tenant = %tenant.slug,
            session_id = %session.session_id,
            "expired session summarized"
        );

        Ok(())
    }
}
