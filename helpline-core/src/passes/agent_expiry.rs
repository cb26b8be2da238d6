//! Agent-side expiry: end handoff sessions whose owning side went silent.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::HelplineResult;
use crate::models::AgentExpiry;
use crate::store::Directory;

pub struct AgentExpiryPass {
    directory: Arc<dyn Directory>,
}

impl AgentExpiryPass {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn run(&self) -> HelplineResult<()> {
        for (tenant, store) in super::discover_tenants(self.directory.as_ref()).await? {
            let sessions = match store.open_handoff_sessions().await {
                Ok(sessions) => sessions,
                Err(error) => {
                    warn!(tenant = %tenant.slug, %error, "handoff scan failed, skipping tenant");
                    continue;
                }
            };

            for session in sessions {
                // Read "now" per record, not once per sweep.
                let Some(outcome) = session.agent_expiry_outcome(Utc::now()) else {
                    continue;
                };

                let pre_connection = outcome == AgentExpiry::PreConnection;
                match store
                    .mark_session_ended(&session.session_id, pre_connection)
                    .await
                {
                    Ok(()) => info!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        ?outcome,
                        "session ended by agent-side timeout"
                    ),
                    Err(error) => warn!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %error,
                        "failed to end timed-out session"
                    ),
                }
            }
        }

        Ok(())
    }
}
