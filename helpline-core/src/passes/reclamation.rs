//! Memory reclamation: purge LLM context buffers of finished or inactive
//! sessions.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::HelplineResult;
use crate::store::Directory;

pub struct MemoryReclamationPass {
    directory: Arc<dyn Directory>,
}

impl MemoryReclamationPass {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
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
                // Purge once the bot no longer needs the buffer: ended,
                // expired, or handed off to a human. Repeat purges are
                // harmless deletes.
                let reclaimable = session.end_conversation
                    || session.transfer_conversation
                    || session.human_intervention
                    || session.is_expired(Utc::now());
                if !reclaimable {
                    continue;
                }

                match store.purge_history(&session.session_id).await {
                    Ok(0) => {}
                    Ok(rows) => debug!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        rows,
                        "context buffer reclaimed"
                    ),
                    Err(error) => warn!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %error,
                        "context buffer purge failed"
                    ),
                }
            }
        }

        Ok(())
    }
}
