//! Agent-response sentiment for ended handoff sessions.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ClassifierClient;
use crate::error::HelplineResult;
use crate::store::Directory;

pub struct AgentSentimentPass {
    directory: Arc<dyn Directory>,
    classifier: ClassifierClient,
}

impl AgentSentimentPass {
    pub fn new(directory: Arc<dyn Directory>, classifier: ClassifierClient) -> Self {
        Self {
            directory,
            classifier,
        }
    }

    pub async fn run(&self) -> HelplineResult<()> {
        for (tenant, store) in super::discover_tenants(self.directory.as_ref()).await? {
            let sessions = match store.sessions_awaiting_agent_sentiment().await {
                Ok(sessions) => sessions,
                Err(error) => {
                    warn!(tenant = %tenant.slug, %error, "agent sentiment scan failed, skipping tenant");
                    continue;
                }
            };

            for session in sessions {
                if !session.transfer_conversation && !session.human_intervention {
                    continue;
                }

                let settings = match self
                    .directory
                    .find_settings(tenant.bot_id, session.workspace_id)
                    .await
                {
                    Ok(Some(settings)) => settings,
                    Ok(None) => {
                        debug!(
                            tenant = %tenant.slug,
                            workspace = session.workspace_id,
                            "no settings record, skipping session"
                        );
                        continue;
                    }
                    Err(error) => {
                        warn!(tenant = %tenant.slug, %error, "settings lookup failed");
                        continue;
                    }
                };
                if !settings.agent_sentiment {
                    continue;
                }

                // No agent turns at all: the agent never spoke, no call
                // needed.
                let transcript = session.agent_transcript();
                let sentiment = if transcript.is_empty() {
                    "Neutral".to_string()
                } else {
                    match self.classifier.classify(&transcript).await {
                        Ok(verdict) => verdict.sentiment,
                        Err(error) => {
                            warn!(
                                tenant = %tenant.slug,
                                session_id = %session.session_id,
                                %error,
                                "agent sentiment classification failed, will retry"
                            );
                            continue;
                        }
                    }
                };

                match store
                    .set_agent_sentiment(&session.session_id, &sentiment)
                    .await
                {
                    Ok(()) => info!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %sentiment,
                        "agent sentiment stored"
                    ),
                    Err(error) => warn!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %error,
                        "failed to store agent sentiment"
                    ),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::models::{EndReason, RoleEntry, SessionRecord, Tenant, TurnKind, WorkspaceSettings};
    use crate::store::{MemoryDirectory, TenantStore};
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier(server: &MockServer) -> ClassifierClient {
        ClassifierClient::new(&ClassifierConfig {
            sentiment_url: format!("{}/classify", server.uri()),
            tag_url: format!("{}/tags", server.uri()),
            app_key: "k".to_string(),
            super_team: "100".to_string(),
            timeout_secs: 8,
            tag_min_occurrences: 2,
        })
        .unwrap()
    }

    async fn fixture() -> (Arc<MemoryDirectory>, Arc<crate::store::MemoryTenantStore>) {
        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;
        directory
            .add_settings(WorkspaceSettings {
                bot_id: 1,
                workspace_id: 7,
                auto_assignment: false,
                conversation_sentiment: false,
                agent_sentiment: true,
                summary: false,
            })
            .await;
        (directory, store)
    }

    #[tokio::test]
    async fn test_silent_agent_defaults_to_neutral_without_call() {
        let server = MockServer::start().await;
        // No mock mounted: a classifier call would fail the test via the
        // unset-sentiment assertion below.
        let (directory, store) = fixture().await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session.request_transfer().unwrap();
        session.end(EndReason::AgentUnreachable).unwrap();
        store.insert_session(&session).await.unwrap();

        AgentSentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server))
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert_eq!(found.agent_sentiment.as_deref(), Some("Neutral"));
    }

    #[tokio::test]
    async fn test_agent_transcript_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "language": "english",
                "sentiment": "Positive"
            })))
            .mount(&server)
            .await;

        let (directory, store) = fixture().await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session.request_transfer().unwrap();
        session
            .append_role(RoleEntry::new(
                TurnKind::HumanAgent,
                "happy to help",
                Utc::now(),
            ))
            .unwrap();
        session.end(EndReason::Closed).unwrap();
        store.insert_session(&session).await.unwrap();

        AgentSentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server))
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert_eq!(found.agent_sentiment.as_deref(), Some("Positive"));
    }

    #[tokio::test]
    async fn test_bot_only_session_is_skipped() {
        let server = MockServer::start().await;
        let (directory, store) = fixture().await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session.end(EndReason::Closed).unwrap();
        store.insert_session(&session).await.unwrap();

        AgentSentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server))
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert!(found.agent_sentiment.is_none());
    }
}
