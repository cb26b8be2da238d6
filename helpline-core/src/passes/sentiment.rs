//! Conversation sentiment + language classification.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ClassifierClient;
use crate::error::HelplineResult;
use crate::store::Directory;

pub struct SentimentPass {
    directory: Arc<dyn Directory>,
    classifier: ClassifierClient,
}

impl SentimentPass {
    pub fn new(directory: Arc<dyn Directory>, classifier: ClassifierClient) -> Self {
        Self {
            directory,
            classifier,
        }
    }

    pub async fn run(&self) -> HelplineResult<()> {
        for (tenant, store) in super::discover_tenants(self.directory.as_ref()).await? {
            let sessions = match store.sessions_awaiting_sentiment().await {
                Ok(sessions) => sessions,
                Err(error) => {
                    warn!(tenant = %tenant.slug, %error, "sentiment scan failed, skipping tenant");
                    continue;
                }
            };

            for session in sessions {
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
                if !settings.conversation_sentiment {
                    continue;
                }
                if !session.end_conversation && !session.is_expired(Utc::now()) {
                    continue;
                }

                let transcript = session.human_transcript();
                if transcript.is_empty() {
                    continue;
                }

                // Classifier failure leaves both fields unset so the next
                // slow tick retries.
                let verdict = match self.classifier.classify(&transcript).await {
                    Ok(verdict) => verdict,
                    Err(error) => {
                        warn!(
                            tenant = %tenant.slug,
                            session_id = %session.session_id,
                            %error,
                            "sentiment classification failed, will retry"
                        );
                        continue;
                    }
                };

                match store
                    .set_language_sentiment(&session.session_id, &verdict.language, &verdict.sentiment)
                    .await
                {
                    Ok(()) => info!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        language = %verdict.language,
                        sentiment = %verdict.sentiment,
                        "session classified"
                    ),
                    Err(error) => warn!(
                        tenant = %tenant.slug,
                        session_id = %session.session_id,
                        %error,
                        "failed to store classification"
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
    use crate::models::{RoleEntry, SessionRecord, Tenant, TurnKind, WorkspaceSettings};
    use crate::store::{MemoryDirectory, TenantStore};
    use chrono::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn classifier(server: &MockServer) -> ClassifierClient {
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

    fn settings(conversation_sentiment: bool) -> WorkspaceSettings {
        WorkspaceSettings {
            bot_id: 1,
            workspace_id: 7,
            auto_assignment: false,
            conversation_sentiment,
            agent_sentiment: false,
            summary: false,
        }
    }

    #[tokio::test]
    async fn test_ended_session_gets_language_and_sentiment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "language": "english",
                "sentiment": "Negative"
            })))
            .mount(&server)
            .await;

        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;
        directory.add_settings(settings(true)).await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session
            .append_role(RoleEntry::new(TurnKind::Human, "my card is blocked", Utc::now()))
            .unwrap();
        session.end(crate::models::EndReason::Closed).unwrap();
        store.insert_session(&session).await.unwrap();

        SentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server).await)
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert_eq!(found.language.as_deref(), Some("english"));
        assert_eq!(found.sentiment.as_deref(), Some("Negative"));
    }

    #[tokio::test]
    async fn test_open_unexpired_session_is_skipped() {
        let server = MockServer::start().await;
        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;
        directory.add_settings(settings(true)).await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session
            .append_role(RoleEntry::new(TurnKind::Human, "hello", Utc::now()))
            .unwrap();
        store.insert_session(&session).await.unwrap();

        SentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server).await)
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert!(found.sentiment.is_none());
    }

    #[tokio::test]
    async fn test_classifier_failure_leaves_fields_unset_for_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;
        directory.add_settings(settings(true)).await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session
            .append_role(RoleEntry::new(TurnKind::Human, "hello", Utc::now()))
            .unwrap();
        session.latest_timestamp = Utc::now() - Duration::minutes(20);
        store.insert_session(&session).await.unwrap();

        SentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server).await)
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert!(found.language.is_none());
        assert!(found.sentiment.is_none());
    }

    #[tokio::test]
    async fn test_disabled_setting_skips_classification() {
        let server = MockServer::start().await;
        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;
        directory.add_settings(settings(false)).await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session
            .append_role(RoleEntry::new(TurnKind::Human, "hello", Utc::now()))
            .unwrap();
        session.end(crate::models::EndReason::Closed).unwrap();
        store.insert_session(&session).await.unwrap();

        SentimentPass::new(Arc::clone(&directory) as Arc<dyn Directory>, classifier(&server).await)
            .run()
            .await
            .unwrap();

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert!(found.sentiment.is_none());
    }
}
