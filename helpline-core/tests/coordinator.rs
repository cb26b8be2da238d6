//! End-to-end coordinator scenarios over the in-memory backends.

use chrono::{Duration, Utc};
use std::sync::Arc;

use helpline_core::{
    wait_queue_key, AgentExpiryPass, AgentKey, AgentSentimentPass, AgentService, AssignmentPass,
    ClassifierClient, ClassifierConfig, Directory, EndReason, LlmKind, MemoryDirectory,
    MemoryQueueStore, MemoryReclamationPass, MemoryTenantStore, MessageCatalog, Profile,
    QueueStore, RoleEntry, SessionRecord, SessionState, StaticProviderFactory, Tenant,
    TenantStore, TurnKind, Workspace, WorkspaceSettings,
};
use helpline_core::models::Channel;

const BOT: i64 = 1;
const WS: i64 = 7;

struct Harness {
    directory: Arc<MemoryDirectory>,
    store: Arc<MemoryTenantStore>,
    queue: Arc<MemoryQueueStore>,
}

impl Harness {
    async fn new(sessions_limit: i64) -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(BOT, "Acme Corp", 10).unwrap())
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
                sessions_limit,
                is_active: true,
                created_at: now,
                modified_at: now,
            })
            .await;
        directory
            .add_settings(WorkspaceSettings {
                bot_id: BOT,
                workspace_id: WS,
                auto_assignment: true,
                conversation_sentiment: true,
                agent_sentiment: true,
                summary: true,
            })
            .await;

        Self {
            directory,
            store,
            queue: Arc::new(MemoryQueueStore::new()),
        }
    }

    fn assignment(&self) -> AssignmentPass {
        AssignmentPass::new(
            Arc::clone(&self.directory) as Arc<dyn Directory>,
            Arc::clone(&self.queue) as Arc<dyn QueueStore>,
            Arc::new(StaticProviderFactory::new("An agent has joined.")),
            MessageCatalog::default(),
            "transfer",
        )
    }

    fn agent_service(&self) -> AgentService {
        AgentService::new(
            Arc::clone(&self.directory) as Arc<dyn Directory>,
            Arc::clone(&self.queue) as Arc<dyn QueueStore>,
            "transfer",
        )
    }

    async fn transfer_session(&self, id: &str) {
        let mut session = SessionRecord::new(id, WS, 10);
        session
            .append_role(RoleEntry::new(TurnKind::Human, "I need help", Utc::now()))
            .unwrap();
        session.request_transfer().unwrap();
        self.store.insert_session(&session).await.unwrap();
        self.store
            .insert_profile(&Profile::new(id, WS, Channel::Web, "english"))
            .await
            .unwrap();
        self.queue
            .enqueue(id, &wait_queue_key("transfer", BOT, WS))
            .await
            .unwrap();
    }
}

fn agent_key(id: &str) -> AgentKey {
    AgentKey::new(id, format!("Agent {id}"), format!("{id}@example.com"))
}

#[tokio::test]
async fn test_transfer_to_assignment_to_agent_owned() {
    let harness = Harness::new(3).await;
    let service = harness.agent_service();
    let key = agent_key("x");
    service.login("acme_corp", WS, &key).await.unwrap();

    harness.transfer_session("s1").await;
    let queued = harness.store.find_session("s1").await.unwrap().unwrap();
    assert_eq!(queued.state(), SessionState::Queued);

    harness.assignment().run().await.unwrap();

    // The session now sits on exactly the agent's list, and the arrival
    // turn flips it to agent-owned.
    assert_eq!(
        harness.queue.view(&key.to_string()).await.unwrap(),
        vec!["s1"]
    );
    assert!(harness
        .queue
        .view(&wait_queue_key("transfer", BOT, WS))
        .await
        .unwrap()
        .is_empty());

    let assigned = harness.store.find_session("s1").await.unwrap().unwrap();
    assert_eq!(assigned.state(), SessionState::AgentOwned);
    let arrival = assigned.roles.0.last().unwrap();
    assert_eq!(arrival.kind, TurnKind::HumanAgent);
    assert_eq!(arrival.agent_email.as_deref(), Some("x@example.com"));
    assert_eq!(arrival.sentiment.as_deref(), Some("Neutral"));
}

#[tokio::test]
async fn test_logout_requeue_and_reassignment_keeps_single_owner() {
    let harness = Harness::new(3).await;
    let service = harness.agent_service();
    let x = agent_key("x");
    service.login("acme_corp", WS, &x).await.unwrap();

    harness.transfer_session("s1").await;
    harness.transfer_session("s2").await;
    harness.assignment().run().await.unwrap();
    assert_eq!(
        harness.queue.view(&x.to_string()).await.unwrap(),
        vec!["s1", "s2"]
    );

    // X leaves; both sessions go back to the wait-queue in order.
    service.logout("acme_corp", WS, &x).await.unwrap();
    assert_eq!(
        harness
            .queue
            .view(&wait_queue_key("transfer", BOT, WS))
            .await
            .unwrap(),
        vec!["s1", "s2"]
    );

    // Y picks them up on the next pass; nothing is still attributed to X.
    let y = agent_key("y");
    service.login("acme_corp", WS, &y).await.unwrap();
    harness.assignment().run().await.unwrap();

    assert_eq!(
        harness.queue.view(&y.to_string()).await.unwrap(),
        vec!["s1", "s2"]
    );
    assert!(harness.queue.view(&x.to_string()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_silent_agent_session_is_ended_reclaimed_and_scored() {
    let harness = Harness::new(3).await;
    let now = Utc::now();

    // An agent answered 11 minutes ago against a 10 minute timeout.
    let mut session = SessionRecord::new("s1", WS, 10);
    session
        .append_role(RoleEntry::new(
            TurnKind::Human,
            "my card is blocked",
            now - Duration::minutes(20),
        ))
        .unwrap();
    session.request_transfer().unwrap();
    session
        .append_role(RoleEntry::new(
            TurnKind::HumanAgent,
            "let me look",
            now - Duration::minutes(11),
        ))
        .unwrap();
    harness.store.insert_session(&session).await.unwrap();
    harness.store.seed_history("s1", 6).await;

    AgentExpiryPass::new(Arc::clone(&harness.directory) as Arc<dyn Directory>)
        .run()
        .await
        .unwrap();

    let ended = harness.store.find_session("s1").await.unwrap().unwrap();
    assert_eq!(ended.state(), SessionState::Ended);
    assert!(!ended.agent_expiry);

    MemoryReclamationPass::new(Arc::clone(&harness.directory) as Arc<dyn Directory>)
        .run()
        .await
        .unwrap();
    assert_eq!(harness.store.history_rows("s1").await, 0);

    // Agent sentiment for the ended handoff session via the classifier.
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/classify"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "language": "english",
            "sentiment": "Positive"
        })))
        .mount(&server)
        .await;
    let classifier = ClassifierClient::new(&ClassifierConfig {
        sentiment_url: format!("{}/classify", server.uri()),
        tag_url: format!("{}/tags", server.uri()),
        app_key: "k".to_string(),
        super_team: "100".to_string(),
        timeout_secs: 8,
        tag_min_occurrences: 2,
    })
    .unwrap();

    AgentSentimentPass::new(Arc::clone(&harness.directory) as Arc<dyn Directory>, classifier)
        .run()
        .await
        .unwrap();

    let scored = harness.store.find_session("s1").await.unwrap().unwrap();
    assert_eq!(scored.agent_sentiment.as_deref(), Some("Positive"));
}

#[tokio::test]
async fn test_ended_session_is_never_reassigned() {
    let harness = Harness::new(3).await;
    let service = harness.agent_service();
    let x = agent_key("x");
    service.login("acme_corp", WS, &x).await.unwrap();

    harness.transfer_session("s1").await;
    let mut session = harness.store.find_session("s1").await.unwrap().unwrap();
    session.end(EndReason::Closed).unwrap();
    harness.store.insert_session(&session).await.unwrap();

    harness.assignment().run().await.unwrap();

    assert!(harness.queue.view(&x.to_string()).await.unwrap().is_empty());
    assert!(harness
        .queue
        .view(&wait_queue_key("transfer", BOT, WS))
        .await
        .unwrap()
        .is_empty());
}
