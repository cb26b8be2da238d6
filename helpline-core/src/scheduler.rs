//! The coordinator: two fixed-interval loops driving the reconciliation
//! passes for the life of the process.
//!
//! The fast loop owns user-visible latency (agent-side expiry and
//! assignment); the slow loop owns enrichment and reclamation. Pass
//! failures are logged and the loop proceeds to its next tick; nothing a
//! pass does can stop the coordinator.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clients::{ClassifierClient, ProviderFactory};
use crate::config::CoordinatorConfig;
use crate::passes::{
    AgentExpiryPass, AgentSentimentPass, AssignmentPass, MemoryReclamationPass, SentimentPass,
    SummaryPass, TagsPass,
};
use crate::queue::QueueStore;
use crate::store::Directory;

pub struct Coordinator {
    fast_interval: Duration,
    slow_interval: Duration,

    assignment: Arc<AssignmentPass>,
    agent_expiry: Arc<AgentExpiryPass>,
    sentiment: Arc<SentimentPass>,
    tags: Arc<TagsPass>,
    agent_sentiment: Arc<AgentSentimentPass>,
    reclamation: Arc<MemoryReclamationPass>,
    summary: Arc<SummaryPass>,

    running: Arc<RwLock<bool>>,
    shutdown: Mutex<Vec<oneshot::Sender<()>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(
        config: &CoordinatorConfig,
        directory: Arc<dyn Directory>,
        queue: Arc<dyn QueueStore>,
        providers: Arc<dyn ProviderFactory>,
        classifier: ClassifierClient,
    ) -> Self {
        Self {
            fast_interval: Duration::from_secs(config.scheduler.fast_interval_secs),
            slow_interval: Duration::from_secs(config.scheduler.slow_interval_secs),
            assignment: Arc::new(AssignmentPass::new(
                Arc::clone(&directory),
                queue,
                Arc::clone(&providers),
                config.messages.clone(),
                config.queue.transfer_prefix.clone(),
            )),
            agent_expiry: Arc::new(AgentExpiryPass::new(Arc::clone(&directory))),
            sentiment: Arc::new(SentimentPass::new(
                Arc::clone(&directory),
                classifier.clone(),
            )),
            tags: Arc::new(TagsPass::new(Arc::clone(&directory), classifier.clone())),
            agent_sentiment: Arc::new(AgentSentimentPass::new(
                Arc::clone(&directory),
                classifier,
            )),
            reclamation: Arc::new(MemoryReclamationPass::new(Arc::clone(&directory))),
            summary: Arc::new(SummaryPass::new(directory, providers, config.messages.clone())),
            running: Arc::new(RwLock::new(false)),
            shutdown: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Start both loops. Idempotent: a second call while running is a
    /// no-op.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                debug!("coordinator already running");
                return;
            }
            *running = true;
        }

        info!(
            fast_secs = self.fast_interval.as_secs(),
            slow_secs = self.slow_interval.as_secs(),
            "coordinator starting"
        );

        let (fast_tx, fast_rx) = oneshot::channel();
        let (slow_tx, slow_rx) = oneshot::channel();

        let fast = self.spawn_fast_loop(fast_rx);
        let slow = self.spawn_slow_loop(slow_rx);

        self.shutdown.lock().await.extend([fast_tx, slow_tx]);
        self.handles.lock().await.extend([fast, slow]);
    }

    /// Signal both loops and wait for them to finish their current tick.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        for tx in self.shutdown.lock().await.drain(..) {
            let _ = tx.send(());
        }
        for handle in self.handles.lock().await.drain(..) {
            let _ = handle.await;
        }

        info!("coordinator stopped");
    }

    fn spawn_fast_loop(&self, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        let agent_expiry = Arc::clone(&self.agent_expiry);
        let assignment = Arc::clone(&self.assignment);
        let period = self.fast_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        debug!("fast loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let (expiry, assign) =
                            tokio::join!(agent_expiry.run(), assignment.run());
                        if let Err(error) = expiry {
                            warn!(%error, "agent expiry pass failed");
                        }
                        if let Err(error) = assign {
                            warn!(%error, "assignment pass failed");
                        }
                    }
                }
            }
        })
    }

    fn spawn_slow_loop(&self, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        let sentiment = Arc::clone(&self.sentiment);
        let tags = Arc::clone(&self.tags);
        let agent_sentiment = Arc::clone(&self.agent_sentiment);
        let reclamation = Arc::clone(&self.reclamation);
        let summary = Arc::clone(&self.summary);
        let period = self.slow_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        debug!("slow loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let results = tokio::join!(
                            sentiment.run(),
                            tags.run(),
                            agent_sentiment.run(),
                            reclamation.run(),
                            summary.run(),
                        );
                        let named: [(&str, &crate::error::HelplineResult<()>); 5] = [
                            ("sentiment", &results.0),
                            ("tags", &results.1),
                            ("agent sentiment", &results.2),
                            ("reclamation", &results.3),
                            ("summary", &results.4),
                        ];
                        for (name, result) in named {
                            if let Err(error) = result {
                                warn!(pass = name, %error, "slow pass failed");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::StaticProviderFactory;
    use crate::config::ClassifierConfig;
    use crate::models::{RoleEntry, SessionRecord, Tenant, TurnKind};
    use crate::queue::MemoryQueueStore;
    use crate::store::{MemoryDirectory, TenantStore};
    use chrono::{Duration as ChronoDuration, Utc};

    fn coordinator(directory: Arc<MemoryDirectory>, fast_millis: u64) -> Coordinator {
        let mut config = CoordinatorConfig::default();
        config.scheduler.fast_interval_secs = 1;
        config.scheduler.slow_interval_secs = 300;
        let classifier = ClassifierClient::new(&ClassifierConfig::default()).unwrap();

        let mut coordinator = Coordinator::new(
            &config,
            directory as Arc<dyn Directory>,
            Arc::new(MemoryQueueStore::new()),
            Arc::new(StaticProviderFactory::new("hello")),
            classifier,
        );
        coordinator.fast_interval = Duration::from_millis(fast_millis);
        coordinator
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let directory = Arc::new(MemoryDirectory::new());
        let coordinator = coordinator(directory, 10);

        assert!(!coordinator.is_running().await);
        coordinator.start().await;
        assert!(coordinator.is_running().await);
        coordinator.start().await; // second start is a no-op
        coordinator.stop().await;
        assert!(!coordinator.is_running().await);
        coordinator.stop().await; // second stop is a no-op
    }

    #[tokio::test]
    async fn test_fast_loop_ends_timed_out_sessions() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = directory
            .add_tenant(Tenant::new(1, "Acme", 30).unwrap())
            .await;

        let mut session = SessionRecord::new("s1", 7, 10);
        session
            .append_role(RoleEntry::new(
                TurnKind::Human,
                "help",
                Utc::now() - ChronoDuration::minutes(15),
            ))
            .unwrap();
        session.request_transfer().unwrap();
        store.insert_session(&session).await.unwrap();

        let coordinator = coordinator(Arc::clone(&directory), 10);
        coordinator.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.stop().await;

        let found = store.find_session("s1").await.unwrap().unwrap();
        assert!(found.end_conversation);
        assert!(found.agent_expiry);
    }
}
