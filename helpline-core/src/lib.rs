#![allow(
    clippy::needless_borrows_for_generic_args,
    clippy::type_complexity,
    clippy::len_zero
)]

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod passes;
pub mod queue;
pub mod scheduler;
pub mod services;
pub mod store;

pub use clients::{
    Classification, ClassifierClient, ChatProvider, LlmProviderFactory, ProviderFactory,
    StaticProvider, StaticProviderFactory, TagOccurrence,
};
pub use config::{
    ClassifierConfig, CoordinatorConfig, DatabaseConfig, LanguagePack, LoggingConfig,
    MessageCatalog, QueueConfig, SchedulerConfig, TenancyConfig,
};
pub use db::{init_database, Database};
pub use error::{HelplineError, HelplineResult};
pub use models::{
    Agent, AgentExpiry, AgentKey, Channel, EndReason, LlmKind, Profile, RoleEntry, SessionRecord,
    SessionState, Summary, Tenant, TurnKind, Workspace, WorkspaceSettings,
};
pub use passes::{
    AgentExpiryPass, AgentSentimentPass, AssignmentPass, MemoryReclamationPass, SentimentPass,
    SummaryPass, TagsPass,
};
pub use queue::{wait_queue_key, MemoryQueueStore, PgQueueStore, QueueStore};
pub use scheduler::Coordinator;
pub use services::{AgentService, TenantService};
pub use store::{
    Directory, MemoryDirectory, MemoryTenantStore, PgDirectory, PgTenantStore, TenantStore,
};
