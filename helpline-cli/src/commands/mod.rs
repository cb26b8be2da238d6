pub mod agents;
pub mod serve;
pub mod tenants;
pub mod workspaces;

use std::sync::Arc;

use helpline_core::{
    CoordinatorConfig, Database, MemoryQueueStore, PgDirectory, PgQueueStore, QueueStore,
};

pub use agents::{handle_agents_command, AgentsCommand};
pub use serve::handle_serve_command;
pub use tenants::{handle_tenants_command, TenantsCommand};
pub use workspaces::{handle_workspaces_command, WorkspacesCommand};

pub(crate) async fn connect(
    config: &CoordinatorConfig,
) -> anyhow::Result<(Database, Arc<PgDirectory>)> {
    let db = Database::connect(&config.database).await?;
    let directory = Arc::new(PgDirectory::new(
        db.pool().clone(),
        config.tenancy.schema_suffix.clone(),
    ));
    Ok((db, directory))
}

pub(crate) fn queue_store(config: &CoordinatorConfig, db: &Database) -> Arc<dyn QueueStore> {
    if config.queue.backend == "memory" {
        Arc::new(MemoryQueueStore::new())
    } else {
        Arc::new(PgQueueStore::new(db.pool().clone()))
    }
}
