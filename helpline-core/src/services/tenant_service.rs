//! Tenant provisioning against the Postgres directory.

use std::sync::Arc;
use tracing::info;

use crate::error::{HelplineError, HelplineResult};
use crate::models::{Tenant, Workspace, WorkspaceSettings};
use crate::store::PgDirectory;

pub struct TenantService {
    directory: Arc<PgDirectory>,
}

impl TenantService {
    pub fn new(directory: Arc<PgDirectory>) -> Self {
        Self { directory }
    }

    /// Register a tenant and provision its isolated schema. The schema name
    /// is derived from the tenant name, so name collisions are rejected up
    /// front.
    pub async fn create_tenant(
        &self,
        bot_id: i64,
        bot_name: &str,
        timeout_minutes: i64,
    ) -> HelplineResult<Tenant> {
        let tenant = Tenant::new(bot_id, bot_name, timeout_minutes)?;

        let existing = self.directory.all_tenants().await?;
        if existing
            .iter()
            .any(|t| t.bot_id == bot_id || t.slug == tenant.slug)
        {
            return Err(HelplineError::TenantAlreadyExists(tenant.slug));
        }

        self.directory.insert_tenant(&tenant).await?;
        self.directory.provision_tenant_schema(&tenant.slug).await?;

        info!(bot_id, slug = %tenant.slug, "tenant provisioned");
        Ok(tenant)
    }

    /// Deactivate a tenant. Its schema and records stay in place; the
    /// coordinator stops touching it once the active flag drops.
    pub async fn deactivate_tenant(&self, bot_id: i64) -> HelplineResult<()> {
        self.directory.deactivate_tenant(bot_id).await?;
        info!(bot_id, "tenant deactivated");
        Ok(())
    }

    pub async fn list_tenants(&self) -> HelplineResult<Vec<Tenant>> {
        self.directory.all_tenants().await
    }

    /// Register a workspace and its coordinator toggles in one step.
    pub async fn create_workspace(
        &self,
        workspace: &Workspace,
        settings: &WorkspaceSettings,
    ) -> HelplineResult<()> {
        self.directory.insert_workspace(workspace).await?;
        self.directory.insert_settings(settings).await?;
        info!(
            bot_id = workspace.bot_id,
            workspace_id = workspace.workspace_id,
            llm = %workspace.llm,
            "workspace registered"
        );
        Ok(())
    }
}
