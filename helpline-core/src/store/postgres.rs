//! Postgres-backed directory and tenant stores.
//!
//! Tenant isolation is schema-per-tenant: each tenant's collections live in
//! a `<slug><suffix>` schema discovered through `information_schema`. Schema
//! names are always rebuilt through [`slugify`] before being interpolated
//! into SQL, so only validated identifiers ever reach a statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;

use super::{Directory, TenantStore};
use crate::error::HelplineResult;
use crate::models::{
    slugify, Agent, AgentKey, Profile, RoleEntry, SessionRecord, Summary, Tenant, Workspace,
    WorkspaceSettings,
};

/// DDL template for a freshly provisioned tenant schema. `{schema}` is
/// substituted with the validated schema name.
pub const TENANT_SCHEMA_TEMPLATE: &str = include_str!("tenant_schema.sql");

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
    schema_suffix: String,
}

impl PgDirectory {
    pub fn new(pool: PgPool, schema_suffix: impl Into<String>) -> Self {
        Self {
            pool,
            schema_suffix: schema_suffix.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn schema_for(&self, slug: &str) -> HelplineResult<String> {
        let slug = slugify(slug)?;
        Ok(format!("{}{}", slug, self.schema_suffix))
    }

    /// Create the schema and collections for a new tenant. Safe to repeat.
    pub async fn provision_tenant_schema(&self, slug: &str) -> HelplineResult<()> {
        let schema = self.schema_for(slug)?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
            .execute(&self.pool)
            .await?;

        for statement in TENANT_SCHEMA_TEMPLATE.replace("{schema}", &schema).split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub async fn insert_tenant(&self, tenant: &Tenant) -> HelplineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (bot_id, bot_name, slug, is_active, timeout_minutes, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tenant.bot_id)
        .bind(&tenant.bot_name)
        .bind(&tenant.slug)
        .bind(tenant.is_active)
        .bind(tenant.timeout_minutes)
        .bind(tenant.created_at)
        .bind(tenant.modified_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn deactivate_tenant(&self, bot_id: i64) -> HelplineResult<()> {
        sqlx::query("UPDATE tenants SET is_active = FALSE, modified_at = $2 WHERE bot_id = $1")
            .bind(bot_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn all_tenants(&self) -> HelplineResult<Vec<Tenant>> {
        let records = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT bot_id, bot_name, slug, is_active, timeout_minutes, created_at, modified_at
            FROM tenants
            ORDER BY bot_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn insert_workspace(&self, workspace: &Workspace) -> HelplineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workspaces
                (bot_id, workspace_id, llm, model, llm_api_key, llm_url,
                 sessions_limit, is_active, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(workspace.bot_id)
        .bind(workspace.workspace_id)
        .bind(workspace.llm)
        .bind(&workspace.model)
        .bind(&workspace.llm_api_key)
        .bind(&workspace.llm_url)
        .bind(workspace.sessions_limit)
        .bind(workspace.is_active)
        .bind(workspace.created_at)
        .bind(workspace.modified_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_settings(&self, settings: &WorkspaceSettings) -> HelplineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workspace_settings
                (bot_id, workspace_id, auto_assignment, conversation_sentiment,
                 agent_sentiment, summary)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (bot_id, workspace_id) DO UPDATE SET
                auto_assignment = EXCLUDED.auto_assignment,
                conversation_sentiment = EXCLUDED.conversation_sentiment,
                agent_sentiment = EXCLUDED.agent_sentiment,
                summary = EXCLUDED.summary
            "#,
        )
        .bind(settings.bot_id)
        .bind(settings.workspace_id)
        .bind(settings.auto_assignment)
        .bind(settings.conversation_sentiment)
        .bind(settings.agent_sentiment)
        .bind(settings.summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn list_tenant_slugs(&self) -> HelplineResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT schema_name FROM information_schema.schemata
            WHERE schema_name LIKE '%' || $1
            ORDER BY schema_name ASC
            "#,
        )
        .bind(&self.schema_suffix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(schema,)| {
                crate::models::slug_from_schema(&schema, &self.schema_suffix)
                    .map(|slug| slug.to_string())
            })
            .collect())
    }

    async fn find_active_tenant(&self, slug: &str) -> HelplineResult<Option<Tenant>> {
        let record = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT bot_id, bot_name, slug, is_active, timeout_minutes, created_at, modified_at
            FROM tenants
            WHERE slug = $1 AND is_active = TRUE
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn active_workspaces(&self, bot_id: i64) -> HelplineResult<Vec<Workspace>> {
        let records = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT bot_id, workspace_id, llm, model, llm_api_key, llm_url,
                   sessions_limit, is_active, created_at, modified_at
            FROM workspaces
            WHERE bot_id = $1 AND is_active = TRUE
            ORDER BY workspace_id ASC
            "#,
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn find_workspace(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<Workspace>> {
        let record = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT bot_id, workspace_id, llm, model, llm_api_key, llm_url,
                   sessions_limit, is_active, created_at, modified_at
            FROM workspaces
            WHERE bot_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(bot_id)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_settings(
        &self,
        bot_id: i64,
        workspace_id: i64,
    ) -> HelplineResult<Option<WorkspaceSettings>> {
        let record = sqlx::query_as::<_, WorkspaceSettings>(
            r#"
            SELECT bot_id, workspace_id, auto_assignment, conversation_sentiment,
                   agent_sentiment, summary
            FROM workspace_settings
            WHERE bot_id = $1 AND workspace_id = $2
            "#,
        )
        .bind(bot_id)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn tenant_store(&self, slug: &str) -> HelplineResult<Arc<dyn TenantStore>> {
        let schema = self.schema_for(slug)?;
        Ok(Arc::new(PgTenantStore::new(self.pool.clone(), schema)))
    }
}

pub struct PgTenantStore {
    pool: PgPool,
    schema: String,
}

impl PgTenantStore {
    /// `schema` must already be a validated identifier (see
    /// [`PgDirectory::tenant_store`]).
    pub fn new(pool: PgPool, schema: String) -> Self {
        Self { pool, schema }
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    fn select_sessions(&self, predicate: &str) -> String {
        format!(
            r#"
            SELECT session_id, workspace_id, roles, timeout_minutes, latest_timestamp,
                   end_conversation, transfer_conversation, human_intervention, agent_expiry,
                   language, sentiment, agent_sentiment, tags, thread_slug
            FROM {} {}
            "#,
            self.table("sessions"),
            predicate
        )
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn active_agents(&self, workspace_id: i64) -> HelplineResult<Vec<Agent>> {
        let records = sqlx::query_as::<_, Agent>(&format!(
            r#"
            SELECT agent_id, agent_name, agent_email, workspace_id, is_active,
                   created_at, modified_at
            FROM {}
            WHERE workspace_id = $1 AND is_active = TRUE
            ORDER BY agent_id ASC
            "#,
            self.table("agents")
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn find_active_agent(
        &self,
        key: &AgentKey,
        workspace_id: i64,
    ) -> HelplineResult<Option<Agent>> {
        let record = sqlx::query_as::<_, Agent>(&format!(
            r#"
            SELECT agent_id, agent_name, agent_email, workspace_id, is_active,
                   created_at, modified_at
            FROM {}
            WHERE agent_id = $1 AND agent_name = $2 AND agent_email = $3
              AND workspace_id = $4 AND is_active = TRUE
            "#,
            self.table("agents")
        ))
        .bind(&key.agent_id)
        .bind(&key.agent_name)
        .bind(&key.agent_email)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_agent(&self, agent: &Agent) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (agent_id, agent_name, agent_email, workspace_id,
                            is_active, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            self.table("agents")
        ))
        .bind(&agent.agent_id)
        .bind(&agent.agent_name)
        .bind(&agent.agent_email)
        .bind(agent.workspace_id)
        .bind(agent.is_active)
        .bind(agent.created_at)
        .bind(agent.modified_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_agent(&self, key: &AgentKey, workspace_id: i64) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {} SET is_active = FALSE, modified_at = $5
            WHERE agent_id = $1 AND agent_name = $2 AND agent_email = $3 AND workspace_id = $4
            "#,
            self.table("agents")
        ))
        .bind(&key.agent_id)
        .bind(&key.agent_name)
        .bind(&key.agent_email)
        .bind(workspace_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &SessionRecord) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {}
                (session_id, workspace_id, roles, timeout_minutes, latest_timestamp,
                 end_conversation, transfer_conversation, human_intervention, agent_expiry,
                 language, sentiment, agent_sentiment, tags, thread_slug)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
            self.table("sessions")
        ))
        .bind(&session.session_id)
        .bind(session.workspace_id)
        .bind(&session.roles)
        .bind(session.timeout_minutes)
        .bind(session.latest_timestamp)
        .bind(session.end_conversation)
        .bind(session.transfer_conversation)
        .bind(session.human_intervention)
        .bind(session.agent_expiry)
        .bind(&session.language)
        .bind(&session.sentiment)
        .bind(&session.agent_sentiment)
        .bind(&session.tags)
        .bind(&session.thread_slug)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> HelplineResult<Option<SessionRecord>> {
        let record =
            sqlx::query_as::<_, SessionRecord>(&self.select_sessions("WHERE session_id = $1"))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    async fn all_sessions(&self) -> HelplineResult<Vec<SessionRecord>> {
        let records = sqlx::query_as::<_, SessionRecord>(&self.select_sessions(""))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn open_handoff_sessions(&self) -> HelplineResult<Vec<SessionRecord>> {
        let records = sqlx::query_as::<_, SessionRecord>(&self.select_sessions(
            "WHERE end_conversation = FALSE AND (transfer_conversation = TRUE OR human_intervention = TRUE)",
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn sessions_awaiting_sentiment(&self) -> HelplineResult<Vec<SessionRecord>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            &self.select_sessions("WHERE sentiment IS NULL AND language IS NULL"),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn sessions_awaiting_agent_sentiment(&self) -> HelplineResult<Vec<SessionRecord>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            &self.select_sessions("WHERE agent_sentiment IS NULL AND end_conversation = TRUE"),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn sessions_awaiting_tags(&self) -> HelplineResult<Vec<SessionRecord>> {
        let records =
            sqlx::query_as::<_, SessionRecord>(&self.select_sessions("WHERE tags IS NULL"))
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    async fn append_role(
        &self,
        session_id: &str,
        entry: &RoleEntry,
        latest: DateTime<Utc>,
    ) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {} SET roles = roles || $2::jsonb, latest_timestamp = $3
            WHERE session_id = $1
            "#,
            self.table("sessions")
        ))
        .bind(session_id)
        .bind(Json(entry))
        .bind(latest)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_session_ended(
        &self,
        session_id: &str,
        agent_expiry: bool,
    ) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {} SET end_conversation = TRUE, agent_expiry = agent_expiry OR $2
            WHERE session_id = $1 AND end_conversation = FALSE
            "#,
            self.table("sessions")
        ))
        .bind(session_id)
        .bind(agent_expiry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_language_sentiment(
        &self,
        session_id: &str,
        language: &str,
        sentiment: &str,
    ) -> HelplineResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET language = $2, sentiment = $3 WHERE session_id = $1",
            self.table("sessions")
        ))
        .bind(session_id)
        .bind(language)
        .bind(sentiment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_agent_sentiment(&self, session_id: &str, sentiment: &str) -> HelplineResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET agent_sentiment = $2 WHERE session_id = $1",
            self.table("sessions")
        ))
        .bind(session_id)
        .bind(sentiment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_tags(&self, session_id: &str, tags: &[String]) -> HelplineResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET tags = $2 WHERE session_id = $1",
            self.table("sessions")
        ))
        .bind(session_id)
        .bind(tags)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_profile(&self, profile: &Profile) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {}
                (session_id, workspace_id, channel, preference, contact,
                 created_at, latest_timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            self.table("profiles")
        ))
        .bind(&profile.session_id)
        .bind(profile.workspace_id)
        .bind(profile.channel)
        .bind(&profile.preference)
        .bind(&profile.contact)
        .bind(profile.created_at)
        .bind(profile.latest_timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_profile(&self, session_id: &str) -> HelplineResult<Option<Profile>> {
        let record = sqlx::query_as::<_, Profile>(&format!(
            r#"
            SELECT session_id, workspace_id, channel, preference, contact,
                   created_at, latest_timestamp
            FROM {}
            WHERE session_id = $1
            "#,
            self.table("profiles")
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn touch_profile(&self, session_id: &str, ts: DateTime<Utc>) -> HelplineResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET latest_timestamp = $2 WHERE session_id = $1",
            self.table("profiles")
        ))
        .bind(session_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_history(&self, session_id: &str) -> HelplineResult<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE session_id = $1",
            self.table("history")
        ))
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_summary(&self, session_id: &str) -> HelplineResult<Option<Summary>> {
        let record = sqlx::query_as::<_, Summary>(&format!(
            r#"
            SELECT session_id, bot_id, summary, created_at
            FROM {}
            WHERE session_id = $1
            "#,
            self.table("summaries")
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_summary(&self, summary: &Summary) -> HelplineResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (session_id, bot_id, summary, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO NOTHING
            "#,
            self.table("summaries")
        ))
        .bind(&summary.session_id)
        .bind(summary.bot_id)
        .bind(&summary.summary)
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
