//! Durable queue backend over the main database.
//!
//! One `queue_entries` table holds every list; a bigserial position gives the
//! per-key ordering. Each operation is a single statement, which is the
//! single-key atomicity the store contract requires.

use async_trait::async_trait;
use sqlx::PgPool;

use super::QueueStore;
use crate::error::HelplineResult;

#[derive(Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn enqueue(&self, item: &str, key: &str) -> HelplineResult<()> {
        sqlx::query("INSERT INTO queue_entries (queue_key, item) VALUES ($1, $2)")
            .bind(key)
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dequeue(&self, key: &str) -> HelplineResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM queue_entries
            WHERE id = (
                SELECT id FROM queue_entries
                WHERE queue_key = $1
                ORDER BY id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING item
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(item,)| item))
    }

    async fn view(&self, key: &str) -> HelplineResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT item FROM queue_entries WHERE queue_key = $1 ORDER BY id ASC",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(item,)| item).collect())
    }

    async fn remove(&self, item: &str, key: &str) -> HelplineResult<()> {
        sqlx::query(
            r#"
            DELETE FROM queue_entries
            WHERE id = (
                SELECT id FROM queue_entries
                WHERE queue_key = $1 AND item = $2
                ORDER BY id ASC
                LIMIT 1
            )
            "#,
        )
        .bind(key)
        .bind(item)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> HelplineResult<()> {
        sqlx::query("DELETE FROM queue_entries WHERE queue_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
