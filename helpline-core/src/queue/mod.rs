//! Shared ordered queue store.
//!
//! One list per key, used both as a workspace wait-queue and as a per-agent
//! active-session list. Queue membership, not a session field, is the source
//! of truth for current assignment; mutation is always a dequeue-then-enqueue
//! pair so a session belongs to at most one key at a time.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::HelplineResult;

pub use memory::MemoryQueueStore;
pub use postgres::PgQueueStore;

/// Ordered per-key list contract. FIFO end-to-end: items enqueue at the head
/// and dequeue from the tail. All operations are atomic at single-key
/// granularity.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Push an item onto the head of the list.
    async fn enqueue(&self, item: &str, key: &str) -> HelplineResult<()>;

    /// Pop the tail item (the oldest enqueued).
    async fn dequeue(&self, key: &str) -> HelplineResult<Option<String>>;

    /// Snapshot the list oldest-first without mutating it.
    async fn view(&self, key: &str) -> HelplineResult<Vec<String>>;

    /// Delete the first occurrence of an item.
    async fn remove(&self, item: &str, key: &str) -> HelplineResult<()>;

    /// Drop the entire list.
    async fn delete(&self, key: &str) -> HelplineResult<()>;
}

/// Workspace wait-queue key: "{prefix}:{bot_id}:{workspace_id}".
pub fn wait_queue_key(prefix: &str, bot_id: i64, workspace_id: i64) -> String {
    format!("{prefix}:{bot_id}:{workspace_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_queue_key() {
        assert_eq!(wait_queue_key("transfer", 7, 3), "transfer:7:3");
    }
}
