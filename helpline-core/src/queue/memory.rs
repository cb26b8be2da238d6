//! In-memory queue backend.
//!
//! Test backend and single-node development mode. Not durable: pending
//! assignments do not survive a restart.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use super::QueueStore;
use crate::error::HelplineResult;

#[derive(Default)]
pub struct MemoryQueueStore {
    // Oldest item at the front of each deque.
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, item: &str, key: &str) -> HelplineResult<()> {
        let mut lists = self.lists.write().await;
        lists
            .entry(key.to_string())
            .or_default()
            .push_back(item.to_string());
        Ok(())
    }

    async fn dequeue(&self, key: &str) -> HelplineResult<Option<String>> {
        let mut lists = self.lists.write().await;
        let item = lists.get_mut(key).and_then(|list| list.pop_front());
        if let Some(list) = lists.get(key) {
            if list.is_empty() {
                lists.remove(key);
            }
        }
        Ok(item)
    }

    async fn view(&self, key: &str) -> HelplineResult<Vec<String>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove(&self, item: &str, key: &str) -> HelplineResult<()> {
        let mut lists = self.lists.write().await;
        if let Some(list) = lists.get_mut(key) {
            if let Some(pos) = list.iter().position(|entry| entry == item) {
                list.remove(pos);
            }
            if list.is_empty() {
                lists.remove(key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> HelplineResult<()> {
        let mut lists = self.lists.write().await;
        lists.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let store = MemoryQueueStore::new();
        store.enqueue("a", "q").await.unwrap();
        store.enqueue("b", "q").await.unwrap();
        store.enqueue("c", "q").await.unwrap();

        assert_eq!(store.dequeue("q").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.dequeue("q").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.dequeue("q").await.unwrap(), Some("c".to_string()));
        assert_eq!(store.dequeue("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_view_is_oldest_first_and_non_mutating() {
        let store = MemoryQueueStore::new();
        store.enqueue("a", "q").await.unwrap();
        store.enqueue("b", "q").await.unwrap();

        let snapshot = store.view("q").await.unwrap();
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);

        // Unchanged after viewing.
        assert_eq!(store.view("q").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_first_occurrence_only() {
        let store = MemoryQueueStore::new();
        store.enqueue("a", "q").await.unwrap();
        store.enqueue("b", "q").await.unwrap();
        store.enqueue("a", "q").await.unwrap();

        store.remove("a", "q").await.unwrap();
        assert_eq!(
            store.view("q").await.unwrap(),
            vec!["b".to_string(), "a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_drops_list() {
        let store = MemoryQueueStore::new();
        store.enqueue("a", "q").await.unwrap();
        store.delete("q").await.unwrap();
        assert!(store.view("q").await.unwrap().is_empty());
        assert_eq!(store.dequeue("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryQueueStore::new();
        store.enqueue("a", "q1").await.unwrap();
        store.enqueue("b", "q2").await.unwrap();

        assert_eq!(store.dequeue("q1").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.view("q2").await.unwrap(), vec!["b".to_string()]);
    }
}
