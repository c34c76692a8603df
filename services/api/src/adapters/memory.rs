//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DocumentStore` port. Used when no
//! database is configured, and by the integration tests.

use async_trait::async_trait;
use prep_core::ports::{new_push_key, DocumentStore, PortResult, ValueStream};
use prep_core::tree;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the change channel; lagging subscribers re-read instead of replaying.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct InMemoryDocumentStore {
    root: Arc<RwLock<Value>>,
    changes: broadcast::Sender<String>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            root: Arc::new(RwLock::new(Value::Null)),
            changes,
        }
    }

    async fn snapshot(&self, path: &str) -> Option<Value> {
        read_at(&self.root, path).await
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self, path: &str) -> PortResult<Option<Value>> {
        Ok(self.snapshot(path).await)
    }

    async fn write(&self, path: &str, value: Value) -> PortResult<()> {
        {
            let mut root = self.root.write().await;
            tree::set(&mut root, path, value);
        }
        // No receivers is not an error.
        let _ = self.changes.send(tree::normalize(path));
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> PortResult<String> {
        let key = new_push_key();
        self.write(&tree::join(&[path, &key]), value).await?;
        Ok(key)
    }

    async fn subscribe(&self, path: &str) -> PortResult<ValueStream> {
        let path = tree::normalize(path);
        let mut changes = self.changes.subscribe();
        let initial = self.snapshot(&path).await;
        let root = self.root.clone();

        let stream = async_stream::stream! {
            yield Ok(initial);
            loop {
                match changes.recv().await {
                    Ok(changed) if !tree::overlaps(&changed, &path) => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        yield Ok(read_at(&root, &path).await);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

async fn read_at(root: &RwLock<Value>, path: &str) -> Option<Value> {
    let root = root.read().await;
    tree::get(&root, path).cloned().map(tree::restore_arrays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn arrays_read_back_as_arrays() {
        let store = InMemoryDocumentStore::new();
        store
            .write("users/u1/subjects/s1/topics", json!([{"name": "Preamble"}, {"name": "DPSP"}]))
            .await
            .unwrap();
        let topics = store.read("users/u1/subjects/s1/topics").await.unwrap().unwrap();
        assert_eq!(topics, json!([{"name": "Preamble"}, {"name": "DPSP"}]));
    }

    #[tokio::test]
    async fn pushed_children_can_be_removed() {
        let store = InMemoryDocumentStore::new();
        let first = store.push("users/u1/flashCards", json!({"question": "a"})).await.unwrap();
        let second = store.push("users/u1/flashCards", json!({"question": "b"})).await.unwrap();
        assert_ne!(first, second);

        store.remove(&format!("users/u1/flashCards/{first}")).await.unwrap();
        let cards = store.read("users/u1/flashCards").await.unwrap().unwrap();
        assert_eq!(cards.as_object().map(|m| m.len()), Some(1));
    }

    #[tokio::test]
    async fn subscribers_see_overlapping_writes_only() {
        let store = InMemoryDocumentStore::new();
        let mut stream = store.subscribe("users/u1/streak").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        store.write("users/u2/streak", json!(5)).await.unwrap();
        store.write("users/u1/streak", json!(3)).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Some(json!(3)));

        store.remove("users/u1").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), None);
    }
}
