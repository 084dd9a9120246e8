//! Persistence client abstraction.
//!
//! The engine never talks to a server directly; every write goes through a
//! [`BlockStore`]. Calls may fail and are never retried by the engine.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::block::{Block, now_millis};
use crate::errors::StoreError;

/// Abstraction over block persistence for testability.
/// Real implementation: a REST client. Test double: `InMemoryStore`.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Insert blocks, replacing any existing block with the same id.
    async fn insert_blocks(&self, blocks: Vec<Block>) -> Result<(), StoreError>;

    /// Replace existing blocks.
    async fn update_blocks(&self, blocks: Vec<Block>) -> Result<(), StoreError>;

    /// Delete one block.
    async fn delete_block(&self, id: &str) -> Result<(), StoreError>;

    /// The block `root_id` and all of its descendants.
    async fn get_subtree(&self, root_id: &str) -> Result<Vec<Block>, StoreError>;
}

/// In-process store keyed by block id.
///
/// Deletes are soft: the block stays in the map with `delete_at` set, so it
/// still appears in subtree payloads.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blocks: RwLock<HashMap<String, Block>>,
    pending_failures: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `blocks`.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        let map = blocks.into_iter().map(|b| (b.id.clone(), b)).collect();
        Self {
            blocks: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Make the next `count` write calls fail with `StoreError::Rejected`.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of write calls (insert/update/delete) that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current copy of one block.
    pub async fn get(&self, id: &str) -> Option<Block> {
        self.blocks.read().await.get(id).cloned()
    }

    /// Number of stored blocks, deleted ones included.
    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Rejected("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockStore for InMemoryStore {
    async fn insert_blocks(&self, blocks: Vec<Block>) -> Result<(), StoreError> {
        self.begin_write()?;
        let mut map = self.blocks.write().await;
        for block in blocks {
            map.insert(block.id.clone(), block);
        }
        Ok(())
    }

    async fn update_blocks(&self, blocks: Vec<Block>) -> Result<(), StoreError> {
        self.begin_write()?;
        let mut map = self.blocks.write().await;
        if let Some(missing) = blocks.iter().find(|b| !map.contains_key(&b.id)) {
            return Err(StoreError::NotFound {
                id: missing.id.clone(),
            });
        }
        for block in blocks {
            map.insert(block.id.clone(), block);
        }
        Ok(())
    }

    async fn delete_block(&self, id: &str) -> Result<(), StoreError> {
        self.begin_write()?;
        let mut map = self.blocks.write().await;
        let block = map
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let now = now_millis();
        block.delete_at = now;
        block.update_at = now;
        Ok(())
    }

    async fn get_subtree(&self, root_id: &str) -> Result<Vec<Block>, StoreError> {
        let map = self.blocks.read().await;
        let root = map.get(root_id).ok_or_else(|| StoreError::NotFound {
            id: root_id.to_string(),
        })?;

        let mut children: HashMap<&str, Vec<&Block>> = HashMap::new();
        for block in map.values() {
            children.entry(block.parent_id.as_str()).or_default().push(block);
        }

        let mut result = vec![root.clone()];
        let mut queue = VecDeque::from([root.id.as_str()]);
        while let Some(parent) = queue.pop_front() {
            if let Some(kids) = children.get(parent) {
                let mut kids = kids.clone();
                kids.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
                for kid in kids {
                    if kid.id == root_id {
                        continue;
                    }
                    result.push(kid.clone());
                    queue.push_back(kid.id.as_str());
                }
            }
        }
        Ok(result)
    }
}
