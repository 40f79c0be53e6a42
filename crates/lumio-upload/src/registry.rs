//! Abort registry: in-flight upload cancellation tokens keyed by photo uid

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct Entry {
    order_id: String,
    token: CancellationToken,
    generation: u64,
}

/// Index of running upload jobs.
///
/// A job registers its token when it starts and unregisters it when it
/// terminates. The registry never owns job lifetimes; it is only used to find
/// the token to trigger. Registrations carry a generation so a late
/// `unregister` from an older job never removes a newer job's entry.
#[derive(Clone, Default)]
pub struct AbortRegistry {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    next_generation: Arc<AtomicU64>,
}

impl AbortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `uid`, replacing any previous entry. Returns the
    /// generation to pass to [`AbortRegistry::unregister`].
    pub async fn register(&self, order_id: &str, uid: &str, token: CancellationToken) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().await;
        entries.insert(
            uid.to_string(),
            Entry {
                order_id: order_id.to_string(),
                token,
                generation,
            },
        );
        generation
    }

    pub async fn unregister(&self, uid: &str, generation: u64) {
        let mut entries = self.entries.write().await;
        if entries
            .get(uid)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(uid);
        }
    }

    /// Trigger the token registered for `uid`. Returns false if nothing is
    /// running for it.
    pub async fn cancel(&self, uid: &str) -> bool {
        let entries = self.entries.read().await;
        match entries.get(uid) {
            Some(entry) => {
                entry.token.cancel();
                tracing::debug!(uid = %uid, order_id = %entry.order_id, "Upload cancel requested");
                true
            }
            None => false,
        }
    }

    /// Trigger every token registered for `order_id`. Returns how many were
    /// triggered.
    pub async fn cancel_order(&self, order_id: &str) -> usize {
        let entries = self.entries.read().await;
        let mut cancelled = 0;
        for entry in entries.values().filter(|e| e.order_id == order_id) {
            entry.token.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            tracing::info!(order_id = %order_id, cancelled, "Order uploads cancelled");
        }
        cancelled
    }

    pub async fn contains(&self, uid: &str) -> bool {
        self.entries.read().await.contains_key(uid)
    }

    pub async fn uids_for_order(&self, order_id: &str) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.order_id == order_id)
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
