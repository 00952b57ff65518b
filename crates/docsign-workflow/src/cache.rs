//! Short-lived caches
//!
//! [`TtlCache`] is a small time-bounded map. The negative-result cache is
//! built on it and remembers "already reported invalid" lookups so a client
//! hammering a bad collection id costs one store read per TTL window.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::WorkflowError;

/// Map whose entries expire `ttl` after insertion
///
/// Expired entries are swept on insert, at most once per `ttl`, so the map
/// only holds what was inserted during the last two windows.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<Entries<K, V>>,
}

struct Entries<K, V> {
    map: HashMap<K, (Instant, V)>,
    swept_at: Option<Instant>,
}

impl<K, V> Entries<K, V>
where
    K: Eq + Hash,
{
    fn sweep(&mut self, ttl: Duration, now: Instant) -> usize {
        let before = self.map.len();
        self.map
            .retain(|_, (inserted, _)| now.duration_since(*inserted) < ttl);
        self.swept_at = Some(now);
        before - self.map.len()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                swept_at: None,
            }),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .map
            .get(key)
            .filter(|(inserted, _)| inserted.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Last writer wins
    pub async fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let due = entries
            .swept_at
            .map_or(true, |at| now.duration_since(at) >= self.ttl);
        if due {
            let dropped = entries.sweep(self.ttl, now);
            if dropped > 0 {
                debug!(dropped, remaining = entries.map.len(), "Swept expired cache entries");
            }
        }
        entries.map.insert(key, (now, value));
    }

    pub async fn remove(&self, key: &K) {
        self.entries.write().await.map.remove(key);
    }

    /// Drops expired entries, returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        entries.sweep(self.ttl, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.map.is_empty()
    }
}

/// Why a collection lookup was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegativeReason {
    NotFound,
    NotInGroup,
}

impl NegativeReason {
    /// The reason behind a cacheable error, if it is one
    pub fn of(error: &WorkflowError) -> Option<Self> {
        match error {
            WorkflowError::CollectionNotFound(_) => Some(Self::NotFound),
            WorkflowError::CollectionNotInGroup(_) => Some(Self::NotInGroup),
            _ => None,
        }
    }

    /// Rebuilds the exact error originally reported
    pub fn to_error(self, collection_id: Uuid) -> WorkflowError {
        match self {
            Self::NotFound => WorkflowError::CollectionNotFound(collection_id),
            Self::NotInGroup => WorkflowError::CollectionNotInGroup(collection_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NegativeKey {
    pub collection_id: Uuid,
    pub user_id: Uuid,
    pub reason: NegativeReason,
}

#[async_trait]
pub trait NegativeResultCache: Send + Sync {
    /// A previously remembered rejection for this caller and collection
    async fn lookup(&self, collection_id: Uuid, user_id: Uuid) -> Option<NegativeReason>;

    async fn remember(&self, key: NegativeKey);
}

/// Process-local negative cache
pub struct InMemoryNegativeCache {
    entries: TtlCache<NegativeKey, ()>,
}

impl InMemoryNegativeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(ttl),
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.entries.purge_expired().await
    }
}

#[async_trait]
impl NegativeResultCache for InMemoryNegativeCache {
    async fn lookup(&self, collection_id: Uuid, user_id: Uuid) -> Option<NegativeReason> {
        for reason in [NegativeReason::NotFound, NegativeReason::NotInGroup] {
            let key = NegativeKey {
                collection_id,
                user_id,
                reason,
            };
            if self.entries.get(&key).await.is_some() {
                return Some(reason);
            }
        }
        None
    }

    async fn remember(&self, key: NegativeKey) {
        self.entries.insert(key, ()).await;
    }
}
