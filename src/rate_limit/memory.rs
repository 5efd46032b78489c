use super::clock::{Clock, SystemClock};
use super::store::OrderedTimestampStore;
use super::types::{ScoreBound, StoreOp, StoreReply};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Score-ordered log for one key
#[derive(Debug, Default)]
struct SubjectLog {
    by_score: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
    expires_at_ms: Option<i64>,
}

impl SubjectLog {
    fn insert(&mut self, member: String, score: i64) -> u64 {
        match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                self.by_score.remove(&(previous, member.clone()));
                self.by_score.insert((score, member));
                0
            }
            None => {
                self.by_score.insert((score, member));
                1
            }
        }
    }

    fn remove_range(&mut self, min: ScoreBound, max: ScoreBound) -> u64 {
        let doomed: Vec<(i64, String)> = self
            .by_score
            .iter()
            .skip_while(|(score, _)| !min.admits_from_below(*score))
            .take_while(|(score, _)| max.admits_from_above(*score))
            .cloned()
            .collect();

        for entry in &doomed {
            self.by_score.remove(entry);
            self.scores.remove(&entry.1);
        }

        doomed.len() as u64
    }

    fn len(&self) -> u64 {
        self.by_score.len() as u64
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }

    fn clear(&mut self) {
        self.by_score.clear();
        self.scores.clear();
        self.expires_at_ms = None;
    }
}

/// In-process ordered timestamp store.
///
/// Each key owns its own lock, so a batch holds only its subject's log and
/// batches on other keys proceed in parallel. Expiry is measured on the
/// store's clock; share a [`ManualClock`](super::clock::ManualClock) with the
/// limiter to drive both together.
///
/// Expired logs read as empty but keep their map entry until
/// [`purge_expired`](Self::purge_expired) runs. Long-running processes should
/// start [`spawn_purge_task`](Self::spawn_purge_task).
pub struct InMemoryStore<C = SystemClock> {
    logs: Arc<DashMap<String, Arc<Mutex<SubjectLog>>>>,
    clock: C,
}

impl InMemoryStore<SystemClock> {
    /// Create a new in-memory store on the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            logs: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Get the number of keys currently held (for testing/monitoring)
    pub fn active_keys(&self) -> usize {
        self.logs.len()
    }

    /// Drop every log that is expired or empty; returns how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let candidates: Vec<(String, Arc<Mutex<SubjectLog>>)> = self
            .logs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut purged = 0;
        for (key, handle) in candidates {
            let log = handle.lock().await;
            if log.is_expired(now_ms) || log.len() == 0 {
                // Unlink while holding the log's lock; a batch queued on it
                // notices and retries against a fresh log.
                let removed = self
                    .logs
                    .remove_if(&key, |_, current| Arc::ptr_eq(current, &handle));
                if removed.is_some() {
                    purged += 1;
                }
            }
        }

        if purged > 0 {
            debug!("Purged {} idle subject logs", purged);
        }
        purged
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every` on the tokio
    /// runtime. The task holds only a weak handle and ends once the store is
    /// dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()>
    where
        C: 'static,
    {
        let store: Weak<Self> = Arc::downgrade(self);
        debug!("Starting subject log sweeper every {:?}", every);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired().await;
                    }
                    None => break,
                }
            }
        })
    }

    fn log_for(&self, key: &str) -> Arc<Mutex<SubjectLog>> {
        self.logs
            .entry(key.to_string())
            .or_insert_with(|| {
                trace!("Creating subject log for key: {}", key);
                Arc::new(Mutex::new(SubjectLog::default()))
            })
            .clone()
    }
}

#[async_trait]
impl<C: Clock> OrderedTimestampStore for InMemoryStore<C> {
    async fn execute_atomic(
        &self,
        key: &str,
        ops: Vec<StoreOp>,
    ) -> Result<Vec<StoreReply>, StoreError> {
        loop {
            let handle = self.log_for(key);
            let mut log = handle.lock().await;

            // A purge may have unlinked this log while we waited for it.
            let still_linked = self
                .logs
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &handle));
            if !still_linked {
                continue;
            }

            let now_ms = self.clock.now_ms();
            if log.is_expired(now_ms) {
                log.clear();
            }

            let mut replies = Vec::with_capacity(ops.len());
            for op in ops {
                let reply = match op {
                    StoreOp::InsertScored { member, score } => {
                        StoreReply::Inserted(log.insert(member, score))
                    }
                    StoreOp::RemoveScoreRange { min, max } => {
                        StoreReply::Removed(log.remove_range(min, max))
                    }
                    StoreOp::Cardinality => StoreReply::Cardinality(log.len()),
                    StoreOp::ExpireAfter { ttl_ms } => {
                        let ttl_ms = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
                        log.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
                        StoreReply::ExpirySet(true)
                    }
                };
                replies.push(reply);
            }

            return Ok(replies);
        }
    }
}
