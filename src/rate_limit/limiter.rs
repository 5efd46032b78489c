use super::clock::{Clock, SystemClock};
use super::key_schema::{KeySchema, SubjectKeys};
use super::store::{unexpected, OrderedTimestampStore};
use super::types::{HitOutcome, ScoreBound, StoreOp, StoreReply};
use crate::config::LimiterConfig;
use crate::error::{LimiterError, Result, StoreError};
use std::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Longest expiry handed to a store. Leaves room for `now + ttl` in an i64
/// on both the in-memory store and Redis.
pub const MAX_LOG_TTL_MS: u64 = (i64::MAX / 2) as u64;

/// Sliding-window rate limiter.
///
/// Every hit on a subject is recorded in the subject's log, scored by its
/// timestamp. A hit is over the limit when, after recording it and evicting
/// everything at or before `now - window_size_ms`, the log holds more than
/// `max_hits` records. Over-limit hits stay recorded.
///
/// The limiter keeps no state of its own beyond its policy; any number of
/// instances, in any number of processes, may share one store.
pub struct SlidingWindowRateLimiter<S, K = KeySchema, C = SystemClock> {
    window_size_ms: f64,
    max_hits: u64,
    store: S,
    keys: K,
    clock: C,
}

impl<S, K> SlidingWindowRateLimiter<S, K, SystemClock>
where
    S: OrderedTimestampStore,
    K: SubjectKeys,
{
    /// Create a limiter timed by the system clock
    pub fn new(window_size_ms: f64, max_hits: u64, store: S, keys: K) -> Result<Self> {
        Self::with_clock(window_size_ms, max_hits, store, keys, SystemClock)
    }
}

impl<S> SlidingWindowRateLimiter<S, KeySchema, SystemClock>
where
    S: OrderedTimestampStore,
{
    /// Create a limiter from a loaded configuration
    pub fn from_config(config: &LimiterConfig, store: S) -> Result<Self> {
        Self::new(
            config.limiter.window_size_ms,
            config.limiter.max_hits,
            store,
            KeySchema::new(config.keys.prefix.clone()),
        )
    }
}

impl<S, K, C> SlidingWindowRateLimiter<S, K, C>
where
    S: OrderedTimestampStore,
    K: SubjectKeys,
    C: Clock,
{
    /// Create a limiter timed by `clock`.
    ///
    /// Every participant sharing a store must read the same clock, or at
    /// least clocks agreeing on the epoch.
    pub fn with_clock(
        window_size_ms: f64,
        max_hits: u64,
        store: S,
        keys: K,
        clock: C,
    ) -> Result<Self> {
        if !window_size_ms.is_finite() || window_size_ms <= 0.0 {
            return Err(LimiterError::InvalidConfiguration(format!(
                "window_size_ms must be a positive number, got {}",
                window_size_ms
            )));
        }
        if max_hits == 0 {
            return Err(LimiterError::InvalidConfiguration(
                "max_hits must be > 0".to_string(),
            ));
        }

        Ok(Self {
            window_size_ms,
            max_hits,
            store,
            keys,
            clock,
        })
    }

    pub fn window_size_ms(&self) -> f64 {
        self.window_size_ms
    }

    pub fn max_hits(&self) -> u64 {
        self.max_hits
    }

    /// Key of the log backing `name` under this limiter's policy
    pub fn subject_key(&self, name: &str) -> String {
        self.keys
            .subject_key(name, self.window_size_ms, self.max_hits)
    }

    /// Record a hit for `name`.
    ///
    /// Fails with [`LimiterError::RateLimitExceeded`] when the subject is
    /// over its limit; the hit is recorded either way.
    pub async fn hit(&self, name: &str) -> Result<()> {
        let outcome = self.check(name).await?;
        if outcome.allowed {
            Ok(())
        } else {
            Err(LimiterError::RateLimitExceeded {
                key: self.subject_key(name),
                hits: outcome.hits,
                max_hits: self.max_hits,
            })
        }
    }

    /// Record a hit for `name` and report where the subject stands.
    ///
    /// Same store effect as [`hit`](Self::hit), but an over-limit hit is
    /// returned as `allowed: false` instead of an error.
    pub async fn check(&self, name: &str) -> Result<HitOutcome> {
        if name.is_empty() {
            return Err(LimiterError::InvalidSubject(
                "subject name must not be empty".to_string(),
            ));
        }

        let key = self.subject_key(name);
        let timestamp = self.clock.now_ms();
        let ops = self.hit_batch(timestamp);

        trace!(key = %key, timestamp, "Submitting hit batch");

        let started = Instant::now();
        let replies = self.store.execute_atomic(&key, ops).await;
        crate::metrics::record_store_batch(started.elapsed());

        let replies = replies.inspect_err(|_| crate::metrics::record_store_error())?;
        let hits = cardinality_of(&replies)?;
        let outcome = HitOutcome::from_count(hits, self.max_hits);

        crate::metrics::record_hit(outcome.allowed);
        if outcome.allowed {
            debug!(key = %key, hits, max_hits = self.max_hits, "Hit allowed");
        } else {
            debug!(key = %key, hits, max_hits = self.max_hits, "Rate limit exceeded");
        }

        Ok(outcome)
    }

    /// Insert, evict, count and refresh expiry for one hit at `timestamp`
    fn hit_batch(&self, timestamp: i64) -> Vec<StoreOp> {
        let member = format!("{}-{}", timestamp, Uuid::new_v4().simple());

        // Scores are whole milliseconds, so `score <= ts - window` is the
        // same as `score <= floor(ts - window)`.
        let evict_up_to = (timestamp as f64 - self.window_size_ms).floor() as i64;

        vec![
            StoreOp::InsertScored {
                member,
                score: timestamp,
            },
            StoreOp::RemoveScoreRange {
                min: ScoreBound::NegInfinity,
                max: ScoreBound::Inclusive(evict_up_to),
            },
            StoreOp::Cardinality,
            StoreOp::ExpireAfter {
                ttl_ms: self.log_ttl_ms(),
            },
        ]
    }

    fn log_ttl_ms(&self) -> u64 {
        let ttl = self.window_size_ms.ceil();
        if ttl >= MAX_LOG_TTL_MS as f64 {
            MAX_LOG_TTL_MS
        } else {
            ttl as u64
        }
    }
}

fn cardinality_of(replies: &[StoreReply]) -> Result<u64> {
    match replies.get(2) {
        Some(StoreReply::Cardinality(n)) => Ok(*n),
        Some(other) => Err(unexpected("Cardinality", *other).into()),
        None => Err(StoreError::UnexpectedReply(format!(
            "expected 4 replies, got {}",
            replies.len()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::clock::ManualClock;
    use crate::rate_limit::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn limiter(
        window_size_ms: f64,
        max_hits: u64,
        clock: &ManualClock,
    ) -> SlidingWindowRateLimiter<InMemoryStore<ManualClock>, KeySchema, ManualClock> {
        SlidingWindowRateLimiter::with_clock(
            window_size_ms,
            max_hits,
            InMemoryStore::with_clock(clock.clone()),
            KeySchema::default(),
            clock.clone(),
        )
        .unwrap()
    }

    struct DownStore;

    #[async_trait]
    impl OrderedTimestampStore for DownStore {
        async fn execute_atomic(
            &self,
            _key: &str,
            _ops: Vec<StoreOp>,
        ) -> std::result::Result<Vec<StoreReply>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        for window in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result =
                SlidingWindowRateLimiter::new(window, 3, InMemoryStore::new(), KeySchema::default());
            assert!(matches!(
                result,
                Err(LimiterError::InvalidConfiguration(_))
            ));
        }

        let result =
            SlidingWindowRateLimiter::new(1000.0, 0, InMemoryStore::new(), KeySchema::default());
        assert!(matches!(result, Err(LimiterError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_hit_batch_shape() {
        let clock = ManualClock::new(10_000);
        let limiter = limiter(1000.5, 3, &clock);

        let ops = limiter.hit_batch(10_000);
        assert_eq!(ops.len(), 4);

        match &ops[0] {
            StoreOp::InsertScored { member, score } => {
                assert_eq!(*score, 10_000);
                assert!(member.starts_with("10000-"));
            }
            other => panic!("unexpected first op: {:?}", other),
        }
        assert_eq!(
            ops[1],
            StoreOp::RemoveScoreRange {
                min: ScoreBound::NegInfinity,
                max: ScoreBound::Inclusive(8_999),
            }
        );
        assert_eq!(ops[2], StoreOp::Cardinality);
        assert_eq!(ops[3], StoreOp::ExpireAfter { ttl_ms: 1001 });
    }

    #[test]
    fn test_members_unique_within_same_millisecond() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1000.0, 3, &clock);

        let member = |ops: Vec<StoreOp>| match ops.into_iter().next() {
            Some(StoreOp::InsertScored { member, .. }) => member,
            other => panic!("unexpected op: {:?}", other),
        };
        assert_ne!(member(limiter.hit_batch(5)), member(limiter.hit_batch(5)));
    }

    #[test]
    fn test_huge_window_ttl_is_clamped() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1e19, 1, &clock);

        match limiter.hit_batch(0).pop() {
            Some(StoreOp::ExpireAfter { ttl_ms }) => assert_eq!(ttl_ms, MAX_LOG_TTL_MS),
            other => panic!("unexpected last op: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_huge_window_still_limits() {
        let clock = ManualClock::new(1_700_000_000_000);
        let limiter = limiter(1e19, 1, &clock);

        let mut counts = Vec::new();
        for _ in 0..3 {
            counts.push(limiter.check("u").await.unwrap().hits);
            clock.advance(1);
        }

        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_allows_up_to_max_hits() {
        let clock = ManualClock::new(1_000_000);
        let limiter = limiter(1000.0, 3, &clock);

        for _ in 0..3 {
            limiter.hit("user1").await.unwrap();
            clock.advance(10);
        }

        let err = limiter.hit("user1").await.unwrap_err();
        assert!(err.is_rate_limited());

        clock.advance(1100);
        limiter.hit("user1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_hits_are_still_recorded() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1000.0, 1, &clock);

        limiter.hit("a").await.unwrap();
        clock.advance(600);
        assert!(limiter.hit("a").await.is_err());

        // The first hit has left the window but the rejected one has not.
        clock.advance(600);
        let outcome = limiter.check("a").await.unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.hits, 2);
    }

    #[tokio::test]
    async fn test_eviction_boundary_is_inclusive() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1000.0, 1, &clock);

        limiter.hit("a").await.unwrap();

        // A record exactly one window old is evicted.
        clock.set(1000);
        let outcome = limiter.check("a").await.unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.hits, 1);

        // One millisecond short of a window is not.
        clock.set(1999);
        let outcome = limiter.check("a").await.unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.hits, 2);
    }

    #[tokio::test]
    async fn test_check_reports_remaining() {
        let clock = ManualClock::new(0);
        let limiter = limiter(1000.0, 3, &clock);

        let outcome = limiter.check("a").await.unwrap();
        assert_eq!(outcome, HitOutcome::from_count(1, 3));
        assert_eq!(outcome.remaining, 2);
    }

    #[tokio::test]
    async fn test_empty_name_rejected_before_store() {
        let limiter =
            SlidingWindowRateLimiter::new(1000.0, 3, DownStore, KeySchema::default()).unwrap();

        let err = limiter.hit("").await.unwrap_err();
        assert!(matches!(err, LimiterError::InvalidSubject(_)));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let limiter =
            SlidingWindowRateLimiter::new(1000.0, 3, DownStore, KeySchema::default()).unwrap();

        let err = limiter.hit("a").await.unwrap_err();
        assert!(matches!(
            err,
            LimiterError::Store(StoreError::Unavailable(_))
        ));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_custom_key_scheme() {
        let clock = ManualClock::new(0);
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let keys = |name: &str, _window: f64, _max: u64| format!("flat:{}", name);
        let limiter =
            SlidingWindowRateLimiter::with_clock(1000.0, 2, store.clone(), keys, clock.clone())
                .unwrap();

        limiter.hit("a").await.unwrap();
        assert_eq!(limiter.subject_key("a"), "flat:a");
        assert_eq!(store.cardinality("flat:a").await.unwrap(), 1);
    }
}
