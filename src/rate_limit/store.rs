//! Ordered timestamp store abstraction.

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{ScoreBound, StoreOp, StoreReply};
use crate::error::StoreError;

/// A key-value store holding one score-ordered log per key.
///
/// The only required operation is [`execute_atomic`](Self::execute_atomic):
/// every op of a batch is applied to `key` with no other batch on the same key
/// interleaved, and replies come back in the order the ops were given. Batches
/// on different keys must not wait on each other.
#[async_trait]
pub trait OrderedTimestampStore: Send + Sync {
    /// Apply `ops` to the log under `key` as one indivisible unit.
    async fn execute_atomic(
        &self,
        key: &str,
        ops: Vec<StoreOp>,
    ) -> Result<Vec<StoreReply>, StoreError>;

    /// Add one member with a numeric score.
    async fn insert_scored(&self, key: &str, member: &str, score: i64) -> Result<u64, StoreError> {
        let op = StoreOp::InsertScored {
            member: member.to_string(),
            score,
        };
        match single_reply(self.execute_atomic(key, vec![op]).await?)? {
            StoreReply::Inserted(n) => Ok(n),
            other => Err(unexpected("Inserted", other)),
        }
    }

    /// Remove every member whose score lies in `[min, max]`.
    async fn remove_score_range(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<u64, StoreError> {
        let op = StoreOp::RemoveScoreRange { min, max };
        match single_reply(self.execute_atomic(key, vec![op]).await?)? {
            StoreReply::Removed(n) => Ok(n),
            other => Err(unexpected("Removed", other)),
        }
    }

    /// Count the members stored under `key`.
    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        match single_reply(self.execute_atomic(key, vec![StoreOp::Cardinality]).await?)? {
            StoreReply::Cardinality(n) => Ok(n),
            other => Err(unexpected("Cardinality", other)),
        }
    }
}

#[async_trait]
impl<T: OrderedTimestampStore + ?Sized> OrderedTimestampStore for Arc<T> {
    async fn execute_atomic(
        &self,
        key: &str,
        ops: Vec<StoreOp>,
    ) -> Result<Vec<StoreReply>, StoreError> {
        (**self).execute_atomic(key, ops).await
    }
}

fn single_reply(replies: Vec<StoreReply>) -> Result<StoreReply, StoreError> {
    let count = replies.len();
    match replies.into_iter().next() {
        Some(reply) if count == 1 => Ok(reply),
        _ => Err(StoreError::UnexpectedReply(format!(
            "expected 1 reply, got {}",
            count
        ))),
    }
}

pub(crate) fn unexpected(expected: &str, got: StoreReply) -> StoreError {
    StoreError::UnexpectedReply(format!("expected {}, got {:?}", expected, got))
}
