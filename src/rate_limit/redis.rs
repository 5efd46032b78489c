use super::store::OrderedTimestampStore;
use super::types::{StoreOp, StoreReply};
use crate::error::StoreError;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Value};
use tracing::{info, trace};

/// Redis-backed ordered timestamp store.
///
/// Each log is a sorted set. A batch is sent as one `MULTI`/`EXEC`
/// transaction, so Redis applies it without interleaving other clients.
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `redis_url`
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis store");

        Ok(Self { connection })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut connection)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderedTimestampStore for RedisStore {
    async fn execute_atomic(
        &self,
        key: &str,
        ops: Vec<StoreOp>,
    ) -> Result<Vec<StoreReply>, StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in &ops {
            match op {
                StoreOp::InsertScored { member, score } => {
                    pipe.zadd(key, member, *score);
                }
                StoreOp::RemoveScoreRange { min, max } => {
                    pipe.zrembyscore(key, min.to_string(), max.to_string());
                }
                StoreOp::Cardinality => {
                    pipe.zcard(key);
                }
                StoreOp::ExpireAfter { ttl_ms } => {
                    pipe.pexpire(key, i64::try_from(*ttl_ms).unwrap_or(i64::MAX));
                }
            }
        }

        trace!("Submitting {} ops for key {} as one transaction", ops.len(), key);

        let mut connection = self.connection.clone();
        let values: Vec<Value> = pipe.query_async(&mut connection).await?;

        if values.len() != ops.len() {
            return Err(StoreError::UnexpectedReply(format!(
                "sent {} ops, got {} replies",
                ops.len(),
                values.len()
            )));
        }

        ops.iter()
            .zip(values.iter())
            .map(|(op, value)| decode_reply(op, value))
            .collect()
    }
}

fn decode_reply(op: &StoreOp, value: &Value) -> Result<StoreReply, StoreError> {
    let n: i64 = redis::from_redis_value(value)?;
    let n = u64::try_from(n)
        .map_err(|_| StoreError::UnexpectedReply(format!("negative reply {} to {:?}", n, op)))?;

    Ok(match op {
        StoreOp::InsertScored { .. } => StoreReply::Inserted(n),
        StoreOp::RemoveScoreRange { .. } => StoreReply::Removed(n),
        StoreOp::Cardinality => StoreReply::Cardinality(n),
        StoreOp::ExpireAfter { .. } => StoreReply::ExpirySet(n == 1),
    })
}
