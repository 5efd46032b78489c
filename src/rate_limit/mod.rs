//! Rate limiting module
//!
//! This module provides a sliding-window rate limiter over an ordered
//! timestamp store:
//!
//! - **Limiter**: records every hit on a subject and rejects the subject once
//!   its trailing window holds more than `max_hits` hits
//! - **Stores**: an in-process store and a Redis sorted-set store, both
//!   applying each hit as one atomic batch
//! - **Keys**: one log per subject and policy, so limiters with different
//!   windows never share counts
//!
//! # Example
//!
//! ```rust,no_run
//! use sliding_limiter::rate_limit::{InMemoryStore, KeySchema, SlidingWindowRateLimiter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = SlidingWindowRateLimiter::new(
//!         1000.0,
//!         3,
//!         InMemoryStore::new(),
//!         KeySchema::default(),
//!     )
//!     .unwrap();
//!
//!     match limiter.hit("user1").await {
//!         Ok(()) => { /* proceed */ }
//!         Err(e) if e.is_rate_limited() => { /* answer 429 */ }
//!         Err(e) => eprintln!("limiter unavailable: {}", e),
//!     }
//!
//!     // Or back the limiter with Redis
//!     // let store = RedisStore::new("redis://localhost:6379").await.unwrap();
//! }
//! ```

pub mod clock;
pub mod key_schema;
pub mod limiter;
pub mod memory;
pub mod redis;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use key_schema::{KeySchema, SubjectKeys, DEFAULT_KEY_PREFIX};
pub use limiter::SlidingWindowRateLimiter;
pub use memory::InMemoryStore;
pub use self::redis::RedisStore;
pub use store::OrderedTimestampStore;
pub use types::{HitOutcome, ScoreBound, StoreOp, StoreReply};
