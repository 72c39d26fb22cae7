//! Redis-backed log.
//!
//! Each logical path is stored as a hash of serialized entries, a sorted set
//! used as a lexicographic key index, and a pub/sub channel carrying change
//! events to tail subscribers on every instance.

mod keys;
mod redis_log;
mod tail;

pub use keys::RedisKeys;
pub use redis_log::RedisLog;
