//! Fast cache implementations for resolved URL records.

pub mod moka;
pub mod redis;

pub use self::moka::{CacheConfig, MokaUrlCache};
pub use self::redis::RedisUrlCache;
pub use linkhop_core::{CacheError, UrlCache};
