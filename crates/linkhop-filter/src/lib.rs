//! Membership filter implementations.
//!
//! A membership filter answers "could this short code exist?" without a
//! store round trip. [`BloomMembershipFilter`] keeps the filter in process;
//! [`RedisBloomFilter`] shares one filter across every instance through the
//! RedisBloom module, which makes reservations atomic across processes.

pub mod bloom;
pub mod redis;

pub use self::redis::RedisBloomFilter;
pub use bloom::{BloomFilterConfig, BloomMembershipFilter};
pub use linkhop_core::{FilterError, MembershipFilter};
