//! Core types and traits for the linkhop URL shortener.
//!
//! This crate defines the capability contracts shared by the create path
//! and the resolution path: the durable store ([`Repository`]), the
//! membership filter ([`MembershipFilter`]) and the fast cache
//! ([`UrlCache`]). Concrete adapters live in their own crates.

pub mod cache;
pub mod context;
pub mod error;
pub mod filter;
pub mod repository;
pub mod shortcode;

pub use cache::UrlCache;
pub use context::{Canceled, RequestContext};
pub use error::{CacheError, CoreError, FilterError, StorageError};
pub use filter::MembershipFilter;
pub use repository::{ReadRepository, Repository, UrlRecord};
pub use shortcode::{ShortCode, MAX_LENGTH, MIN_LENGTH};
