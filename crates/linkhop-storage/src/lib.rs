//! Durable store adapters for linkhop.

pub mod memory;
pub mod postgres;

pub use linkhop_core::{ReadRepository, Repository, StorageError, UrlRecord};
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
