use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use linkhop_core::repository::Result;
use linkhop_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::trace;

/// In-memory implementation of the Repository trait using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking. Uniqueness of short codes is enforced with the
/// entry API, mirroring a unique index in a relational store.
#[derive(Debug)]
pub struct InMemoryRepository {
    storage: DashMap<String, UrlRecord>,
    next_id: AtomicI64,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self
            .storage
            .get(code.as_str())
            .map(|entry| entry.value().clone()))
    }

    async fn list_codes(&self) -> Result<Vec<ShortCode>> {
        Ok(self
            .storage
            .iter()
            .map(|entry| entry.value().short_code.clone())
            .collect())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, origin_url: &str, code: &ShortCode) -> Result<UrlRecord> {
        match self.storage.entry(code.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(code.to_string())),
            Entry::Vacant(slot) => {
                let record = UrlRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    origin_url: origin_url.to_owned(),
                    short_code: code.clone(),
                    created_at: Timestamp::now(),
                };
                slot.insert(record.clone());
                trace!(code = %code, id = record.id, "Stored URL record in memory");
                Ok(record)
            }
        }
    }

    async fn update_code(
        &self,
        code: &ShortCode,
        new_code: &ShortCode,
    ) -> Result<Option<UrlRecord>> {
        if code == new_code {
            return self.get(code).await;
        }

        let Some(mut record) = self.get(code).await? else {
            return Ok(None);
        };
        record.short_code = new_code.clone();

        // The new key is claimed before the old one is released, so a failed
        // move never vacates the old code.
        match self.storage.entry(new_code.as_str().to_owned()) {
            Entry::Occupied(_) => return Err(StorageError::Conflict(new_code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        let id = record.id;
        self.storage.remove_if(code.as_str(), |_, stored| stored.id == id);
        Ok(Some(record))
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.remove(code.as_str()).is_some())
    }
}
