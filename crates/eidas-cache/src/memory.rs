//! In-process map provider.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::CacheResult;
use crate::provider::ConcurrentMapProvider;

/// A [`ConcurrentMapProvider`] backed by a [`DashMap`].
///
/// The entry API holds the shard lock across the check and the insert, so
/// `put_if_absent` is atomic across threads.
#[derive(Debug)]
pub struct InMemoryMapProvider {
    name: String,
    entries: DashMap<String, bool>,
}

impl InMemoryMapProvider {
    /// Creates an empty map.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl ConcurrentMapProvider for InMemoryMapProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_if_absent(&self, key: &str, value: bool) -> CacheResult<Option<bool>> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(existing) => Ok(Some(*existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(None)
            }
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<bool>> {
        Ok(self.entries.get(key).map(|v| *v))
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<bool>> {
        Ok(self.entries.remove(key).map(|(_, v)| v))
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.len())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }
}
