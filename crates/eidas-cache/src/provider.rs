//! Distributed map provider trait.

use async_trait::async_trait;

use crate::error::CacheResult;

/// A named key to boolean map shared between worker threads and, in a
/// clustered deployment, between processes.
///
/// Implementations must make [`put_if_absent`](Self::put_if_absent) a single
/// atomic test-and-set: at most one caller may ever observe `None` for a key
/// until it is removed or the map is cleared.
#[async_trait]
pub trait ConcurrentMapProvider: Send + Sync + std::fmt::Debug {
    /// Returns the map name.
    fn name(&self) -> &str;

    /// Inserts `value` unless the key is present.
    ///
    /// Returns the previous value, or `None` if this call inserted it.
    async fn put_if_absent(&self, key: &str, value: bool) -> CacheResult<Option<bool>>;

    /// Gets a value.
    async fn get(&self, key: &str) -> CacheResult<Option<bool>>;

    /// Removes a key, returning its value.
    async fn remove(&self, key: &str) -> CacheResult<Option<bool>>;

    /// Returns the number of entries.
    async fn len(&self) -> CacheResult<usize>;

    /// Removes every entry.
    async fn clear(&self) -> CacheResult<()>;
}
