//! Named distributed map lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use eidas_core::AntiReplayCacheConfig;

use crate::error::{CacheError, CacheResult};
use crate::memory::InMemoryMapProvider;
use crate::provider::ConcurrentMapProvider;

/// Hands out named maps. Every lookup of the same name returns the same map.
#[derive(Debug, Default)]
pub struct DistributedMapFactory {
    cluster_config: Option<PathBuf>,
    maps: DashMap<String, Arc<InMemoryMapProvider>>,
}

impl DistributedMapFactory {
    /// Creates a factory. A cluster configuration file, when given, must exist.
    pub fn new(cluster_config: Option<PathBuf>) -> CacheResult<Self> {
        if let Some(path) = cluster_config.as_deref() {
            if !path.is_file() {
                return Err(CacheError::Configuration(format!(
                    "cluster configuration file not found: {}",
                    path.display()
                )));
            }
            tracing::info!(path = %path.display(), "Using cluster configuration");
        }
        Ok(Self {
            cluster_config,
            maps: DashMap::new(),
        })
    }

    /// Returns the cluster configuration file, if any.
    #[must_use]
    pub fn cluster_config(&self) -> Option<&Path> {
        self.cluster_config.as_deref()
    }

    /// Returns the map with the given name, creating it on first use.
    pub fn get_map(&self, cache_name: Option<&str>) -> CacheResult<Arc<dyn ConcurrentMapProvider>> {
        let name = cache_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                CacheError::Configuration("Distributed Cache Configuration mismatch".to_string())
            })?;

        let map: Arc<dyn ConcurrentMapProvider> = self
            .maps
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(cache = %name, "Creating distributed map");
                Arc::new(InMemoryMapProvider::new(name))
            })
            .clone();
        Ok(map)
    }

    /// Builds the anti-replay map described by `config`.
    pub fn anti_replay_map(
        config: &AntiReplayCacheConfig,
    ) -> CacheResult<Arc<dyn ConcurrentMapProvider>> {
        let factory = Self::new(config.cluster_config.clone())?;
        factory.get_map(config.cache_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_same_map() {
        let factory = DistributedMapFactory::new(None).unwrap();
        let a = factory.get_map(Some("antiReplayCache")).unwrap();
        let b = factory.get_map(Some("antiReplayCache")).unwrap();

        a.put_if_absent("BE/_x", true).await.unwrap();
        assert_eq!(b.get("BE/_x").await.unwrap(), Some(true));
        assert_eq!(b.name(), "antiReplayCache");
    }

    #[test]
    fn missing_cache_name_is_mismatch() {
        let factory = DistributedMapFactory::new(None).unwrap();
        for name in [None, Some(""), Some("  ")] {
            let err = factory.get_map(name).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("Distributed Cache Configuration mismatch"));
        }
    }

    #[test]
    fn cluster_config_must_exist() {
        let err = DistributedMapFactory::new(Some(PathBuf::from("/nonexistent/cluster.xml")))
            .unwrap_err();
        assert!(err.is_configuration());

        let file = tempfile::NamedTempFile::new().unwrap();
        let factory = DistributedMapFactory::new(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(factory.cluster_config(), Some(file.path()));
    }

    #[test]
    fn anti_replay_map_from_config() {
        let config = AntiReplayCacheConfig::default();
        let map = DistributedMapFactory::anti_replay_map(&config).unwrap();
        assert_eq!(map.name(), "antiReplayCache");

        let config = AntiReplayCacheConfig {
            cache_name: None,
            cluster_config: None,
        };
        assert!(DistributedMapFactory::anti_replay_map(&config).is_err());
    }
}
