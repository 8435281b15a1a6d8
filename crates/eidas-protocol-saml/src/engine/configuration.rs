//! Access to the current node configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use eidas_core::{InstanceConfig, NodeConfig};

use crate::error::{SamlError, SamlResult};

/// Source of the node configuration engines are built from.
///
/// Engines hold on to an accessor, not to a configuration value, and
/// rebuild their components when the generation changes.
pub trait ConfigurationAccessor: Send + Sync + fmt::Debug {
    /// Returns the current configuration snapshot.
    fn current(&self) -> Arc<NodeConfig>;

    /// Returns a counter that changes whenever the configuration does.
    fn generation(&self) -> u64;

    /// Returns a copy of the named instance's configuration.
    fn instance(&self, name: &str) -> SamlResult<InstanceConfig> {
        Ok(self.current().instance(name)?.clone())
    }
}

/// Configuration that can be swapped at runtime.
#[derive(Debug)]
pub struct ReloadableConfiguration {
    current: ArcSwap<NodeConfig>,
    generation: AtomicU64,
    source: Option<PathBuf>,
}

impl ReloadableConfiguration {
    /// Wraps a configuration value.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(prepared(config)),
            generation: AtomicU64::new(0),
            source: None,
        }
    }

    /// Loads a configuration file that [`reload_from_source`](Self::reload_from_source)
    /// reads again later.
    pub fn from_file(path: impl Into<PathBuf>) -> SamlResult<Self> {
        let path = path.into();
        let config = load(&path)?;
        Ok(Self {
            source: Some(path),
            ..Self::new(config)
        })
    }

    /// Loads the file named by `EIDAS_CONFIG_PATH`, honouring `EIDAS_PRODUCTION`.
    pub fn from_env() -> SamlResult<Self> {
        let source = std::env::var(eidas_core::config::ENV_CONFIG_PATH)
            .ok()
            .map(PathBuf::from);
        Ok(Self {
            source,
            ..Self::new(NodeConfig::from_env()?)
        })
    }

    /// Returns the file this configuration was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Replaces the configuration. Engines pick the change up on their
    /// next operation.
    pub fn reload(&self, config: NodeConfig) {
        self.current.store(Arc::new(prepared(config)));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(generation, "Configuration reloaded");
    }

    /// Reads the source file again and swaps it in.
    ///
    /// The current configuration is kept when the file cannot be loaded.
    pub fn reload_from_source(&self) -> SamlResult<()> {
        let path = self
            .source
            .as_deref()
            .ok_or_else(|| SamlError::configuration("configuration has no source file"))?;
        let mut config = load(path)?;
        if self.current.load().production {
            config.production = true;
        }
        self.reload(config);
        Ok(())
    }
}

impl ConfigurationAccessor for ReloadableConfiguration {
    fn current(&self) -> Arc<NodeConfig> {
        self.current.load_full()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

fn load(path: &Path) -> SamlResult<NodeConfig> {
    NodeConfig::load(path).map_err(|e| {
        SamlError::configuration(format!("cannot load {}: {e}", path.display()))
    })
}

fn prepared(mut config: NodeConfig) -> NodeConfig {
    if config.production {
        config.apply_production_overrides();
    }
    config
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn node(whitelist: &str) -> NodeConfig {
        let mut instance = InstanceConfig::default();
        instance.signer.signature_algorithm_whitelist = whitelist.to_string();
        NodeConfig {
            instances: BTreeMap::from([("CPEPS".to_string(), instance)]),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn reload_swaps_snapshot_and_bumps_generation() {
        let configuration = ReloadableConfiguration::new(node("a"));
        let before = configuration.current();
        assert_eq!(configuration.generation(), 0);

        configuration.reload(node("b"));
        assert_eq!(configuration.generation(), 1);
        assert_eq!(
            configuration.instance("CPEPS").unwrap().signer.signature_algorithm_whitelist,
            "b"
        );
        // Snapshots taken earlier are unchanged.
        assert_eq!(
            before.instances["CPEPS"].signer.signature_algorithm_whitelist,
            "a"
        );
    }

    #[test]
    fn unknown_instance() {
        let configuration = ReloadableConfiguration::new(node("a"));
        let err = configuration.instance("SP-SPEPS").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration instance SP-SPEPS does not exist");
    }

    #[test]
    fn production_is_applied() {
        let mut config = node("a");
        config.production = true;
        let configuration = ReloadableConfiguration::new(config);
        let instance = configuration.instance("CPEPS").unwrap();
        assert!(instance.core.disallow_self_signed_certificate);
        assert!(instance.cipher.response_encryption_mandatory);
        assert!(instance.metadata.restrict_http);
    }

    #[test]
    fn reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eidas.toml");
        std::fs::write(&path, "[instances.CPEPS.core]\nvalidate_binding = false\n").unwrap();

        let configuration = ReloadableConfiguration::from_file(&path).unwrap();
        assert_eq!(configuration.source(), Some(path.as_path()));
        assert!(!configuration.instance("CPEPS").unwrap().core.validate_binding);

        std::fs::write(&path, "[instances.CPEPS.core]\nvalidate_binding = true\n").unwrap();
        configuration.reload_from_source().unwrap();
        assert!(configuration.instance("CPEPS").unwrap().core.validate_binding);
        assert_eq!(configuration.generation(), 1);

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(configuration.reload_from_source().unwrap_err().is_configuration());
        assert!(configuration.instance("CPEPS").unwrap().core.validate_binding);

        assert!(ReloadableConfiguration::new(NodeConfig::default())
            .reload_from_source()
            .is_err());
    }
}
