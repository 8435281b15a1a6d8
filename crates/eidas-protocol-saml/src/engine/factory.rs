//! Registry of live protocol engines.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use eidas_core::Clock;

use super::protocol::EngineParts;
use super::{ConfigurationAccessor, ProtocolEngine};
use crate::error::SamlResult;
use crate::metadata::MetadataFetcher;
use crate::validation::AntiReplayGuard;

/// Builds engines by instance name and keeps them for reuse.
///
/// Engines are keyed by instance name plus override properties, so two
/// callers asking for the same combination share one engine. The factory
/// counts engines handed out and not yet released.
pub struct EngineFactory {
    configuration: Arc<dyn ConfigurationAccessor>,
    clock: Arc<dyn Clock>,
    fetcher: Option<Arc<dyn MetadataFetcher>>,
    anti_replay: AntiReplayGuard,
    engines: DashMap<String, Arc<ProtocolEngine>>,
    active: AtomicUsize,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineFactory")
            .field("engines", &self.engines.len())
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl EngineFactory {
    /// Creates a factory over `configuration`.
    ///
    /// The anti-replay cache shared by every engine is created here, so a
    /// missing cache name fails immediately.
    pub fn new(
        configuration: Arc<dyn ConfigurationAccessor>,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let anti_replay = AntiReplayGuard::from_config(&configuration.current().anti_replay)?;
        Ok(Self {
            configuration,
            clock,
            fetcher: None,
            anti_replay,
            engines: DashMap::new(),
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        })
    }

    /// Uses `fetcher` for remote metadata instead of the HTTP client.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Returns the configuration the engines read.
    #[must_use]
    pub fn configuration(&self) -> &Arc<dyn ConfigurationAccessor> {
        &self.configuration
    }

    /// Returns the anti-replay guard shared by every engine.
    #[must_use]
    pub const fn anti_replay(&self) -> &AntiReplayGuard {
        &self.anti_replay
    }

    /// Returns the engine for `name` with `overrides` applied, building it
    /// on first use.
    ///
    /// Construction failures are configuration errors and nothing is
    /// registered for them.
    pub fn get_engine(
        &self,
        name: &str,
        overrides: &BTreeMap<String, String>,
    ) -> SamlResult<Arc<ProtocolEngine>> {
        let key = registry_key(name, overrides);
        let existing = self.engines.get(&key).map(|e| Arc::clone(e.value()));
        let engine = match existing {
            Some(engine) => engine,
            None => {
                let built = Arc::new(ProtocolEngine::build(EngineParts {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    name: name.to_string(),
                    overrides: overrides.clone(),
                    configuration: Arc::clone(&self.configuration),
                    clock: Arc::clone(&self.clock),
                    fetcher: self.fetcher.clone(),
                    anti_replay: self.anti_replay.clone(),
                })?);
                // Another caller may have registered the same key meanwhile.
                Arc::clone(self.engines.entry(key).or_insert(built).value())
            }
        };
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(engine = %name, id = engine.id(), active, "Engine acquired");
        Ok(engine)
    }

    /// Returns an engine obtained from [`get_engine`](Self::get_engine).
    ///
    /// The engine stays registered for reuse; only the count changes.
    pub fn release_engine(&self, engine: &ProtocolEngine) {
        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or_default();
        if previous == 0 {
            tracing::warn!(engine = %engine.name(), "Engine released more often than acquired");
        } else {
            tracing::debug!(engine = %engine.name(), id = engine.id(), active = previous - 1, "Engine released");
        }
    }

    /// Number of engines acquired and not yet released.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Registry keys of the engines built so far, sorted.
    #[must_use]
    pub fn engine_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

fn registry_key(name: &str, overrides: &BTreeMap<String, String>) -> String {
    let mut key = name.to_string();
    for (index, (property, value)) in overrides.iter().enumerate() {
        let separator = if index == 0 { '?' } else { '&' };
        let _ = write!(key, "{separator}{property}={value}");
    }
    key
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use eidas_core::{InstanceConfig, KeyReference, KeyStoreEntry, NodeConfig, SystemClock};

    use super::*;
    use crate::engine::ReloadableConfiguration;
    use crate::types::signature_algorithms;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata")
            .join(name)
    }

    fn node(whitelist: &str) -> NodeConfig {
        let mut instance = InstanceConfig::default();
        instance.core.issuer = Some("https://node.example.be/metadata".to_string());
        instance.signer.signature_algorithm_whitelist = whitelist.to_string();
        instance.signer.signing = Some(KeyReference {
            serial_number: "1001".to_string(),
            issuer: "C=EU, O=eIDAS Test, CN=eIDAS Test CA".to_string(),
        });
        instance.signer.keystore = vec![KeyStoreEntry {
            alias: "node".to_string(),
            certificate: testdata("node.pem"),
            private_key: Some(testdata("node.key")),
        }];
        instance.signer.trust_store = vec![testdata("ca.pem")];
        instance.metadata.enabled = false;
        NodeConfig {
            instances: BTreeMap::from([
                ("CPEPS".to_string(), instance.clone()),
                ("SP-SPEPS".to_string(), instance),
            ]),
            ..NodeConfig::default()
        }
    }

    fn factory(configuration: Arc<ReloadableConfiguration>) -> EngineFactory {
        EngineFactory::new(configuration, Arc::new(SystemClock)).unwrap()
    }

    #[test]
    fn engines_are_reused_per_key() {
        let factory = factory(Arc::new(ReloadableConfiguration::new(node(
            signature_algorithms::RSA_SHA512,
        ))));
        let none = BTreeMap::new();
        let strict = BTreeMap::from([(
            "response_encryption_mandatory".to_string(),
            "true".to_string(),
        )]);

        let a = factory.get_engine("CPEPS", &none).unwrap();
        let b = factory.get_engine("CPEPS", &none).unwrap();
        let c = factory.get_engine("CPEPS", &strict).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.components().unwrap().encryption().is_mandatory());
        assert_eq!(factory.active_count(), 3);
        assert_eq!(
            factory.engine_keys(),
            vec![
                "CPEPS".to_string(),
                "CPEPS?response_encryption_mandatory=true".to_string()
            ]
        );

        for engine in [&a, &b, &c] {
            factory.release_engine(engine);
        }
        assert_eq!(factory.active_count(), 0);
        factory.release_engine(&a);
        assert_eq!(factory.active_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_acquire_and_release() {
        let factory = Arc::new(factory(Arc::new(ReloadableConfiguration::new(node(
            signature_algorithms::RSA_SHA512,
        )))));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let factory = Arc::clone(&factory);
            tasks.push(tokio::spawn(async move {
                let name = if i % 2 == 0 { "CPEPS" } else { "SP-SPEPS" };
                for _ in 0..20 {
                    let engine = factory.get_engine(name, &BTreeMap::new()).unwrap();
                    tokio::task::yield_now().await;
                    factory.release_engine(&engine);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(factory.active_count(), 0);
        assert_eq!(factory.engine_keys().len(), 2);
    }

    #[test]
    fn unknown_instance_and_bad_overrides() {
        let factory = factory(Arc::new(ReloadableConfiguration::new(node(
            signature_algorithms::RSA_SHA512,
        ))));
        let err = factory.get_engine("IdP", &BTreeMap::new()).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration instance IdP does not exist");

        for (key, value) in [("metadata_enabled", "maybe"), ("colour", "blue")] {
            let overrides = BTreeMap::from([(key.to_string(), value.to_string())]);
            assert!(factory.get_engine("CPEPS", &overrides).unwrap_err().is_configuration());
        }
        assert_eq!(factory.active_count(), 0);
        assert!(factory.engine_keys().is_empty());
    }

    #[test]
    fn reload_reaches_existing_engines() {
        let configuration = Arc::new(ReloadableConfiguration::new(node(
            signature_algorithms::RSA_SHA512,
        )));
        let factory = factory(Arc::clone(&configuration));
        let engine = factory.get_engine("CPEPS", &BTreeMap::new()).unwrap();
        assert!(engine
            .components()
            .unwrap()
            .signature()
            .whitelist()
            .contains(signature_algorithms::RSA_SHA512));

        configuration.reload(node(signature_algorithms::RSA_SHA256));
        let whitelist = engine.components().unwrap().signature().whitelist().clone();
        assert!(whitelist.contains(signature_algorithms::RSA_SHA256));
        assert!(!whitelist.contains(signature_algorithms::RSA_SHA512));
    }

    #[test]
    fn missing_anti_replay_cache_name() {
        let mut config = node(signature_algorithms::RSA_SHA512);
        config.anti_replay.cache_name = None;
        let err = EngineFactory::new(
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(SystemClock),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn registry_keys_sort_overrides() {
        let overrides = BTreeMap::from([
            ("metadata_enabled".to_string(), "false".to_string()),
            ("disallow_self_signed_certificate".to_string(), "true".to_string()),
        ]);
        assert_eq!(
            registry_key("CPEPS", &overrides),
            "CPEPS?disallow_self_signed_certificate=true&metadata_enabled=false"
        );
    }
}
