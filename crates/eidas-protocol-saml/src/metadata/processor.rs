//! Metadata lookup with a copy-on-write cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use eidas_core::{Clock, MetadataConfig};
use eidas_crypto::Certificate;

use super::{
    EntityDescriptor, Endpoint, FileMetadataRepository, HttpMetadataFetcher, IdpSsoDescriptor,
    MetadataFetcher, RoleDescriptor, SpSsoDescriptor,
};
use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::signature::MetadataSignatureVerifier;

/// Where a cached descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOrigin {
    /// Loaded from the static file repository.
    Static,
    /// Fetched over HTTP.
    Dynamic,
}

#[derive(Clone)]
struct CachedEntity {
    entity: Arc<EntityDescriptor>,
    document: Arc<str>,
    origin: MetadataOrigin,
}

/// Resolves partner metadata by URL.
///
/// Entries are never expired implicitly: a cached descriptor is served
/// until its `validUntil` passes, it is refreshed, or the cache is flushed.
pub struct MetadataProcessor {
    http_retrieval: bool,
    restrict_http: bool,
    check_signature: bool,
    trusted: Vec<String>,
    cache: ArcSwap<HashMap<String, CachedEntity>>,
    fetcher: Arc<dyn MetadataFetcher>,
    verifier: Option<Arc<dyn MetadataSignatureVerifier>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MetadataProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataProcessor")
            .field("http_retrieval", &self.http_retrieval)
            .field("restrict_http", &self.restrict_http)
            .field("check_signature", &self.check_signature)
            .field("cached", &self.cache.load().len())
            .finish_non_exhaustive()
    }
}

impl MetadataProcessor {
    /// Creates a processor with an explicit fetcher.
    ///
    /// Entries of the static repository, when configured, are loaded
    /// immediately and take precedence over HTTP retrieval.
    pub fn new(
        config: &MetadataConfig,
        fetcher: Arc<dyn MetadataFetcher>,
        verifier: Option<Arc<dyn MetadataSignatureVerifier>>,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let processor = Self {
            http_retrieval: config.http_retrieval,
            restrict_http: config.restrict_http,
            check_signature: config.check_signature,
            trusted: config.trusted_urls(),
            cache: ArcSwap::from_pointee(HashMap::new()),
            fetcher,
            verifier,
            clock,
        };
        if let Some(path) = &config.static_repository {
            processor.load_static(&FileMetadataRepository::new(path)?)?;
        }
        Ok(processor)
    }

    /// Creates a processor fetching over HTTP with the configured timeout.
    pub fn from_config(
        config: &MetadataConfig,
        verifier: Option<Arc<dyn MetadataSignatureVerifier>>,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let fetcher = HttpMetadataFetcher::new(Duration::from_millis(config.fetch_timeout_ms))?;
        Self::new(config, Arc::new(fetcher), verifier, clock)
    }

    /// Loads every entry of `repository` as static metadata.
    pub fn load_static(&self, repository: &FileMetadataRepository) -> SamlResult<usize> {
        let mut loaded = Vec::new();
        for id in repository.ids()? {
            let document = repository.read(&id)?;
            let entity = repository.entity(&id)?;
            loaded.push(CachedEntity {
                entity: Arc::new(entity),
                document: Arc::from(document),
                origin: MetadataOrigin::Static,
            });
        }
        let count = loaded.len();
        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            for cached in &loaded {
                next.insert(cached.entity.entity_id.clone(), cached.clone());
            }
            next
        });
        tracing::info!(
            count = count,
            repository = %repository.path().display(),
            "Loaded static metadata"
        );
        Ok(count)
    }

    /// Returns the descriptor published at `url`.
    ///
    /// An empty URL yields `None`. Expired cached entries are fetched again
    /// when HTTP retrieval is enabled.
    pub async fn entity_descriptor(&self, url: &str) -> SamlResult<Option<Arc<EntityDescriptor>>> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(None);
        }
        self.cached_or_fetch(url).await.map(|c| Some(c.entity))
    }

    /// Returns the role descriptor of type `R` published at `url`.
    pub async fn role_descriptor<R>(&self, url: &str) -> SamlResult<R>
    where
        R: RoleDescriptor + Clone,
    {
        let entity = self.require(url).await?;
        entity.role::<R>().cloned().ok_or_else(|| {
            SamlError::metadata(
                EidasErrorKey::SamlEngineInvalidMetadata,
                format!("metadata at {url} has no {}", R::ELEMENT),
            )
        })
    }

    /// Returns the service provider role published at `url`.
    pub async fn sp_descriptor(&self, url: &str) -> SamlResult<SpSsoDescriptor> {
        self.role_descriptor(url).await
    }

    /// Returns the identity provider role published at `url`.
    pub async fn idp_descriptor(&self, url: &str) -> SamlResult<IdpSsoDescriptor> {
        self.role_descriptor(url).await
    }

    /// Returns the SP type declared in the metadata at `url`.
    pub async fn sp_type(&self, url: &str) -> SamlResult<Option<String>> {
        Ok(self.require(url).await?.sp_type.clone())
    }

    /// Returns the default assertion consumer service of the SP at `url`.
    pub async fn assertion_consumer_service(&self, url: &str) -> SamlResult<Option<Endpoint>> {
        let sp = self.sp_descriptor(url).await?;
        Ok(sp.default_assertion_consumer_service().cloned())
    }

    /// Returns the signing certificates published at `url`.
    pub async fn signing_certificates(&self, url: &str) -> SamlResult<Vec<Certificate>> {
        Ok(self.require(url).await?.signing_certificates())
    }

    /// Returns the encryption certificate published at `url`, if any.
    pub async fn encryption_certificate(&self, url: &str) -> SamlResult<Option<Certificate>> {
        Ok(self.require(url).await?.encryption_certificate().cloned())
    }

    /// Checks the signature of the metadata published at `url`.
    ///
    /// Skipped when signature checking is disabled or the URL is trusted.
    pub async fn check_metadata_signature(&self, url: &str) -> SamlResult<()> {
        let url = url.trim();
        if !self.check_signature {
            tracing::warn!(url = %url, "Metadata signature check disabled; skipping");
            return Ok(());
        }
        if self.trusted.iter().any(|t| t == url) {
            tracing::debug!(url = %url, "Trusted metadata source; skipping signature check");
            return Ok(());
        }
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            SamlError::configuration("metadata signature checking needs a signature verifier")
        })?;
        let cached = self.cached_or_fetch(url).await?;
        verifier
            .verify_metadata_signature(&cached.document)
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "Metadata signature rejected");
                SamlError::metadata(
                    EidasErrorKey::SamlEngineInvalidMetadata,
                    format!("metadata signature at {url}: {e}"),
                )
            })
    }

    /// Fetches `url` again and replaces the cached entry.
    ///
    /// Static entries are left alone.
    pub async fn refresh(&self, url: &str) -> SamlResult<()> {
        let url = url.trim();
        if self.origin(url) == Some(MetadataOrigin::Static) {
            tracing::debug!(url = %url, "Static metadata is not refreshed");
            return Ok(());
        }
        self.fetch_and_cache(url).await.map(|_| ())
    }

    /// Drops every dynamically fetched entry.
    pub fn flush(&self) {
        self.cache.rcu(|current| {
            current
                .iter()
                .filter(|(_, c)| c.origin == MetadataOrigin::Static)
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect::<HashMap<_, _>>()
        });
        tracing::info!("Flushed dynamic metadata cache");
    }

    /// Lists cached URLs with their origin, sorted by URL.
    #[must_use]
    pub fn cached(&self) -> Vec<(String, MetadataOrigin)> {
        let mut entries: Vec<_> = self
            .cache
            .load()
            .iter()
            .map(|(url, c)| (url.clone(), c.origin))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Returns the origin of a cached entry.
    #[must_use]
    pub fn origin(&self, url: &str) -> Option<MetadataOrigin> {
        self.cache.load().get(url).map(|c| c.origin)
    }

    async fn require(&self, url: &str) -> SamlResult<Arc<EntityDescriptor>> {
        self.entity_descriptor(url).await?.ok_or_else(|| {
            SamlError::metadata(EidasErrorKey::SamlEngineNoMetadata, "no metadata URL")
        })
    }

    async fn cached_or_fetch(&self, url: &str) -> SamlResult<CachedEntity> {
        let now = self.clock.now();
        let cached = self.cache.load().get(url).cloned();
        match cached {
            Some(entry) if entry.entity.is_valid_at(now) => Ok(entry),
            Some(entry) if entry.origin == MetadataOrigin::Static || !self.http_retrieval => {
                Err(SamlError::metadata(
                    EidasErrorKey::SamlEngineInvalidMetadata,
                    format!("metadata for {url} expired"),
                ))
            }
            None if !self.http_retrieval => Err(SamlError::metadata(
                EidasErrorKey::SamlEngineNoMetadata,
                format!("no metadata for {url} and HTTP retrieval is disabled"),
            )),
            _ => self.fetch_and_cache(url).await,
        }
    }

    async fn fetch_and_cache(&self, url: &str) -> SamlResult<CachedEntity> {
        if self.restrict_http && !url.get(..8).is_some_and(|s| s.eq_ignore_ascii_case("https://")) {
            return Err(SamlError::metadata(
                EidasErrorKey::SamlEngineInvalidMetadataSource,
                format!("metadata URL {url} is not HTTPS"),
            ));
        }
        let document = self.fetcher.fetch(url).await?;
        let entity = EntityDescriptor::parse(&document)?;
        if !entity.is_valid_at(self.clock.now()) {
            return Err(SamlError::metadata(
                EidasErrorKey::SamlEngineInvalidMetadata,
                format!("metadata for {url} expired"),
            ));
        }
        let cached = CachedEntity {
            entity: Arc::new(entity),
            document: Arc::from(document),
            origin: MetadataOrigin::Dynamic,
        };
        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(url.to_string(), cached.clone());
            next
        });
        tracing::debug!(url = %url, entity_id = %cached.entity.entity_id, "Cached metadata");
        Ok(cached)
    }
}
