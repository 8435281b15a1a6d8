//! Replay detection over the distributed anti-replay map.

use std::sync::Arc;

use eidas_cache::{ConcurrentMapProvider, DistributedMapFactory};
use eidas_core::AntiReplayCacheConfig;

use crate::error::{SamlError, SamlResult};

/// Rejects SAML message IDs seen before for the same country.
#[derive(Debug, Clone)]
pub struct AntiReplayGuard {
    cache: Option<Arc<dyn ConcurrentMapProvider>>,
}

impl AntiReplayGuard {
    /// Creates a guard over `cache`.
    ///
    /// A guard without a cache fails every check with a configuration error.
    #[must_use]
    pub fn new(cache: Option<Arc<dyn ConcurrentMapProvider>>) -> Self {
        Self { cache }
    }

    /// Creates a guard over the map described by `config`.
    pub fn from_config(config: &AntiReplayCacheConfig) -> SamlResult<Self> {
        let cache = DistributedMapFactory::anti_replay_map(config)?;
        Ok(Self::new(Some(cache)))
    }

    /// Returns true when `message_id` has not been seen for `country`.
    ///
    /// The first call for a pair records it; every later call returns false
    /// and logs a security warning. A missing ID is never recorded.
    pub async fn check_not_present_in_cache(
        &self,
        message_id: Option<&str>,
        country: &str,
    ) -> SamlResult<bool> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            SamlError::configuration("anti-replay cache is not configured")
        })?;
        let Some(message_id) = message_id else {
            return Ok(true);
        };

        let key = replay_key(country, message_id);
        match cache.put_if_absent(&key, true).await? {
            None => {
                tracing::debug!(key = %key, "SAML message ID recorded");
                Ok(true)
            }
            Some(_) => {
                tracing::warn!(
                    target: "eidas::security",
                    message_id = %message_id,
                    country = %country,
                    cache = %cache.name(),
                    "Replay attack: SAML message ID already processed"
                );
                Ok(false)
            }
        }
    }

    /// Forgets every recorded message ID.
    pub async fn flush(&self) -> SamlResult<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
        }
        Ok(())
    }
}

fn replay_key(country: &str, message_id: &str) -> String {
    format!("{country}/{message_id}")
}
