//! Configuration management for the eIDAS node.
//!
//! Supports loading configuration from a TOML file, with environment
//! variables selecting the file and forcing production mode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default XML-DSig signature algorithm.
pub const DEFAULT_SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

/// Default signature algorithm whitelist.
pub const DEFAULT_SIGNATURE_WHITELIST: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256;\
http://www.w3.org/2001/04/xmldsig-more#rsa-sha384;\
http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

/// Default XML-Enc data encryption algorithm.
pub const DEFAULT_DATA_ENCRYPTION_ALGORITHM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

/// Default XML-Enc key transport algorithm.
pub const DEFAULT_KEY_ENCRYPTION_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

/// Default encryption algorithm whitelist.
pub const DEFAULT_ENCRYPTION_WHITELIST: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm;\
http://www.w3.org/2009/xmlenc11#aes192-gcm;\
http://www.w3.org/2009/xmlenc11#aes256-gcm";

/// Default level of assurance ceiling.
pub const DEFAULT_MAX_LOA: &str = "http://eidas.europa.eu/LoA/high";

/// Default metadata fetch timeout in milliseconds.
pub const DEFAULT_METADATA_TIMEOUT_MS: u64 = 20_000;

/// Environment variable naming the configuration file.
pub const ENV_CONFIG_PATH: &str = "EIDAS_CONFIG_PATH";

/// Environment variable forcing production mode.
pub const ENV_PRODUCTION: &str = "EIDAS_PRODUCTION";

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Production mode. Forces the strict security settings on every instance.
    #[serde(default)]
    pub production: bool,
    /// Anti-replay cache settings.
    #[serde(default)]
    pub anti_replay: AntiReplayCacheConfig,
    /// Named engine instances.
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
}

/// Configuration of one named engine instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Core protocol properties.
    #[serde(default)]
    pub core: CoreProperties,
    /// Signature settings.
    #[serde(default)]
    pub signer: SignerConfig,
    /// Encryption settings.
    #[serde(default)]
    pub cipher: CipherConfig,
    /// Metadata settings.
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Core protocol properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreProperties {
    /// Message format: `eidas` or `stork1`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Entity ID (metadata URL) of this node, used as message issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Whether the HTTP method must match a declared ACS binding.
    #[serde(default)]
    pub validate_binding: bool,
    /// Highest level of assurance this node can deliver.
    #[serde(default = "default_max_loa")]
    pub max_loa: String,
    /// Hash attribute values with SHA-512 when generating attributes.
    #[serde(default)]
    pub hash_attribute_values: bool,
    /// Emit `FriendlyName` on requested attributes.
    #[serde(default = "default_true")]
    pub include_friendly_name: bool,
    /// Emit `isRequired` on requested attributes.
    #[serde(default = "default_true")]
    pub include_is_required: bool,
    /// Reject certificates outside their validity period.
    #[serde(default = "default_true")]
    pub check_certificate_validity_period: bool,
    /// Reject self-signed certificates.
    #[serde(default)]
    pub disallow_self_signed_certificate: bool,
    /// SPType published by this node when acting as a service provider.
    #[serde(default)]
    pub sp_type: Option<String>,
    /// Attribute name overrides, keyed by `<prefix>.<shortName>` or `<shortName>`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Signature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Signature algorithm URI.
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,
    /// Digest algorithm URI. Follows the signature hash when unset.
    #[serde(default)]
    pub digest_algorithm: Option<String>,
    /// Allowed signature algorithms, separated by `;` or `,`.
    #[serde(default = "default_signature_whitelist")]
    pub signature_algorithm_whitelist: String,
    /// Credential used to sign protocol messages.
    #[serde(default)]
    pub signing: Option<KeyReference>,
    /// Credential used to sign metadata.
    #[serde(default)]
    pub metadata_signing: Option<KeyReference>,
    /// Key material available to the signer.
    #[serde(default)]
    pub keystore: Vec<KeyStoreEntry>,
    /// Trusted certificates for signature validation.
    #[serde(default)]
    pub trust_store: Vec<PathBuf>,
}

/// Encryption configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherConfig {
    /// Data encryption algorithm URI.
    #[serde(default = "default_data_encryption_algorithm")]
    pub data_encryption_algorithm: String,
    /// Key transport algorithm URI.
    #[serde(default = "default_key_encryption_algorithm")]
    pub key_encryption_algorithm: String,
    /// Allowed data encryption algorithms, separated by `;` or `,`.
    #[serde(default = "default_encryption_whitelist")]
    pub encryption_algorithm_whitelist: String,
    /// Encrypt every response regardless of the per-country switches.
    #[serde(default)]
    pub response_encryption_mandatory: bool,
    /// Per-country encryption switches keyed by country code.
    #[serde(default)]
    pub encrypt_to: BTreeMap<String, bool>,
    /// Fallback encryption certificates keyed by country code.
    #[serde(default)]
    pub response_to_point: BTreeMap<String, KeyReference>,
    /// Default decryption credential.
    #[serde(default)]
    pub decryption: Option<KeyReference>,
    /// Key material available to the cipher.
    #[serde(default)]
    pub keystore: Vec<KeyStoreEntry>,
}

/// Metadata configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Whether a metadata processor is bound to the engine.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether metadata may be fetched over HTTP(S).
    #[serde(default = "default_true")]
    pub http_retrieval: bool,
    /// Only allow `https://` metadata URLs.
    #[serde(default)]
    pub restrict_http: bool,
    /// Validate metadata signatures.
    #[serde(default = "default_true")]
    pub check_signature: bool,
    /// Metadata URLs whose signature check is skipped, separated by `;`.
    #[serde(default)]
    pub trusted_entity_descriptors: String,
    /// Directory of statically provisioned metadata files.
    #[serde(default)]
    pub static_repository: Option<PathBuf>,
    /// HTTP fetch timeout in milliseconds.
    #[serde(default = "default_metadata_timeout")]
    pub fetch_timeout_ms: u64,
}

/// Anti-replay cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiReplayCacheConfig {
    /// Name of the distributed map.
    #[serde(default = "default_cache_name")]
    pub cache_name: Option<String>,
    /// Optional cluster configuration file for the distributed map.
    #[serde(default)]
    pub cluster_config: Option<PathBuf>,
}

/// Lookup of a keystore entry by certificate serial number and issuer DN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReference {
    /// Certificate serial number in hexadecimal.
    pub serial_number: String,
    /// Issuer distinguished name.
    pub issuer: String,
}

/// A certificate and optional private key, both PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreEntry {
    /// Entry alias.
    pub alias: String,
    /// Path to the PEM certificate.
    pub certificate: PathBuf,
    /// Path to the PEM (PKCS#8) private key.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
}

fn default_format() -> String {
    "eidas".to_string()
}

fn default_max_loa() -> String {
    DEFAULT_MAX_LOA.to_string()
}

const fn default_true() -> bool {
    true
}

fn default_signature_algorithm() -> String {
    DEFAULT_SIGNATURE_ALGORITHM.to_string()
}

fn default_signature_whitelist() -> String {
    DEFAULT_SIGNATURE_WHITELIST.to_string()
}

fn default_data_encryption_algorithm() -> String {
    DEFAULT_DATA_ENCRYPTION_ALGORITHM.to_string()
}

fn default_key_encryption_algorithm() -> String {
    DEFAULT_KEY_ENCRYPTION_ALGORITHM.to_string()
}

fn default_encryption_whitelist() -> String {
    DEFAULT_ENCRYPTION_WHITELIST.to_string()
}

const fn default_metadata_timeout() -> u64 {
    DEFAULT_METADATA_TIMEOUT_MS
}

#[allow(clippy::unnecessary_wraps)]
fn default_cache_name() -> Option<String> {
    Some("antiReplayCache".to_string())
}

impl Default for CoreProperties {
    fn default() -> Self {
        Self {
            format: default_format(),
            issuer: None,
            validate_binding: false,
            max_loa: default_max_loa(),
            hash_attribute_values: false,
            include_friendly_name: true,
            include_is_required: true,
            check_certificate_validity_period: true,
            disallow_self_signed_certificate: false,
            sp_type: None,
            attributes: BTreeMap::new(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            signature_algorithm: default_signature_algorithm(),
            digest_algorithm: None,
            signature_algorithm_whitelist: default_signature_whitelist(),
            signing: None,
            metadata_signing: None,
            keystore: Vec::new(),
            trust_store: Vec::new(),
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            data_encryption_algorithm: default_data_encryption_algorithm(),
            key_encryption_algorithm: default_key_encryption_algorithm(),
            encryption_algorithm_whitelist: default_encryption_whitelist(),
            response_encryption_mandatory: false,
            encrypt_to: BTreeMap::new(),
            response_to_point: BTreeMap::new(),
            decryption: None,
            keystore: Vec::new(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_retrieval: true,
            restrict_http: false,
            check_signature: true,
            trusted_entity_descriptors: String::new(),
            static_repository: None,
            fetch_timeout_ms: DEFAULT_METADATA_TIMEOUT_MS,
        }
    }
}

impl Default for AntiReplayCacheConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            cluster_config: None,
        }
    }
}

impl NodeConfig {
    /// Parses a configuration document.
    ///
    /// Production mode, when set in the document, is applied before returning.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(document)?;
        if config.production {
            config.apply_production_overrides();
        }
        Ok(config)
    }

    /// Loads a configuration file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        tracing::debug!(
            path = %path.display(),
            instances = config.instances.len(),
            production = config.production,
            "Loaded node configuration"
        );
        Ok(config)
    }

    /// Loads the file named by `EIDAS_CONFIG_PATH`.
    ///
    /// `EIDAS_PRODUCTION=true` forces production mode whatever the file says.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var(ENV_CONFIG_PATH)
            .map_err(|_| Error::Config(format!("{ENV_CONFIG_PATH} is not set")))?;
        let mut config = Self::load(Path::new(&path))?;

        let production = std::env::var(ENV_PRODUCTION)
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        if production {
            config.production = true;
            config.apply_production_overrides();
        }
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the named instance configuration.
    pub fn instance(&self, name: &str) -> Result<&InstanceConfig> {
        self.instances
            .get(name)
            .ok_or_else(|| Error::UnknownInstance(name.to_string()))
    }

    /// Forces the strict production settings on every instance.
    pub fn apply_production_overrides(&mut self) {
        for (name, instance) in &mut self.instances {
            instance.apply_production_overrides();
            tracing::info!(instance = %name, "Production settings applied");
        }
    }

    /// Resolves relative key, trust store and repository paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(cluster) = self.anti_replay.cluster_config.as_mut() {
            resolve(cluster, base);
        }
        for instance in self.instances.values_mut() {
            instance.resolve_paths(base);
        }
    }
}

impl InstanceConfig {
    /// Forces self-signed rejection, validity checks, metadata, binding
    /// validation, mandatory encryption and HTTPS-only metadata.
    pub fn apply_production_overrides(&mut self) {
        self.core.disallow_self_signed_certificate = true;
        self.core.check_certificate_validity_period = true;
        self.core.validate_binding = true;
        self.metadata.enabled = true;
        self.metadata.restrict_http = true;
        self.cipher.response_encryption_mandatory = true;
    }

    /// Applies per-engine override properties on top of this configuration.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "check_certificate_validity_period" => {
                    self.core.check_certificate_validity_period = parse_flag(key, value)?;
                }
                "disallow_self_signed_certificate" => {
                    self.core.disallow_self_signed_certificate = parse_flag(key, value)?;
                }
                "signature_algorithm" => self.signer.signature_algorithm.clone_from(value),
                "signature_algorithm_whitelist" => {
                    self.signer.signature_algorithm_whitelist.clone_from(value);
                }
                "metadata_check_signature" => {
                    self.metadata.check_signature = parse_flag(key, value)?;
                }
                "data_encryption_algorithm" => {
                    self.cipher.data_encryption_algorithm.clone_from(value);
                }
                "encryption_algorithm_whitelist" => {
                    self.cipher.encryption_algorithm_whitelist.clone_from(value);
                }
                "response_encryption_mandatory" => {
                    self.cipher.response_encryption_mandatory = parse_flag(key, value)?;
                }
                "metadata_enabled" => self.metadata.enabled = parse_flag(key, value)?,
                other => {
                    return Err(Error::Config(format!("unknown override property: {other}")));
                }
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for entry in self
            .signer
            .keystore
            .iter_mut()
            .chain(self.cipher.keystore.iter_mut())
        {
            resolve(&mut entry.certificate, base);
            if let Some(key) = entry.private_key.as_mut() {
                resolve(key, base);
            }
        }
        for cert in &mut self.signer.trust_store {
            resolve(cert, base);
        }
        if let Some(repo) = self.metadata.static_repository.as_mut() {
            resolve(repo, base);
        }
    }
}

impl MetadataConfig {
    /// Returns the trusted entity descriptor URLs.
    #[must_use]
    pub fn trusted_urls(&self) -> Vec<String> {
        self.trusted_entity_descriptors
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

fn resolve(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::Config(format!(
            "override {key} expects true or false, got {value}"
        ))),
    }
}
