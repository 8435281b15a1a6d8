//! Common test utilities and fixtures.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use eidas_core::{InstanceConfig, KeyReference, KeyStoreEntry, NodeConfig, SystemClock};
use eidas_protocol_saml::metadata::MetadataFetcher;
use eidas_protocol_saml::{
    AuthnRequest, EidasErrorKey, EngineFactory, LevelOfAssurance, LoaComparison, ProtocolEngine,
    ReloadableConfiguration, RequestedAttribute, SamlBinding, SamlError, SamlResult,
};
use parking_lot::RwLock;

pub const SP_URL: &str = "https://sp.example.es/metadata";
pub const NODE_URL: &str = "https://node.example.be/metadata";
pub const SP_ACS: &str = "https://sp.example.es/acs";
pub const NODE_SSO: &str = "https://node.example.be/ColleagueRequest";
pub const PERSON_ID: &str = "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier";

const CA_DN: &str = "C=EU, O=eIDAS Test, CN=eIDAS Test CA";

/// Serves metadata documents published after the engines are built.
#[derive(Debug, Default)]
pub struct LoopbackFetcher {
    documents: RwLock<HashMap<String, String>>,
}

impl LoopbackFetcher {
    pub fn publish(&self, url: &str, document: String) {
        self.documents.write().insert(url.to_string(), document);
    }

    pub fn document(&self, url: &str) -> Option<String> {
        self.documents.read().get(url).cloned()
    }
}

#[async_trait]
impl MetadataFetcher for LoopbackFetcher {
    async fn fetch(&self, url: &str) -> SamlResult<String> {
        self.documents.read().get(url).cloned().ok_or_else(|| {
            SamlError::metadata(EidasErrorKey::SamlEngineNoMetadata, url.to_string())
        })
    }
}

/// A service provider engine and a node engine sharing one factory.
pub struct Loopback {
    pub factory: EngineFactory,
    pub fetcher: Arc<LoopbackFetcher>,
    pub sp: Arc<ProtocolEngine>,
    pub node: Arc<ProtocolEngine>,
}

impl Loopback {
    /// Builds both engines and publishes their metadata.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(node_config())
    }

    pub fn with_config(config: NodeConfig) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("eidas_protocol_saml=debug")
            .with_test_writer()
            .try_init();

        let fetcher = Arc::new(LoopbackFetcher::default());
        let factory = EngineFactory::new(
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(SystemClock),
        )?
        .with_fetcher(fetcher.clone());

        let sp = factory.get_engine("SP", &BTreeMap::new())?;
        let node = factory.get_engine("CPEPS", &BTreeMap::new())?;

        let sp_metadata = sp
            .metadata_generator()?
            .with_assertion_consumer_service(SamlBinding::HttpPost, SP_ACS);
        fetcher.publish(SP_URL, sp.generate_metadata(&sp_metadata)?);
        let node_metadata = node
            .metadata_generator()?
            .with_single_sign_on_service(SamlBinding::HttpPost, NODE_SSO);
        fetcher.publish(NODE_URL, node.generate_metadata(&node_metadata)?);

        Ok(Self {
            factory,
            fetcher,
            sp,
            node,
        })
    }
}

pub fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(name)
}

pub fn entry(alias: &str) -> KeyStoreEntry {
    KeyStoreEntry {
        alias: alias.to_string(),
        certificate: testdata(&format!("{alias}.pem")),
        private_key: Some(testdata(&format!("{alias}.key"))),
    }
}

fn reference(serial: &str) -> KeyReference {
    KeyReference {
        serial_number: serial.to_string(),
        issuer: CA_DN.to_string(),
    }
}

/// Service provider: signs with the node key, decrypts with the partner key.
pub fn sp_instance() -> InstanceConfig {
    let mut instance = InstanceConfig::default();
    instance.core.issuer = Some(SP_URL.to_string());
    instance.core.sp_type = Some("public".to_string());
    instance.signer.signing = Some(reference("1001"));
    instance.signer.keystore = vec![entry("node")];
    instance.signer.trust_store = vec![testdata("ca.pem")];
    instance.cipher.keystore = vec![entry("partner")];
    instance.cipher.decryption = Some(reference("1002"));
    instance
}

/// Node: encrypts responses for Spain to the certificate in SP metadata.
pub fn node_instance() -> InstanceConfig {
    let mut instance = InstanceConfig::default();
    instance.core.issuer = Some(NODE_URL.to_string());
    instance.signer.signing = Some(reference("1001"));
    instance.signer.keystore = vec![entry("node")];
    instance.signer.trust_store = vec![testdata("ca.pem")];
    instance.cipher.encrypt_to.insert("ES".to_string(), true);
    instance
}

pub fn node_config() -> NodeConfig {
    NodeConfig {
        instances: BTreeMap::from([
            ("SP".to_string(), sp_instance()),
            ("CPEPS".to_string(), node_instance()),
        ]),
        ..NodeConfig::default()
    }
}

/// A request from the service provider for a Belgian citizen.
pub fn authn_request(id: &str) -> AuthnRequest {
    AuthnRequest::with_id(id, SP_URL)
        .with_destination(NODE_SSO)
        .with_acs_url(SP_ACS)
        .with_citizen_country("BE")
        .with_loa(LevelOfAssurance::Substantial, LoaComparison::Minimum)
        .with_attribute(RequestedAttribute::new("PersonIdentifier", true))
}
