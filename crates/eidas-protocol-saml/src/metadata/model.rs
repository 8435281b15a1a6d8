//! Partner metadata model.

use chrono::{DateTime, Utc};
use eidas_crypto::Certificate;

use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::extensions::parse_instant;
use crate::types::{eidas, SamlBinding, MDATTR_NS, MD_NS, SAML_NS, XMLDSIG_NS};
use crate::xml::{self, XmlElement};

/// Declared use of a key descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUse {
    /// Signing only.
    Signing,
    /// Encryption only.
    Encryption,
    /// No `use` attribute: both.
    Unspecified,
}

impl KeyUse {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("signing") => Self::Signing,
            Some("encryption") => Self::Encryption,
            _ => Self::Unspecified,
        }
    }

    const fn signs(self) -> bool {
        matches!(self, Self::Signing | Self::Unspecified)
    }

    const fn encrypts(self) -> bool {
        matches!(self, Self::Encryption | Self::Unspecified)
    }
}

/// A certificate published in metadata.
#[derive(Debug, Clone)]
pub struct KeyDescriptor {
    /// Declared use.
    pub key_use: KeyUse,
    /// Certificate.
    pub certificate: Certificate,
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Binding URI.
    pub binding: String,
    /// Endpoint URL.
    pub location: String,
    /// `index` attribute, for indexed endpoints.
    pub index: Option<u32>,
    /// `isDefault` attribute.
    pub is_default: bool,
}

impl Endpoint {
    /// Returns the HTTP method messages use on this endpoint.
    #[must_use]
    pub fn http_method(&self) -> &'static str {
        crate::types::binding_http_method(&self.binding)
    }

    fn parse(element: &XmlElement) -> Option<Self> {
        Some(Self {
            binding: element.attr("Binding")?.trim().to_string(),
            location: element.attr("Location")?.trim().to_string(),
            index: element.attr("index").and_then(|i| i.trim().parse().ok()),
            is_default: element
                .attr("isDefault")
                .is_some_and(|d| d.trim().eq_ignore_ascii_case("true")),
        })
    }
}

/// Service provider role.
#[derive(Debug, Clone, Default)]
pub struct SpSsoDescriptor {
    /// Published keys.
    pub key_descriptors: Vec<KeyDescriptor>,
    /// Assertion consumer services, in document order.
    pub assertion_consumer_services: Vec<Endpoint>,
    /// Supported name ID formats.
    pub name_id_formats: Vec<String>,
    /// `AuthnRequestsSigned` attribute.
    pub authn_requests_signed: bool,
    /// `WantAssertionsSigned` attribute.
    pub want_assertions_signed: bool,
}

impl SpSsoDescriptor {
    /// Returns the assertion consumer service requests are answered on.
    ///
    /// The last entry marked default wins; without one, the first entry.
    #[must_use]
    pub fn default_assertion_consumer_service(&self) -> Option<&Endpoint> {
        self.assertion_consumer_services
            .iter()
            .rev()
            .find(|e| e.is_default)
            .or_else(|| self.assertion_consumer_services.first())
    }
}

/// Identity provider role.
#[derive(Debug, Clone, Default)]
pub struct IdpSsoDescriptor {
    /// Published keys.
    pub key_descriptors: Vec<KeyDescriptor>,
    /// Single sign-on services, in document order.
    pub single_sign_on_services: Vec<Endpoint>,
    /// Supported name ID formats.
    pub name_id_formats: Vec<String>,
    /// `WantAuthnRequestsSigned` attribute.
    pub want_authn_requests_signed: bool,
}

/// Role descriptors that can be looked up by type.
pub trait RoleDescriptor: Sized {
    /// Element local name.
    const ELEMENT: &'static str;

    /// Returns this role from an entity descriptor, if present.
    fn of(entity: &EntityDescriptor) -> Option<&Self>;

    /// Returns the published keys.
    fn key_descriptors(&self) -> &[KeyDescriptor];
}

impl RoleDescriptor for SpSsoDescriptor {
    const ELEMENT: &'static str = "SPSSODescriptor";

    fn of(entity: &EntityDescriptor) -> Option<&Self> {
        entity.sp.as_ref()
    }

    fn key_descriptors(&self) -> &[KeyDescriptor] {
        &self.key_descriptors
    }
}

impl RoleDescriptor for IdpSsoDescriptor {
    const ELEMENT: &'static str = "IDPSSODescriptor";

    fn of(entity: &EntityDescriptor) -> Option<&Self> {
        entity.idp.as_ref()
    }

    fn key_descriptors(&self) -> &[KeyDescriptor] {
        &self.key_descriptors
    }
}

/// A partner's `md:EntityDescriptor`.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// `entityID`, the partner's issuer URL.
    pub entity_id: String,
    /// `validUntil`, if declared.
    pub valid_until: Option<DateTime<Utc>>,
    /// Whether the document carries a root signature.
    pub signed: bool,
    /// eIDAS SP type declared in the entity extensions.
    pub sp_type: Option<String>,
    /// Levels of assurance declared as entity attributes.
    pub levels_of_assurance: Vec<String>,
    /// Service provider role.
    pub sp: Option<SpSsoDescriptor>,
    /// Identity provider role.
    pub idp: Option<IdpSsoDescriptor>,
}

impl EntityDescriptor {
    /// Parses an entity descriptor document.
    ///
    /// The root element must be `md:EntityDescriptor` with an `entityID`.
    pub fn parse(document: &str) -> SamlResult<Self> {
        let root = xml::parse(document).map_err(|e| {
            SamlError::metadata(EidasErrorKey::SamlEngineInvalidMetadata, e.to_string())
        })?;
        if !root.is(MD_NS, "EntityDescriptor") {
            return Err(SamlError::metadata(
                EidasErrorKey::SamlEngineInvalidMetadata,
                format!("expected EntityDescriptor, found {}", root.qname),
            ));
        }
        let entity_id = root
            .attr("entityID")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SamlError::metadata(
                    EidasErrorKey::SamlEngineInvalidMetadata,
                    "EntityDescriptor has no entityID",
                )
            })?
            .to_string();
        let valid_until = root.attr("validUntil").map(parse_instant).transpose()?;

        let extensions = root.child(MD_NS, "Extensions");
        let sp_type = extensions
            .and_then(|e| e.child_text(eidas::EXTENSIONS_NS, "SPType"))
            .map(str::to_string);
        let levels_of_assurance = extensions
            .and_then(|e| e.child(MDATTR_NS, "EntityAttributes"))
            .map(|attrs| {
                attrs
                    .children_named(SAML_NS, "Attribute")
                    .filter(|a| a.attr("Name") == Some(eidas::LOA_ENTITY_ATTRIBUTE))
                    .flat_map(|a| a.children_named(SAML_NS, "AttributeValue"))
                    .map(|v| v.text().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let sp = root
            .child(MD_NS, SpSsoDescriptor::ELEMENT)
            .map(|role| -> SamlResult<SpSsoDescriptor> {
                Ok(SpSsoDescriptor {
                    key_descriptors: key_descriptors(role)?,
                    assertion_consumer_services: endpoints(role, "AssertionConsumerService"),
                    name_id_formats: name_id_formats(role),
                    authn_requests_signed: flag(role, "AuthnRequestsSigned"),
                    want_assertions_signed: flag(role, "WantAssertionsSigned"),
                })
            })
            .transpose()?;
        let idp = root
            .child(MD_NS, IdpSsoDescriptor::ELEMENT)
            .map(|role| -> SamlResult<IdpSsoDescriptor> {
                Ok(IdpSsoDescriptor {
                    key_descriptors: key_descriptors(role)?,
                    single_sign_on_services: endpoints(role, "SingleSignOnService"),
                    name_id_formats: name_id_formats(role),
                    want_authn_requests_signed: flag(role, "WantAuthnRequestsSigned"),
                })
            })
            .transpose()?;

        Ok(Self {
            entity_id,
            valid_until,
            signed: root.child(XMLDSIG_NS, "Signature").is_some(),
            sp_type,
            levels_of_assurance,
            sp,
            idp,
        })
    }

    /// Returns true unless `validUntil` has passed.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(true, |until| now < until)
    }

    /// Returns the role descriptor of type `R`.
    #[must_use]
    pub fn role<R: RoleDescriptor>(&self) -> Option<&R> {
        R::of(self)
    }

    /// Returns every signing certificate across roles.
    #[must_use]
    pub fn signing_certificates(&self) -> Vec<Certificate> {
        self.keys()
            .filter(|k| k.key_use.signs())
            .map(|k| k.certificate.clone())
            .collect()
    }

    /// Returns the first encryption certificate across roles.
    #[must_use]
    pub fn encryption_certificate(&self) -> Option<&Certificate> {
        self.keys()
            .find(|k| k.key_use.encrypts())
            .map(|k| &k.certificate)
    }

    fn keys(&self) -> impl Iterator<Item = &KeyDescriptor> {
        self.sp
            .iter()
            .flat_map(|r| r.key_descriptors.iter())
            .chain(self.idp.iter().flat_map(|r| r.key_descriptors.iter()))
    }

    /// Returns the single sign-on service for a binding.
    #[must_use]
    pub fn single_sign_on_service(&self, binding: SamlBinding) -> Option<&Endpoint> {
        self.idp
            .as_ref()?
            .single_sign_on_services
            .iter()
            .find(|e| e.binding == binding.uri())
    }
}

fn key_descriptors(role: &XmlElement) -> SamlResult<Vec<KeyDescriptor>> {
    role.children_named(MD_NS, "KeyDescriptor")
        .filter_map(|kd| {
            kd.find(XMLDSIG_NS, "X509Certificate").map(|c| {
                Certificate::from_base64(c.text())
                    .map(|certificate| KeyDescriptor {
                        key_use: KeyUse::parse(kd.attr("use")),
                        certificate,
                    })
                    .map_err(|e| {
                        SamlError::metadata(
                            EidasErrorKey::SamlEngineInvalidMetadata,
                            format!("invalid certificate in metadata: {e}"),
                        )
                    })
            })
        })
        .collect()
}

fn endpoints(role: &XmlElement, local_name: &str) -> Vec<Endpoint> {
    role.children_named(MD_NS, local_name)
        .filter_map(Endpoint::parse)
        .collect()
}

fn name_id_formats(role: &XmlElement) -> Vec<String> {
    role.children_named(MD_NS, "NameIDFormat")
        .map(|f| f.text().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

fn flag(role: &XmlElement, name: &str) -> bool {
    role.attr(name)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
