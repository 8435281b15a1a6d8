//! Static metadata repository commands.

use std::path::Path;

use eidas_protocol_saml::metadata::{EntityDescriptor, FileMetadataRepository};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{MetadataCommand, OutputFormat};
use crate::output::{output, output_single, success};
use crate::CliResult;

/// One repository entry in listings.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MetadataRow {
    /// Entry ID.
    #[tabled(rename = "ID")]
    pub id: String,
    /// `entityID`.
    #[tabled(rename = "Entity ID")]
    pub entity_id: String,
    /// Roles present.
    #[tabled(rename = "Roles")]
    pub roles: String,
    /// `validUntil`.
    #[tabled(rename = "Valid Until")]
    pub valid_until: String,
    /// Whether the document is signed.
    #[tabled(rename = "Signed")]
    pub signed: bool,
}

impl MetadataRow {
    fn new(id: String, entity: &EntityDescriptor) -> Self {
        let roles: Vec<&str> = [
            entity.sp.as_ref().map(|_| "SP"),
            entity.idp.as_ref().map(|_| "IdP"),
        ]
        .into_iter()
        .flatten()
        .collect();
        Self {
            id,
            entity_id: entity.entity_id.clone(),
            roles: roles.join(", "),
            valid_until: entity
                .valid_until
                .map_or_else(|| "-".to_string(), |v| v.to_rfc3339()),
            signed: entity.signed,
        }
    }
}

/// Details of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataDetails {
    /// Entry ID.
    pub id: String,
    /// `entityID`.
    pub entity_id: String,
    /// `validUntil`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    /// Whether the document is signed.
    pub signed: bool,
    /// eIDAS SP type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_type: Option<String>,
    /// Declared levels of assurance.
    pub levels_of_assurance: Vec<String>,
    /// Assertion consumer services as `binding location`.
    pub assertion_consumer_services: Vec<String>,
    /// Single sign-on services as `binding location`.
    pub single_sign_on_services: Vec<String>,
}

/// Runs a metadata command.
pub fn run_metadata(cmd: MetadataCommand, format: OutputFormat) -> CliResult<()> {
    match cmd {
        MetadataCommand::List { repository } => output(&list(&repository)?, format),
        MetadataCommand::Show { repository, id } => output_single(&show(&repository, &id)?, format),
        MetadataCommand::Add { repository, file } => {
            let id = add(&repository, &file)?;
            if format != OutputFormat::Quiet {
                success(&format!("Added metadata {id}"));
            }
            Ok(())
        }
        MetadataCommand::Remove { repository, id } => {
            remove(&repository, &id)?;
            if format != OutputFormat::Quiet {
                success(&format!("Removed metadata {id}"));
            }
            Ok(())
        }
    }
}

/// Lists every entry of the repository.
pub fn list(repository: &Path) -> CliResult<Vec<MetadataRow>> {
    let repository = FileMetadataRepository::new(repository)?;
    Ok(repository
        .load_all()?
        .into_iter()
        .map(|(id, entity)| MetadataRow::new(id, &entity))
        .collect())
}

/// Reads one entry.
pub fn show(repository: &Path, id: &str) -> CliResult<MetadataDetails> {
    let entity = FileMetadataRepository::new(repository)?.entity(id)?;
    let endpoints = |services: &[eidas_protocol_saml::metadata::Endpoint]| -> Vec<String> {
        services
            .iter()
            .map(|e| format!("{} {}", e.binding, e.location))
            .collect()
    };
    Ok(MetadataDetails {
        id: id.to_string(),
        entity_id: entity.entity_id.clone(),
        valid_until: entity.valid_until.map(|v| v.to_rfc3339()),
        signed: entity.signed,
        sp_type: entity.sp_type.clone(),
        levels_of_assurance: entity.levels_of_assurance.clone(),
        assertion_consumer_services: entity
            .sp
            .as_ref()
            .map(|sp| endpoints(&sp.assertion_consumer_services))
            .unwrap_or_default(),
        single_sign_on_services: entity
            .idp
            .as_ref()
            .map(|idp| endpoints(&idp.single_sign_on_services))
            .unwrap_or_default(),
    })
}

/// Copies `file` into the repository and returns the new entry ID.
pub fn add(repository: &Path, file: &Path) -> CliResult<String> {
    Ok(FileMetadataRepository::new(repository)?.add(file)?)
}

/// Removes an entry.
pub fn remove(repository: &Path, id: &str) -> CliResult<()> {
    Ok(FileMetadataRepository::new(repository)?.remove(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CliError;

    const SP: &str = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://sp.example.eu/metadata" validUntil="2050-01-01T00:00:00Z"><md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"><md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://sp.example.eu/acs" index="0"/></md:SPSSODescriptor></md:EntityDescriptor>"#;

    #[test]
    fn add_list_show_remove() {
        let repository = tempfile::tempdir().unwrap();
        let incoming = tempfile::tempdir().unwrap();
        let file = incoming.path().join("sp.xml");
        std::fs::write(&file, SP).unwrap();

        assert_eq!(add(repository.path(), &file).unwrap(), "sp.xml");

        let rows = list(repository.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "https://sp.example.eu/metadata");
        assert_eq!(rows[0].roles, "SP");
        assert!(!rows[0].signed);

        let details = show(repository.path(), "sp.xml").unwrap();
        assert_eq!(
            details.assertion_consumer_services,
            vec!["urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST https://sp.example.eu/acs"]
        );
        assert!(details.single_sign_on_services.is_empty());

        remove(repository.path(), "sp.xml").unwrap();
        assert!(list(repository.path()).unwrap().is_empty());
        assert!(remove(repository.path(), "sp.xml").is_err());
    }

    #[test]
    fn duplicate_issuer_is_rejected() {
        let repository = tempfile::tempdir().unwrap();
        let incoming = tempfile::tempdir().unwrap();
        let first = incoming.path().join("a.xml");
        let second = incoming.path().join("b.xml");
        std::fs::write(&first, SP).unwrap();
        std::fs::write(
            &second,
            SP.replace("https://sp.example.eu/metadata", "HTTPS://SP.EXAMPLE.EU/metadata"),
        )
        .unwrap();

        add(repository.path(), &first).unwrap();
        let err = add(repository.path(), &second).unwrap_err();
        assert!(matches!(err, CliError::Saml(ref e) if e.is_configuration()));
        assert_eq!(list(repository.path()).unwrap().len(), 1);
    }

    #[test]
    fn missing_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list(&dir.path().join("absent")).is_err());
    }
}
