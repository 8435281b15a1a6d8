//! File-based repository of statically provisioned partner metadata.
//!
//! Each file holds one `md:EntityDescriptor`; the file name is the entry ID.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::EntityDescriptor;
use crate::error::{EidasErrorKey, SamlError, SamlResult};

/// A directory of entity descriptor files.
#[derive(Debug, Clone)]
pub struct FileMetadataRepository {
    root: PathBuf,
}

impl FileMetadataRepository {
    /// Opens a repository. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> SamlResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SamlError::configuration(format!(
                "metadata repository {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Returns the repository directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Lists entry IDs in name order.
    pub fn ids(&self) -> SamlResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Reads the raw document stored under `id`.
    pub fn read(&self, id: &str) -> SamlResult<String> {
        Ok(fs::read_to_string(self.entry_path(id)?)?)
    }

    /// Reads and parses the entry stored under `id`.
    pub fn entity(&self, id: &str) -> SamlResult<EntityDescriptor> {
        parse_entry(id, &self.read(id)?)
    }

    /// Parses every entry.
    pub fn load_all(&self) -> SamlResult<Vec<(String, EntityDescriptor)>> {
        self.ids()?
            .into_iter()
            .map(|id| {
                let entity = self.entity(&id)?;
                Ok((id, entity))
            })
            .collect()
    }

    /// Copies `source` into the repository and returns its ID.
    ///
    /// Rejects a file name already present, a document that is not an
    /// entity descriptor and an `entityID` already provisioned (compared
    /// ignoring case). The repository is unchanged on error.
    pub fn add(&self, source: &Path) -> SamlResult<String> {
        let id = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SamlError::metadata(
                    EidasErrorKey::ConsoleMetadataFileParsing,
                    format!("{} has no file name", source.display()),
                )
            })?
            .to_string();
        let document = fs::read_to_string(source)?;
        self.add_document(&id, &document)?;
        Ok(id)
    }

    /// Stores `document` under `id` with the same checks as [`add`](Self::add).
    ///
    /// Existing entries that cannot be read or parsed are skipped when
    /// looking for a duplicate issuer.
    pub fn add_document(&self, id: &str, document: &str) -> SamlResult<()> {
        let path = self.entry_path(id)?;
        let already_exists = || {
            SamlError::metadata(
                EidasErrorKey::ConsoleMetadataFileAlreadyExists,
                format!("metadata file {id} already exists"),
            )
        };
        if path.exists() {
            return Err(already_exists());
        }
        let entity = parse_entry(id, document)?;
        for existing in self.ids()? {
            let other = match self.entity(&existing) {
                Ok(other) => other,
                Err(e) => {
                    tracing::warn!(id = %existing, error = %e, "Skipping unreadable metadata entry");
                    continue;
                }
            };
            if other.entity_id.eq_ignore_ascii_case(&entity.entity_id) {
                return Err(SamlError::metadata(
                    EidasErrorKey::ConsoleMetadataIssuerAlreadyExists,
                    format!("issuer {} is already provisioned in {existing}", entity.entity_id),
                ));
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(already_exists()),
            Err(e) => return Err(e.into()),
        };
        file.write_all(document.as_bytes())?;
        tracing::info!(id = %id, issuer = %entity.entity_id, "Added static metadata");
        Ok(())
    }

    /// Removes the entry stored under `id`.
    pub fn remove(&self, id: &str) -> SamlResult<()> {
        let path = self.entry_path(id)?;
        if !path.is_file() {
            return Err(SamlError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("metadata file {id} does not exist"),
            )));
        }
        fs::remove_file(path)?;
        tracing::info!(id = %id, "Removed static metadata");
        Ok(())
    }

    fn entry_path(&self, id: &str) -> SamlResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(SamlError::configuration(format!(
                "invalid metadata file name '{id}'"
            )));
        }
        Ok(self.root.join(id))
    }
}

fn parse_entry(id: &str, document: &str) -> SamlResult<EntityDescriptor> {
    if document.trim().is_empty() {
        return Err(SamlError::metadata(
            EidasErrorKey::ConsoleMetadataFileParsing,
            format!("metadata file {id} is empty"),
        ));
    }
    EntityDescriptor::parse(document).map_err(|e| {
        SamlError::metadata(
            EidasErrorKey::ConsoleMetadataFileParsing,
            format!("metadata file {id}: {e}"),
        )
    })
}
