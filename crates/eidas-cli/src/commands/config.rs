//! Engine configuration commands.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use eidas_core::{NodeConfig, SystemClock};
use eidas_protocol_saml::{EngineFactory, ReloadableConfiguration};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigCommand, OutputFormat};
use crate::output::{output, success, warning};
use crate::{CliError, CliResult};

/// Outcome of building one engine instance.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct InstanceReport {
    /// Instance name.
    #[tabled(rename = "Instance")]
    pub instance: String,
    /// Extension format.
    #[tabled(rename = "Format")]
    pub format: String,
    /// Configured issuer.
    #[tabled(rename = "Issuer")]
    pub issuer: String,
    /// Whether metadata processing is enabled.
    #[tabled(rename = "Metadata")]
    pub metadata: bool,
    /// Whether response encryption is mandatory.
    #[tabled(rename = "Mandatory Encryption")]
    pub mandatory_encryption: bool,
    /// `ok` or the construction error.
    #[tabled(rename = "Status")]
    pub status: String,
}

impl InstanceReport {
    /// Returns true if the engine was built.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Runs a config command.
pub fn run_config(cmd: ConfigCommand, format: OutputFormat) -> CliResult<()> {
    match cmd {
        ConfigCommand::Check { file, production } => {
            let reports = check(&file, production)?;
            output(&reports, format)?;
            let failed = reports.iter().filter(|r| !r.is_ok()).count();
            if failed > 0 {
                return Err(CliError::Config(format!(
                    "{failed} of {} instances failed to build",
                    reports.len()
                )));
            }
            if format == OutputFormat::Table {
                success(&format!("{} instances built", reports.len()));
            }
            Ok(())
        }
        ConfigCommand::Show { file, production } => {
            let config = load(&file, production)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Table => print!("{}", config.to_toml_string()?),
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
    }
}

fn load(file: &Path, production: bool) -> CliResult<NodeConfig> {
    let mut config = NodeConfig::load(file)?;
    if production {
        config.production = true;
        config.apply_production_overrides();
    }
    Ok(config)
}

/// Loads `file` and builds every configured instance.
///
/// A failing instance is reported, not returned as an error, so one
/// broken instance does not hide the state of the others.
pub fn check(file: &Path, production: bool) -> CliResult<Vec<InstanceReport>> {
    let config = load(file, production)?;
    if config.instances.is_empty() {
        warning(&format!("{} declares no instances", file.display()));
    }
    let names: Vec<String> = config.instances.keys().cloned().collect();
    let factory = EngineFactory::new(
        Arc::new(ReloadableConfiguration::new(config.clone())),
        Arc::new(SystemClock),
    )?;

    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let stored = &config.instances[&name];
        let mut report = InstanceReport {
            instance: name.clone(),
            format: stored.core.format.clone(),
            issuer: stored.core.issuer.clone().unwrap_or_else(|| "-".to_string()),
            metadata: stored.metadata.enabled,
            mandatory_encryption: stored.cipher.response_encryption_mandatory,
            status: "ok".to_string(),
        };
        match factory
            .get_engine(&name, &BTreeMap::new())
            .and_then(|engine| {
                let components = engine.components();
                factory.release_engine(&engine);
                components
            }) {
            Ok(components) => {
                report.format = components.format().to_string();
                report.metadata = components.metadata().is_some();
                report.mandatory_encryption = components.encryption().is_mandatory();
            }
            Err(e) => {
                tracing::debug!(instance = %name, error = %e, "Instance failed to build");
                report.status = e.to_string();
            }
        }
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn testdata(name: &str) -> String {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata")
            .join(name)
            .display()
            .to_string()
            .replace('\\', "/")
    }

    fn document(signing_serial: &str) -> String {
        format!(
            r#"
[instances.CPEPS.core]
issuer = "https://node.example.be/metadata"

[instances.CPEPS.signer]
signing = {{ serial_number = "{signing_serial}", issuer = "C=EU, O=eIDAS Test, CN=eIDAS Test CA" }}
keystore = [{{ alias = "node", certificate = "{node_pem}", private_key = "{node_key}" }}]
trust_store = ["{ca}"]

[instances.CPEPS.metadata]
enabled = false

[instances.SP-SPEPS.core]
format = "stork1"

[instances.SP-SPEPS.metadata]
enabled = false
"#,
            node_pem = testdata("node.pem"),
            node_key = testdata("node.key"),
            ca = testdata("ca.pem"),
        )
    }

    #[test]
    fn check_builds_every_instance() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("eidas.toml");
        std::fs::write(&file, document("1001")).unwrap();

        let reports = check(&file, false).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(InstanceReport::is_ok));
        assert_eq!(reports[0].instance, "CPEPS");
        assert_eq!(reports[0].format, "eidas");
        assert_eq!(reports[1].format, "stork1");
        assert!(!reports[0].mandatory_encryption);
    }

    #[test]
    fn production_flag_forces_strict_settings() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("eidas.toml");
        std::fs::write(&file, document("1001")).unwrap();

        let config = load(&file, true).unwrap();
        assert!(config.instances["CPEPS"].cipher.response_encryption_mandatory);
        assert!(config.instances["CPEPS"].metadata.enabled);
    }

    #[test]
    fn broken_instance_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("eidas.toml");
        std::fs::write(&file, document("9999")).unwrap();

        let reports = check(&file, false).unwrap();
        let cpeps = reports.iter().find(|r| r.instance == "CPEPS").unwrap();
        assert!(!cpeps.is_ok());
        assert!(cpeps.status.contains("9999"));
        assert!(reports.iter().any(|r| r.instance == "SP-SPEPS" && r.is_ok()));
    }

    #[test]
    fn unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check(&dir.path().join("missing.toml"), false).is_err());
    }
}
