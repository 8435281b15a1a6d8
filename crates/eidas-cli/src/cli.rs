//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// eIDAS CLI - Administration tool for eIDAS nodes.
#[derive(Debug, Parser)]
#[command(name = "eidas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON.
    Json,
    /// No output besides errors.
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Static metadata repository commands.
    #[command(subcommand)]
    Metadata(MetadataCommand),

    /// Engine configuration commands.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Metadata repository commands.
#[derive(Debug, Subcommand)]
pub enum MetadataCommand {
    /// List provisioned entity descriptors.
    List {
        /// Repository directory.
        #[arg(short, long, env = "EIDAS_METADATA_REPOSITORY")]
        repository: PathBuf,
    },

    /// Show one entity descriptor.
    Show {
        /// Repository directory.
        #[arg(short, long, env = "EIDAS_METADATA_REPOSITORY")]
        repository: PathBuf,

        /// Entry ID (file name).
        id: String,
    },

    /// Copy a metadata file into the repository.
    Add {
        /// Repository directory.
        #[arg(short, long, env = "EIDAS_METADATA_REPOSITORY")]
        repository: PathBuf,

        /// Metadata file.
        file: PathBuf,
    },

    /// Remove an entry from the repository.
    Remove {
        /// Repository directory.
        #[arg(short, long, env = "EIDAS_METADATA_REPOSITORY")]
        repository: PathBuf,

        /// Entry ID (file name).
        id: String,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Load a configuration file and build every engine instance.
    Check {
        /// Configuration file.
        #[arg(env = "EIDAS_CONFIG_PATH")]
        file: PathBuf,

        /// Apply production mode before building.
        #[arg(long)]
        production: bool,
    },

    /// Print the effective configuration as TOML.
    Show {
        /// Configuration file.
        #[arg(env = "EIDAS_CONFIG_PATH")]
        file: PathBuf,

        /// Apply production mode before printing.
        #[arg(long)]
        production: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_metadata_add() {
        let cli = Cli::try_parse_from([
            "eidas",
            "metadata",
            "add",
            "--repository",
            "/srv/metadata",
            "partner.xml",
        ])
        .unwrap();
        match cli.command {
            Command::Metadata(MetadataCommand::Add { repository, file }) => {
                assert_eq!(repository, PathBuf::from("/srv/metadata"));
                assert_eq!(file, PathBuf::from("partner.xml"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn parse_config_check() {
        let cli = Cli::try_parse_from([
            "eidas",
            "config",
            "check",
            "eidas.toml",
            "--production",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Check { production: true, .. })
        ));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
