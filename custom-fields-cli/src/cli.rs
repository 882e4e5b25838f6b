//! CLI definition for the custom-fields administration tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Administer custom field definitions and their value storage.
///
/// Settings are read from the optional `--config` file (TOML, YAML or JSON)
/// and from `CUSTOM_FIELDS_*` environment variables, which take precedence.
#[derive(Parser, Debug)]
#[command(name = "custom-fields")]
#[command(version)]
#[command(about = "Administer custom field definitions and value storage")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database, overrides the configured path
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List field definitions of an entity type
    Fields {
        /// Entity type, e.g. company
        entity_type: String,
        /// Tenant scope
        #[arg(long)]
        tenant: Option<String>,
        /// Include inactive fields
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective validation rules of a field
    Rules {
        /// Entity type, e.g. company
        entity_type: String,
        /// Field code
        code: String,
        /// Tenant scope
        #[arg(long)]
        tenant: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create default fields from a YAML seed file
    Seed {
        /// Seed file
        file: PathBuf,
    },

    /// Compare value column types with the recommended ones
    ///
    /// Without --apply this only reports. With --apply the value table is
    /// rebuilt with the recommended types, keeping all stored values.
    Optimize {
        /// Rebuild columns that differ
        #[arg(long)]
        apply: bool,
    },

    /// Print a fresh base64 encryption key
    GenerateKey,
}

impl Cli {
    pub fn try_parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_help_works() {
        let error = Cli::try_parse_from_args(["custom-fields", "--help"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from_args(["custom-fields"]).is_err());
    }

    #[test]
    fn test_rules_subcommand() {
        let cli = Cli::try_parse_from_args([
            "custom-fields",
            "rules",
            "company",
            "website",
            "--tenant",
            "acme",
        ])
        .unwrap();
        match cli.command {
            Commands::Rules {
                entity_type,
                code,
                tenant,
                json,
            } => {
                assert_eq!(entity_type, "company");
                assert_eq!(code, "website");
                assert_eq!(tenant.as_deref(), Some("acme"));
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from_args([
            "custom-fields",
            "optimize",
            "--apply",
            "--database",
            "/tmp/fields.db",
            "-d",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/fields.db")));
        assert!(matches!(cli.command, Commands::Optimize { apply: true }));
    }

    #[test]
    fn test_seed_requires_file() {
        assert!(Cli::try_parse_from_args(["custom-fields", "seed"]).is_err());
        let cli = Cli::try_parse_from_args(["custom-fields", "seed", "defaults.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Seed { file } if file == PathBuf::from("defaults.yaml")));
    }

    #[test]
    fn test_generate_key_subcommand() {
        let cli = Cli::try_parse_from_args(["custom-fields", "generate-key"]).unwrap();
        assert!(matches!(cli.command, Commands::GenerateKey));
    }
}
