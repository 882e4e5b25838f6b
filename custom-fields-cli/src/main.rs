//! custom-fields CLI - administer custom field definitions and value storage.
//!
//! Commands:
//! - `custom-fields fields <entity-type>`: List field definitions
//! - `custom-fields rules <entity-type> <code>`: Show effective validation rules
//! - `custom-fields seed <file>`: Create default fields from a YAML seed
//! - `custom-fields optimize [--apply]`: Audit and rebuild value column types
//! - `custom-fields generate-key`: Print a new encryption key
//!
//! Environment variables:
//! - CUSTOM_FIELDS_DATABASE_PATH: SQLite database file
//! - CUSTOM_FIELDS_DIALECT: mysql, postgres or sqlite
//! - CUSTOM_FIELDS_ENCRYPTION_KEY: base64 key for encrypted fields
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use custom_fields_cli::commands::{self, fields, optimize, rules, seed, Context};
use custom_fields_cli::{Cli, Commands};

fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Commands::GenerateKey = cli.command {
        return commands::run_generate_key(out);
    }

    let ctx = Context::load(cli.config.as_deref(), cli.database)?;
    let store = ctx.open_store()?;

    match cli.command {
        Commands::Fields {
            entity_type,
            tenant,
            all,
            json,
        } => fields::run_fields(&store, &entity_type, tenant.as_deref(), all, json, out),
        Commands::Rules {
            entity_type,
            code,
            tenant,
            json,
        } => rules::run_rules(
            &store,
            &ctx.engine(),
            &entity_type,
            &code,
            tenant.as_deref(),
            json,
            out,
        ),
        Commands::Seed { file } => seed::run_seed(&store, &file, out),
        Commands::Optimize { apply } => optimize::run_optimize(&store, apply, out),
        Commands::GenerateKey => commands::run_generate_key(out),
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("custom_fields=debug,custom_fields_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = run(cli, &mut stdout);
    let _ = stdout.flush();
    drop(stdout);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
