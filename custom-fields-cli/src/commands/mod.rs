//! Subcommand implementations.
//!
//! Each command writes its report to the given writer so tests can capture
//! it; `main` passes stdout.

pub mod fields;
pub mod optimize;
pub mod rules;
pub mod seed;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use custom_fields::{AesGcmEncrypter, FieldsConfig, SqliteStore, ValidationEngine};
use tracing::debug;

/// Resolved configuration shared by all commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: FieldsConfig,
}

impl Context {
    /// Load configuration, letting `--database` override the configured path.
    pub fn load(config_file: Option<&Path>, database: Option<PathBuf>) -> Result<Self> {
        let mut config = FieldsConfig::load(config_file).context("failed to load configuration")?;
        if let Some(path) = database {
            config.database_path = path;
        }
        Ok(Self { config })
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        let path = &self.config.database_path;
        debug!(database = %path.display(), "opening field store");
        SqliteStore::open(path).with_context(|| format!("failed to open {}", path.display()))
    }

    pub fn engine(&self) -> ValidationEngine {
        ValidationEngine::new(self.config.dialect)
    }
}

/// Print a new random key suitable for `CUSTOM_FIELDS_ENCRYPTION_KEY`.
pub fn run_generate_key(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", AesGcmEncrypter::generate_key())?;
    Ok(())
}
