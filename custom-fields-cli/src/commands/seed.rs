//! Apply a YAML seed file.

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use custom_fields::{FieldSeed, SqliteStore};

pub fn run_seed(store: &SqliteStore, file: &Path, out: &mut dyn Write) -> Result<()> {
    let seed = FieldSeed::load(file)
        .with_context(|| format!("failed to read seed file {}", file.display()))?;
    let report = seed.apply(store)?;

    for name in &report.created {
        writeln!(out, "created  {name}")?;
    }
    for name in &report.skipped {
        writeln!(out, "exists   {name}")?;
    }
    writeln!(
        out,
        "{} created, {} already present",
        report.created.len(),
        report.skipped.len()
    )?;
    Ok(())
}
