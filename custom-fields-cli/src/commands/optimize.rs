//! Audit and optionally rebuild value column types.

use std::io::Write;

use anyhow::Result;
use custom_fields::{ColumnAudit, SqliteStore};

use crate::table::new_table;

pub fn run_optimize(store: &SqliteStore, apply: bool, out: &mut dyn Write) -> Result<()> {
    let audit = store.audit_columns()?;
    write_audit(&audit, out)?;

    let pending = audit.iter().filter(|c| !c.is_optimal()).count();
    if pending == 0 {
        writeln!(out, "All value columns use the recommended types.")?;
        return Ok(());
    }

    if !apply {
        writeln!(out, "{pending} column(s) differ; run with --apply to rebuild.")?;
        return Ok(());
    }

    let changed = store.optimize_columns()?;
    writeln!(out, "Rebuilt {} column(s).", changed.len())?;
    Ok(())
}

fn write_audit(audit: &[ColumnAudit], out: &mut dyn Write) -> Result<()> {
    let mut table = new_table();
    table.set_header(vec!["Column", "Current", "Recommended", "Status"]);
    for column in audit {
        let status = if column.is_missing() {
            "missing"
        } else if column.is_optimal() {
            "ok"
        } else {
            "differs"
        };
        table.add_row(vec![
            column.column.column_name(),
            column.actual.as_str(),
            column.recommended,
            status,
        ]);
    }
    writeln!(out, "{table}")?;
    Ok(())
}
