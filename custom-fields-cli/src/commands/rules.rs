//! Show the effective validation rules of one field.

use std::io::Write;

use anyhow::Result;
use custom_fields::rules::to_rule_string;
use custom_fields::{SqliteStore, ValidationEngine};

pub fn run_rules(
    store: &SqliteStore,
    engine: &ValidationEngine,
    entity_type: &str,
    code: &str,
    tenant: Option<&str>,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let field = store.field_by_code(entity_type, tenant, code)?;
    let effective = engine.effective_rules(&field)?;

    if json {
        let report = serde_json::json!({
            "field": field.code,
            "type": field.type_,
            "dialect": engine.dialect(),
            "declared": field.validation_rules,
            "effective": effective,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "{}.{} ({}, {})",
        field.entity_type,
        field.code,
        field.type_,
        engine.dialect()
    )?;
    writeln!(out, "declared:  {}", to_rule_string(&field.validation_rules))?;
    writeln!(out, "effective: {}", to_rule_string(&effective))?;
    Ok(())
}
