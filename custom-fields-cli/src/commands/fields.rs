//! List field definitions.

use std::io::Write;

use anyhow::Result;
use custom_fields::rules::to_rule_string;
use custom_fields::{DefinitionRepository, SqliteStore};

use crate::table::{flag, new_table};

pub fn run_fields(
    store: &SqliteStore,
    entity_type: &str,
    tenant: Option<&str>,
    include_inactive: bool,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let fields = if include_inactive {
        store.list_fields(entity_type, tenant)?
    } else {
        store.active_fields(entity_type, tenant)?
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&fields)?)?;
        return Ok(());
    }

    if fields.is_empty() {
        writeln!(out, "No fields defined for '{entity_type}'.")?;
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec![
        "Code", "Name", "Type", "Column", "Rules", "Encrypted", "Active", "System",
    ]);
    for field in &fields {
        table.add_row(vec![
            field.code.clone(),
            field.name.clone(),
            field.type_.to_string(),
            field.column().to_string(),
            to_rule_string(&field.validation_rules),
            flag(field.is_encrypted()).to_string(),
            flag(field.active).to_string(),
            flag(field.system_defined).to_string(),
        ]);
    }
    writeln!(out, "{table}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_fields::{FieldType, NewField};

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_field(&NewField::new("company", "website", "Website", FieldType::Link))
            .unwrap();
        let hidden = store
            .create_field(&NewField::new("company", "legacy", "Legacy", FieldType::Text))
            .unwrap();
        store.set_active(hidden.id, false).unwrap();
        store
    }

    #[test]
    fn test_lists_active_fields_only_by_default() {
        let mut out = Vec::new();
        run_fields(&store(), "company", None, false, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("website"));
        assert!(!text.contains("legacy"));
    }

    #[test]
    fn test_json_output_with_inactive() {
        let mut out = Vec::new();
        run_fields(&store(), "company", None, true, true, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_entity_type() {
        let mut out = Vec::new();
        run_fields(&store(), "person", None, false, false, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No fields"));
    }
}
