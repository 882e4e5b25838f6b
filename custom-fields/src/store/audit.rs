//! Live column types of the value table versus the constraint catalog.

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use super::sqlite::{create_value_index, value_table_ddl, VALUES_TABLE};
use crate::constraints::{recommended_column_type, Dialect};
use crate::error::Result;
use crate::types::ColumnKind;

/// One value column as found in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnAudit {
    pub column: ColumnKind,
    /// Declared type, empty when the column is missing.
    pub actual: String,
    pub recommended: &'static str,
}

impl ColumnAudit {
    /// Declared type matches the recommendation, ignoring case and spacing.
    pub fn is_optimal(&self) -> bool {
        normalize(&self.actual) == normalize(self.recommended)
    }

    pub fn is_missing(&self) -> bool {
        self.actual.is_empty()
    }
}

fn normalize(type_name: &str) -> String {
    type_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Declared types of the value slots, in [`ColumnKind::ALL`] order.
pub fn audit_value_columns(conn: &Connection, dialect: Dialect) -> Result<Vec<ColumnAudit>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({VALUES_TABLE})"))?;
    let declared = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ColumnKind::ALL
        .iter()
        .map(|column| {
            let actual = declared
                .iter()
                .find(|(name, _)| name == column.column_name())
                .map(|(_, type_name)| type_name.clone())
                .unwrap_or_default();
            ColumnAudit {
                column: *column,
                actual,
                recommended: recommended_column_type(*column, dialect),
            }
        })
        .collect())
}

/// Recreate the value table with catalog column types, copying every row.
///
/// Runs in one transaction. Returns the columns that changed; nothing is
/// touched when all columns are already optimal.
pub fn rebuild_value_table(conn: &mut Connection) -> Result<Vec<ColumnAudit>> {
    let changed: Vec<ColumnAudit> = audit_value_columns(conn, Dialect::Sqlite)?
        .into_iter()
        .filter(|audit| !audit.is_optimal())
        .collect();
    if changed.is_empty() {
        return Ok(changed);
    }

    let staging = format!("{VALUES_TABLE}_rebuild");
    let copied_columns = ColumnKind::ALL
        .iter()
        .filter(|c| !changed.iter().any(|a| a.column == **c && a.is_missing()))
        .map(|c| c.column_name())
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {staging}"))?;
    tx.execute_batch(&value_table_ddl(&staging))?;
    let rows = tx.execute(
        &format!(
            "INSERT INTO {staging} (id, custom_field_id, entity_type, entity_id, tenant_id, {copied_columns})
             SELECT id, custom_field_id, entity_type, entity_id, tenant_id, {copied_columns}
             FROM {VALUES_TABLE}"
        ),
        [],
    )?;
    tx.execute_batch(&format!(
        "DROP TABLE {VALUES_TABLE};
         ALTER TABLE {staging} RENAME TO {VALUES_TABLE};"
    ))?;
    create_value_index(&tx)?;
    tx.commit()?;

    let columns = changed
        .iter()
        .map(|a| a.column.column_name())
        .collect::<Vec<_>>()
        .join(",");
    info!(rows, %columns, "rebuilt custom field value table");
    Ok(changed)
}
