//! SQLite-backed storage for definitions, options, sections and values.
//!
//! # Schema
//!
//! - `custom_field_sections`: named groups of fields per entity type
//! - `custom_fields`: field definitions, unique on `(entity_type, tenant_id, code)`
//! - `custom_field_options`: choices of a field, cascade-deleted with it
//! - `custom_field_values`: EAV rows, unique on
//!   `(custom_field_id, entity_type, entity_id, tenant_id)`, cascade-deleted
//!   with their field
//!
//! A missing tenant is stored as the empty string so the unique keys hold for
//! single-tenant installs too.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::audit::{self, ColumnAudit};
use super::{DefinitionRepository, EntityRef, ValueRecord, ValueRepository};
use crate::constraints::{recommended_column_type, Dialect};
use crate::convert::{DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT};
use crate::error::{FieldsError, Result};
use crate::types::{ColumnKind, FieldDefinition, FieldOption, FieldSection, NewField};

/// Name of the EAV value table.
pub const VALUES_TABLE: &str = "custom_field_values";

const DEFINITION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS custom_field_sections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tenant_id TEXT NOT NULL DEFAULT '',
    sort_order INTEGER NOT NULL DEFAULT 0,
    active BOOLEAN NOT NULL DEFAULT 1,
    UNIQUE (entity_type, tenant_id, code)
);

CREATE TABLE IF NOT EXISTS custom_fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tenant_id TEXT NOT NULL DEFAULT '',
    section_id INTEGER REFERENCES custom_field_sections(id) ON DELETE SET NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    validation_rules TEXT NOT NULL DEFAULT '[]',
    settings TEXT NOT NULL DEFAULT '{}',
    width INTEGER,
    active BOOLEAN NOT NULL DEFAULT 1,
    system_defined BOOLEAN NOT NULL DEFAULT 0,
    lookup_type TEXT,
    UNIQUE (entity_type, tenant_id, code)
);

CREATE INDEX IF NOT EXISTS idx_custom_fields_entity ON custom_fields(entity_type, tenant_id, active);

CREATE TABLE IF NOT EXISTS custom_field_options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    custom_field_id INTEGER NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_custom_field_options_field ON custom_field_options(custom_field_id);
"#;

const VALUE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_custom_field_values_entity \
     ON custom_field_values(entity_type, entity_id, tenant_id)";

/// Value slots in [`ColumnKind::ALL`] order.
const VALUE_COLUMNS: &str = "text_value, string_value, integer_value, float_value, \
     boolean_value, date_value, datetime_value, json_value";

const FIELD_COLUMNS: &str = "f.id, f.code, f.name, f.type, f.entity_type, f.tenant_id, \
     f.section_id, f.sort_order, f.validation_rules, f.settings, f.width, f.active, \
     f.system_defined, f.lookup_type";

const SECTION_COLUMNS: &str = "id, code, name, entity_type, tenant_id, sort_order, active";

/// `CREATE TABLE` for the value table, with slot column types taken from the
/// constraint catalog.
pub(crate) fn value_table_ddl(table: &str) -> String {
    let slots = ColumnKind::ALL
        .iter()
        .map(|c| {
            format!(
                "    {} {}",
                c.column_name(),
                recommended_column_type(*c, Dialect::Sqlite)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    custom_field_id INTEGER NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL DEFAULT '',
{slots},
    UNIQUE (custom_field_id, entity_type, entity_id, tenant_id)
)"
    )
}

pub(crate) fn create_value_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(VALUE_INDEX)?;
    Ok(())
}

fn tenant_key(tenant_id: Option<&str>) -> &str {
    tenant_id.unwrap_or("")
}

fn tenant_from(stored: String) -> Option<String> {
    if stored.is_empty() {
        None
    } else {
        Some(stored)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Read a text-encoded slot. Content that no longer parses (legacy formats,
/// stale slots of a retyped field) reads as empty instead of failing the row.
fn parse_column<T, E>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> rusqlite::Result<Option<T>>
where
    E: std::fmt::Display,
{
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    match parse(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            warn!(
                column = ColumnKind::ALL[idx].column_name(),
                stored = %raw,
                %error,
                "unreadable stored value, treating as null"
            );
            Ok(None)
        }
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ValueRecord> {
    Ok(ValueRecord {
        text_value: row.get(0)?,
        string_value: row.get(1)?,
        integer_value: row.get(2)?,
        float_value: row.get(3)?,
        boolean_value: row.get(4)?,
        date_value: parse_column(row, 5, |s| NaiveDate::parse_from_str(s, DEFAULT_DATE_FORMAT))?,
        datetime_value: parse_column(row, 6, |s| {
            NaiveDateTime::parse_from_str(s, DEFAULT_DATETIME_FORMAT)
        })?,
        json_value: parse_column(row, 7, |s| serde_json::from_str::<Vec<Value>>(s))?,
    })
}

/// Slots rendered for binding. Dates and json are stored as text.
struct RecordParams<'a> {
    record: &'a ValueRecord,
    date: Option<String>,
    datetime: Option<String>,
    json: Option<String>,
}

impl<'a> RecordParams<'a> {
    fn new(record: &'a ValueRecord) -> Result<Self> {
        Ok(Self {
            record,
            date: record
                .date_value
                .map(|d| d.format(DEFAULT_DATE_FORMAT).to_string()),
            datetime: record
                .datetime_value
                .map(|dt| dt.format(DEFAULT_DATETIME_FORMAT).to_string()),
            json: record
                .json_value
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }
}

/// Raw `custom_fields` row before type and JSON columns are decoded.
struct FieldRow {
    id: i64,
    code: String,
    name: String,
    type_: String,
    entity_type: String,
    tenant_id: String,
    section_id: Option<i64>,
    sort_order: i64,
    validation_rules: String,
    settings: String,
    width: Option<u8>,
    active: bool,
    system_defined: bool,
    lookup_type: Option<String>,
}

impl FieldRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            type_: row.get(3)?,
            entity_type: row.get(4)?,
            tenant_id: row.get(5)?,
            section_id: row.get(6)?,
            sort_order: row.get(7)?,
            validation_rules: row.get(8)?,
            settings: row.get(9)?,
            width: row.get(10)?,
            active: row.get(11)?,
            system_defined: row.get(12)?,
            lookup_type: row.get(13)?,
        })
    }

    fn into_definition(self, options: Vec<FieldOption>) -> Result<FieldDefinition> {
        Ok(FieldDefinition {
            id: self.id,
            code: self.code,
            name: self.name,
            type_: self.type_.parse()?,
            entity_type: self.entity_type,
            tenant_id: tenant_from(self.tenant_id),
            section_id: self.section_id,
            sort_order: self.sort_order,
            validation_rules: serde_json::from_str(&self.validation_rules)?,
            settings: serde_json::from_str(&self.settings)?,
            width: self.width,
            active: self.active,
            system_defined: self.system_defined,
            lookup_type: self.lookup_type,
            options,
        })
    }
}

fn section_from_row(row: &Row<'_>) -> rusqlite::Result<FieldSection> {
    Ok(FieldSection {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        entity_type: row.get(3)?,
        tenant_id: tenant_from(row.get(4)?),
        sort_order: row.get(5)?,
        active: row.get(6)?,
    })
}

fn load_options(conn: &Connection, field_id: i64) -> Result<Vec<FieldOption>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, sort_order FROM custom_field_options
         WHERE custom_field_id = ?1 ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([field_id], |row| {
        Ok(FieldOption {
            id: row.get(0)?,
            name: row.get(1)?,
            sort_order: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn query_fields(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<FieldDefinition>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, FieldRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|row| {
            let options = load_options(conn, row.id)?;
            row.into_definition(options)
        })
        .collect()
}

fn section_exists(conn: &Connection, section_id: i64) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM custom_field_sections WHERE id = ?1",
            [section_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// True when a definition with this code exists in the scope.
pub(crate) fn field_code_exists(
    conn: &Connection,
    entity_type: &str,
    tenant_id: Option<&str>,
    code: &str,
) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM custom_fields WHERE entity_type = ?1 AND tenant_id = ?2 AND code = ?3",
            params![entity_type, tenant_key(tenant_id), code],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Insert a definition and its options. Returns the new id.
pub(crate) fn insert_field(conn: &Connection, new: &NewField) -> Result<i64> {
    if let Some(section_id) = new.section_id {
        if !section_exists(conn, section_id)? {
            return Err(FieldsError::SectionNotFound { id: section_id });
        }
    }

    let rules = serde_json::to_string(&new.validation_rules)?;
    let settings = serde_json::to_string(&new.settings)?;
    let inserted = conn.execute(
        "INSERT INTO custom_fields (code, name, type, entity_type, tenant_id, section_id,
            sort_order, validation_rules, settings, width, active, system_defined, lookup_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12)",
        params![
            new.code,
            new.name,
            new.type_.as_str(),
            new.entity_type,
            tenant_key(new.tenant_id.as_deref()),
            new.section_id,
            new.sort_order,
            rules,
            settings,
            new.width,
            new.system_defined,
            new.lookup_type,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(FieldsError::DuplicateFieldCode {
                entity_type: new.entity_type.clone(),
                code: new.code.clone(),
            })
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    for (position, name) in new.options.iter().enumerate() {
        conn.execute(
            "INSERT INTO custom_field_options (custom_field_id, name, sort_order)
             VALUES (?1, ?2, ?3)",
            params![id, name, position as i64],
        )?;
    }
    Ok(id)
}

/// SQLite store for the custom fields tables.
///
/// `Send + Sync` by wrapping the connection in a Mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (and create if needed) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!(path = %path.display(), "opened custom fields database");
        Self::init(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // cascades depend on this
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(DEFINITION_SCHEMA)?;
        conn.execute_batch(&value_table_ddl(VALUES_TABLE))?;
        create_value_index(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection. A poisoned lock still holds a usable connection.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` inside one transaction; any error rolls everything back.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Field definitions
    // ------------------------------------------------------------------

    /// Create a definition and its options.
    pub fn create_field(&self, new: &NewField) -> Result<FieldDefinition> {
        let id = self.transaction(|tx| insert_field(tx, new))?;
        debug!(
            id,
            code = %new.code,
            entity_type = %new.entity_type,
            field_type = %new.type_,
            "created custom field"
        );
        self.get_field(id)
    }

    pub fn get_field(&self, id: i64) -> Result<FieldDefinition> {
        let conn = self.conn();
        query_fields(
            &conn,
            &format!("SELECT {FIELD_COLUMNS} FROM custom_fields f WHERE f.id = ?1"),
            [id],
        )?
        .pop()
        .ok_or(FieldsError::FieldNotFound { id })
    }

    pub fn find_field(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        code: &str,
    ) -> Result<Option<FieldDefinition>> {
        let conn = self.conn();
        Ok(query_fields(
            &conn,
            &format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields f
                 WHERE f.entity_type = ?1 AND f.tenant_id = ?2 AND f.code = ?3"
            ),
            params![entity_type, tenant_key(tenant_id), code],
        )?
        .pop())
    }

    /// Like [`find_field`](Self::find_field) but missing codes are an error.
    pub fn field_by_code(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        code: &str,
    ) -> Result<FieldDefinition> {
        self.find_field(entity_type, tenant_id, code)?
            .ok_or_else(|| FieldsError::FieldCodeNotFound {
                entity_type: entity_type.to_string(),
                code: code.to_string(),
            })
    }

    /// Every definition of an entity type, active or not.
    pub fn list_fields(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<FieldDefinition>> {
        let conn = self.conn();
        query_fields(
            &conn,
            &format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields f
                 WHERE f.entity_type = ?1 AND f.tenant_id = ?2
                 ORDER BY f.sort_order, f.id"
            ),
            params![entity_type, tenant_key(tenant_id)],
        )
    }

    /// Persist changes to a definition. Options are managed separately.
    pub fn update_field(&self, field: &FieldDefinition) -> Result<()> {
        let conn = self.conn();
        if let Some(section_id) = field.section_id {
            if !section_exists(&conn, section_id)? {
                return Err(FieldsError::SectionNotFound { id: section_id });
            }
        }

        let updated = conn.execute(
            "UPDATE custom_fields SET code = ?2, name = ?3, type = ?4, section_id = ?5,
                sort_order = ?6, validation_rules = ?7, settings = ?8, width = ?9,
                active = ?10, system_defined = ?11, lookup_type = ?12
             WHERE id = ?1",
            params![
                field.id,
                field.code,
                field.name,
                field.type_.as_str(),
                field.section_id,
                field.sort_order,
                serde_json::to_string(&field.validation_rules)?,
                serde_json::to_string(&field.settings)?,
                field.width,
                field.active,
                field.system_defined,
                field.lookup_type,
            ],
        );
        match updated {
            Ok(0) => Err(FieldsError::FieldNotFound { id: field.id }),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(FieldsError::DuplicateFieldCode {
                entity_type: field.entity_type.clone(),
                code: field.code.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft activate or deactivate a definition.
    pub fn set_active(&self, id: i64, active: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE custom_fields SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        if changed == 0 {
            return Err(FieldsError::FieldNotFound { id });
        }
        debug!(id, active, "changed custom field state");
        Ok(())
    }

    /// Hard delete. Options and values go with it.
    pub fn delete_field(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM custom_fields WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(FieldsError::FieldNotFound { id });
        }
        info!(id, "deleted custom field with its options and values");
        Ok(())
    }

    /// Rewrite `sort_order` to match the given order, atomically.
    pub fn reorder_fields(&self, field_ids: &[i64]) -> Result<()> {
        self.transaction(|tx| {
            for (position, id) in field_ids.iter().enumerate() {
                let changed = tx.execute(
                    "UPDATE custom_fields SET sort_order = ?2 WHERE id = ?1",
                    params![id, position as i64],
                )?;
                if changed == 0 {
                    return Err(FieldsError::FieldNotFound { id: *id });
                }
            }
            Ok(())
        })?;
        debug!(count = field_ids.len(), "reordered custom fields");
        Ok(())
    }

    /// Move fields into a section (or out of any with `None`), atomically.
    pub fn assign_section(&self, section_id: Option<i64>, field_ids: &[i64]) -> Result<()> {
        self.transaction(|tx| {
            if let Some(id) = section_id {
                if !section_exists(tx, id)? {
                    return Err(FieldsError::SectionNotFound { id });
                }
            }
            for id in field_ids {
                let changed = tx.execute(
                    "UPDATE custom_fields SET section_id = ?2 WHERE id = ?1",
                    params![id, section_id],
                )?;
                if changed == 0 {
                    return Err(FieldsError::FieldNotFound { id: *id });
                }
            }
            Ok(())
        })?;
        debug!(?section_id, count = field_ids.len(), "assigned fields to section");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    /// Append an option to a field.
    pub fn add_option(&self, field_id: i64, name: &str) -> Result<FieldOption> {
        self.transaction(|tx| {
            let exists = tx
                .query_row("SELECT 1 FROM custom_fields WHERE id = ?1", [field_id], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            if !exists {
                return Err(FieldsError::FieldNotFound { id: field_id });
            }

            let sort_order: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM custom_field_options
                 WHERE custom_field_id = ?1",
                [field_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO custom_field_options (custom_field_id, name, sort_order)
                 VALUES (?1, ?2, ?3)",
                params![field_id, name, sort_order],
            )?;
            Ok(FieldOption {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                sort_order,
            })
        })
    }

    pub fn options(&self, field_id: i64) -> Result<Vec<FieldOption>> {
        load_options(&self.conn(), field_id)
    }

    /// Returns false when no such option existed.
    pub fn delete_option(&self, option_id: i64) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM custom_field_options WHERE id = ?1", [option_id])?;
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------

    pub fn create_section(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        code: &str,
        name: &str,
    ) -> Result<FieldSection> {
        let id = self.transaction(|tx| {
            let sort_order: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM custom_field_sections
                 WHERE entity_type = ?1 AND tenant_id = ?2",
                params![entity_type, tenant_key(tenant_id)],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO custom_field_sections (code, name, entity_type, tenant_id, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![code, name, entity_type, tenant_key(tenant_id), sort_order],
            )?;
            Ok(tx.last_insert_rowid())
        })?;
        self.get_section(id)
    }

    pub fn get_section(&self, id: i64) -> Result<FieldSection> {
        self.conn()
            .query_row(
                &format!("SELECT {SECTION_COLUMNS} FROM custom_field_sections WHERE id = ?1"),
                [id],
                section_from_row,
            )
            .optional()?
            .ok_or(FieldsError::SectionNotFound { id })
    }

    pub fn list_sections(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<FieldSection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SECTION_COLUMNS} FROM custom_field_sections
             WHERE entity_type = ?1 AND tenant_id = ?2 ORDER BY sort_order, id"
        ))?;
        let sections = stmt
            .query_map(params![entity_type, tenant_key(tenant_id)], section_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sections)
    }

    /// Delete a section. Its fields stay, detached.
    pub fn delete_section(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM custom_field_sections WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(FieldsError::SectionNotFound { id });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Column audit
    // ------------------------------------------------------------------

    /// Compare live value column types with the catalog.
    pub fn audit_columns(&self) -> Result<Vec<ColumnAudit>> {
        audit::audit_value_columns(&self.conn(), Dialect::Sqlite)
    }

    /// Rebuild the value table with recommended column types when any differ.
    /// Returns the columns that were changed.
    pub fn optimize_columns(&self) -> Result<Vec<ColumnAudit>> {
        let mut conn = self.conn();
        audit::rebuild_value_table(&mut conn)
    }
}

impl ValueRepository for SqliteStore {
    fn find_value(&self, field_id: i64, entity: &EntityRef) -> Result<Option<ValueRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {VALUE_COLUMNS} FROM {VALUES_TABLE}
             WHERE custom_field_id = ?1 AND entity_type = ?2 AND entity_id = ?3 AND tenant_id = ?4"
        ))?;
        let record = stmt
            .query_row(
                params![
                    field_id,
                    entity.entity_type,
                    entity.entity_id,
                    tenant_key(entity.tenant())
                ],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn value_exists(&self, field_id: i64, entity: &EntityRef) -> Result<bool> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT 1 FROM {VALUES_TABLE}
             WHERE custom_field_id = ?1 AND entity_type = ?2 AND entity_id = ?3 AND tenant_id = ?4"
        ))?;
        let found = stmt
            .query_row(
                params![
                    field_id,
                    entity.entity_type,
                    entity.entity_id,
                    tenant_key(entity.tenant())
                ],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_value(
        &self,
        field_id: i64,
        entity: &EntityRef,
        record: &ValueRecord,
    ) -> Result<bool> {
        let p = RecordParams::new(record)?;
        let inserted = self.conn().execute(
            &format!(
                "INSERT INTO {VALUES_TABLE} (custom_field_id, entity_type, entity_id, tenant_id,
                    {VALUE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                field_id,
                entity.entity_type,
                entity.entity_id,
                tenant_key(entity.tenant()),
                p.record.text_value,
                p.record.string_value,
                p.record.integer_value,
                p.record.float_value,
                p.record.boolean_value,
                p.date,
                p.datetime,
                p.json,
            ],
        );
        match inserted {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn update_value(&self, field_id: i64, entity: &EntityRef, record: &ValueRecord) -> Result<()> {
        let p = RecordParams::new(record)?;
        self.conn().execute(
            &format!(
                "UPDATE {VALUES_TABLE} SET text_value = ?5, string_value = ?6,
                    integer_value = ?7, float_value = ?8, boolean_value = ?9,
                    date_value = ?10, datetime_value = ?11, json_value = ?12
                 WHERE custom_field_id = ?1 AND entity_type = ?2 AND entity_id = ?3
                    AND tenant_id = ?4"
            ),
            params![
                field_id,
                entity.entity_type,
                entity.entity_id,
                tenant_key(entity.tenant()),
                p.record.text_value,
                p.record.string_value,
                p.record.integer_value,
                p.record.float_value,
                p.record.boolean_value,
                p.date,
                p.datetime,
                p.json,
            ],
        )?;
        Ok(())
    }

    fn delete_entity_values(&self, entity: &EntityRef) -> Result<usize> {
        let deleted = self.conn().execute(
            &format!(
                "DELETE FROM {VALUES_TABLE}
                 WHERE entity_type = ?1 AND entity_id = ?2 AND tenant_id = ?3"
            ),
            params![
                entity.entity_type,
                entity.entity_id,
                tenant_key(entity.tenant())
            ],
        )?;
        Ok(deleted)
    }
}

impl DefinitionRepository for SqliteStore {
    fn active_fields(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<FieldDefinition>> {
        let conn = self.conn();
        // unsectioned fields first, then by section order
        query_fields(
            &conn,
            &format!(
                "SELECT {FIELD_COLUMNS} FROM custom_fields f
                 LEFT JOIN custom_field_sections s ON s.id = f.section_id
                 WHERE f.entity_type = ?1 AND f.tenant_id = ?2 AND f.active = 1
                 ORDER BY f.section_id IS NOT NULL, s.sort_order, f.section_id, f.sort_order, f.id"
            ),
            params![entity_type, tenant_key(tenant_id)],
        )
    }
}
