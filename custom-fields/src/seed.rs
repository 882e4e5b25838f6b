//! Default field definitions.
//!
//! Hosts (or YAML seed files) describe the fields they ship with. Seeding
//! creates the ones whose code does not exist yet and leaves existing,
//! possibly customized, definitions alone. The whole seed runs in one
//! transaction.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::sqlite::{field_code_exists, insert_field};
use crate::store::SqliteStore;
use crate::types::NewField;
use crate::validation::ValidationEngine;

/// A collection of default field definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSeed {
    #[serde(default)]
    fields: Vec<NewField>,
}

impl FieldSeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default field definition.
    pub fn field(mut self, field: NewField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[NewField] {
        &self.fields
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read a YAML seed file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Create every definition whose code is not taken yet.
    ///
    /// A definition that marks a non-encryptable type as encrypted aborts the
    /// seed before anything is written.
    pub fn apply(&self, store: &SqliteStore) -> Result<SeedReport> {
        let report = store.transaction(|tx| {
            let mut report = SeedReport::default();
            for field in &self.fields {
                let qualified = format!("{}.{}", field.entity_type, field.code);
                let tenant = field.tenant_id.as_deref();
                if field_code_exists(tx, &field.entity_type, tenant, &field.code)? {
                    debug!(field = %qualified, "field exists, keeping it");
                    report.skipped.push(qualified);
                    continue;
                }

                let mut field = field.clone();
                field.system_defined = true;
                ValidationEngine::check_encryption_of(
                    &field.code,
                    field.type_,
                    field.settings.encrypted,
                )?;
                insert_field(tx, &field)?;
                debug!(field = %qualified, "seeded default field");
                report.created.push(qualified);
            }
            Ok(report)
        })?;

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "seeded custom fields"
        );
        Ok(report)
    }
}

/// Outcome of [`FieldSeed::apply`], as `entity_type.code` names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}
