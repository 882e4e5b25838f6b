//! The EAV value store.
//!
//! Reads and writes custom field values of one owning entity at a time. Every
//! write goes through the safe converter, the physical bound check and, for
//! encrypted fields, the injected [`Encrypter`]. Rows are upserted: find, then
//! update or insert, and an insert that loses a race is retried as an update.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FieldsConfig;
use crate::constraints::{limits_for, Dialect};
use crate::convert::{SafeValueConverter, StorageValue};
use crate::crypto::Encrypter;
use crate::error::{FieldFailure, FieldsError, Result};
use crate::store::{DefinitionRepository, EntityRef, ValueRecord, ValueRepository};
use crate::types::FieldDefinition;
use crate::validation::ValidationEngine;

/// Value store over an injected repository.
pub struct ValueStore<R> {
    repo: R,
    converter: SafeValueConverter,
    dialect: Dialect,
    encrypter: Option<Arc<dyn Encrypter>>,
}

impl<R> std::fmt::Debug for ValueStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("converter", &self.converter)
            .field("dialect", &self.dialect)
            .field("encrypted", &self.encrypter.is_some())
            .finish_non_exhaustive()
    }
}

impl<R> ValueStore<R>
where
    R: ValueRepository + DefinitionRepository,
{
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            converter: SafeValueConverter::default(),
            dialect: Dialect::default(),
            encrypter: None,
        }
    }

    /// Converter, dialect and encrypter taken from configuration.
    pub fn from_config(repo: R, config: &FieldsConfig) -> Result<Self> {
        let mut store = Self::new(repo)
            .with_converter(config.converter())
            .with_dialect(config.dialect);
        if let Some(encrypter) = config.encrypter()? {
            store = store.with_encrypter(Arc::new(encrypter));
        }
        Ok(store)
    }

    pub fn with_converter(mut self, converter: SafeValueConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn encrypter_for(&self, field: &FieldDefinition) -> Result<&dyn Encrypter> {
        ValidationEngine::check_encryption(field)?;
        self.encrypter
            .as_deref()
            .ok_or_else(|| FieldsError::encryption(&field.code, "no encryption key configured"))
    }

    /// The stored value of `field` for `entity`, `Null` when never written.
    pub fn get_value(&self, field: &FieldDefinition, entity: &EntityRef) -> Result<StorageValue> {
        let Some(record) = self.repo.find_value(field.id, entity)? else {
            return Ok(StorageValue::Null);
        };
        let value = record.get(field.column());
        if !field.is_encrypted() || value.is_null() {
            return Ok(value);
        }

        let encrypter = self.encrypter_for(field)?;
        Ok(match value {
            StorageValue::Text(s) => StorageValue::Text(decrypt_or_keep(encrypter, field, s)),
            StorageValue::String(s) => StorageValue::String(decrypt_or_keep(encrypter, field, s)),
            other => other,
        })
    }

    /// Values of every active field of the entity's type, keyed by code in
    /// display order.
    pub fn get_values(&self, entity: &EntityRef) -> Result<IndexMap<String, StorageValue>> {
        let fields = self.repo.active_fields(&entity.entity_type, entity.tenant())?;
        let mut values = IndexMap::with_capacity(fields.len());
        for field in &fields {
            values.insert(field.code.clone(), self.get_value(field, entity)?);
        }
        Ok(values)
    }

    /// Convert `raw` and upsert it into the field's column.
    ///
    /// Input that cannot be converted is stored as null and logged. Values
    /// beyond the column's physical bound fail with `ConstraintViolation`.
    pub fn set_value(&self, field: &FieldDefinition, entity: &EntityRef, raw: &Value) -> Result<()> {
        let encrypter = if field.is_encrypted() {
            Some(self.encrypter_for(field)?)
        } else {
            None
        };

        let value = match self.converter.try_to_storage_value(raw, field.type_) {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    field = %field.code,
                    entity = %entity,
                    %error,
                    "conversion failed, storing null"
                );
                StorageValue::Null
            }
        };

        limits_for(field.type_, self.dialect, field.is_encrypted()).check(&field.code, &value)?;

        let value = match (encrypter, value) {
            (Some(enc), StorageValue::Text(s)) => StorageValue::Text(enc.encrypt(&s)?),
            (Some(enc), StorageValue::String(s)) => StorageValue::String(enc.encrypt(&s)?),
            (_, value) => value,
        };
        if field.is_encrypted() {
            // multi-byte plaintext can still outgrow the column once encoded
            limits_for(field.type_, self.dialect, false).check(&field.code, &value)?;
        }

        self.upsert(field, entity, &ValueRecord::from_storage(value))
    }

    fn upsert(&self, field: &FieldDefinition, entity: &EntityRef, record: &ValueRecord) -> Result<()> {
        if self.repo.value_exists(field.id, entity)? {
            self.repo.update_value(field.id, entity, record)?;
            debug!(field = %field.code, entity = %entity, "updated custom field value");
            return Ok(());
        }

        if self.repo.insert_value(field.id, entity, record)? {
            debug!(field = %field.code, entity = %entity, "inserted custom field value");
        } else {
            debug!(
                field = %field.code,
                entity = %entity,
                "value row created concurrently, retrying as update"
            );
            self.repo.update_value(field.id, entity, record)?;
        }
        Ok(())
    }

    /// Authoritative bulk save: every active field of the entity's type is
    /// written, and fields missing from `values` are cleared.
    ///
    /// Per-field failures do not stop the batch; they are returned together as
    /// `BatchFailed`. Structural errors abort immediately.
    pub fn save_all(&self, entity: &EntityRef, values: &HashMap<String, Value>) -> Result<()> {
        let fields = self.repo.active_fields(&entity.entity_type, entity.tenant())?;

        for code in values.keys() {
            if !fields.iter().any(|f| &f.code == code) {
                debug!(code = %code, entity = %entity, "ignoring value for unknown or inactive field");
            }
        }

        let mut failures = Vec::new();
        for field in &fields {
            let raw = values.get(&field.code).unwrap_or(&Value::Null);
            match self.set_value(field, entity, raw) {
                Ok(()) => {}
                Err(error) if error.is_structural() => return Err(error),
                Err(error) => {
                    warn!(field = %field.code, entity = %entity, %error, "failed to save field");
                    failures.push(FieldFailure {
                        code: field.code.clone(),
                        error: Box::new(error),
                    });
                }
            }
        }

        debug!(
            entity = %entity,
            fields = fields.len(),
            failed = failures.len(),
            "saved custom field values"
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FieldsError::BatchFailed { failures })
        }
    }

    /// Remove every value of an owning entity.
    pub fn delete_entity_values(&self, entity: &EntityRef) -> Result<usize> {
        let deleted = self.repo.delete_entity_values(entity)?;
        debug!(entity = %entity, deleted, "deleted custom field values");
        Ok(deleted)
    }
}

/// Legacy rows may hold plaintext; keep them readable.
fn decrypt_or_keep(encrypter: &dyn Encrypter, field: &FieldDefinition, stored: String) -> String {
    match encrypter.decrypt(&stored) {
        Ok(plaintext) => plaintext,
        Err(error) => {
            warn!(field = %field.code, %error, "could not decrypt stored value, returning it as stored");
            stored
        }
    }
}
