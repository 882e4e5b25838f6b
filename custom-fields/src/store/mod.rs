//! Persistence for definitions and EAV value records.
//!
//! The value store talks to storage through [`ValueRepository`] and
//! [`DefinitionRepository`] so hosts can inject their own backend.
//! [`SqliteStore`] is the bundled implementation.

pub mod audit;
pub mod sqlite;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::StorageValue;
use crate::error::Result;
use crate::types::{ColumnKind, FieldDefinition};

pub use audit::ColumnAudit;
pub use sqlite::SqliteStore;

/// The owning entity of a set of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            tenant_id: None,
        }
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tenant_id {
            Some(tenant) => write!(f, "{}#{}@{}", self.entity_type, self.entity_id, tenant),
            None => write!(f, "{}#{}", self.entity_type, self.entity_id),
        }
    }
}

/// One row of `custom_field_values`. At most one slot is populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRecord {
    pub text_value: Option<String>,
    pub string_value: Option<String>,
    pub integer_value: Option<i64>,
    pub float_value: Option<f64>,
    pub boolean_value: Option<bool>,
    pub date_value: Option<NaiveDate>,
    pub datetime_value: Option<NaiveDateTime>,
    pub json_value: Option<Vec<Value>>,
}

impl ValueRecord {
    /// A record holding `value` in its own slot and nothing else.
    pub fn from_storage(value: StorageValue) -> Self {
        let mut record = Self::default();
        match value {
            StorageValue::Null => {}
            StorageValue::Text(s) => record.text_value = Some(s),
            StorageValue::String(s) => record.string_value = Some(s),
            StorageValue::Integer(i) => record.integer_value = Some(i),
            StorageValue::Float(f) => record.float_value = Some(f),
            StorageValue::Boolean(b) => record.boolean_value = Some(b),
            StorageValue::Date(d) => record.date_value = Some(d),
            StorageValue::DateTime(dt) => record.datetime_value = Some(dt),
            StorageValue::Json(items) => record.json_value = Some(items),
        }
        record
    }

    /// Read one slot. Other slots are never consulted.
    pub fn get(&self, column: ColumnKind) -> StorageValue {
        let value = match column {
            ColumnKind::Text => self.text_value.clone().map(StorageValue::Text),
            ColumnKind::String => self.string_value.clone().map(StorageValue::String),
            ColumnKind::Integer => self.integer_value.map(StorageValue::Integer),
            ColumnKind::Float => self.float_value.map(StorageValue::Float),
            ColumnKind::Boolean => self.boolean_value.map(StorageValue::Boolean),
            ColumnKind::Date => self.date_value.map(StorageValue::Date),
            ColumnKind::DateTime => self.datetime_value.map(StorageValue::DateTime),
            ColumnKind::Json => self.json_value.clone().map(StorageValue::Json),
        };
        value.unwrap_or(StorageValue::Null)
    }

    /// Number of populated slots.
    pub fn populated(&self) -> usize {
        ColumnKind::ALL
            .iter()
            .filter(|c| !self.get(**c).is_null())
            .count()
    }
}

/// Storage for value records keyed by `(field, entity)`.
pub trait ValueRepository: Send + Sync {
    fn find_value(&self, field_id: i64, entity: &EntityRef) -> Result<Option<ValueRecord>>;

    /// Whether a row exists, without decoding its slots.
    fn value_exists(&self, field_id: i64, entity: &EntityRef) -> Result<bool>;

    /// Insert a new row. Returns `Ok(false)` when the key already exists.
    fn insert_value(&self, field_id: i64, entity: &EntityRef, record: &ValueRecord)
        -> Result<bool>;

    /// Overwrite every slot of an existing row.
    fn update_value(&self, field_id: i64, entity: &EntityRef, record: &ValueRecord) -> Result<()>;

    /// Remove all values of an owning entity. Returns the number of rows.
    fn delete_entity_values(&self, entity: &EntityRef) -> Result<usize>;
}

/// Read access to field definitions.
pub trait DefinitionRepository: Send + Sync {
    /// Active definitions for an entity type, in display order.
    fn active_fields(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<FieldDefinition>>;
}

impl<T: ValueRepository + ?Sized> ValueRepository for Arc<T> {
    fn find_value(&self, field_id: i64, entity: &EntityRef) -> Result<Option<ValueRecord>> {
        (**self).find_value(field_id, entity)
    }

    fn value_exists(&self, field_id: i64, entity: &EntityRef) -> Result<bool> {
        (**self).value_exists(field_id, entity)
    }

    fn insert_value(
        &self,
        field_id: i64,
        entity: &EntityRef,
        record: &ValueRecord,
    ) -> Result<bool> {
        (**self).insert_value(field_id, entity, record)
    }

    fn update_value(&self, field_id: i64, entity: &EntityRef, record: &ValueRecord) -> Result<()> {
        (**self).update_value(field_id, entity, record)
    }

    fn delete_entity_values(&self, entity: &EntityRef) -> Result<usize> {
        (**self).delete_entity_values(entity)
    }
}

impl<T: DefinitionRepository + ?Sized> DefinitionRepository for Arc<T> {
    fn active_fields(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<FieldDefinition>> {
        (**self).active_fields(entity_type, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_populates_exactly_one_slot() {
        let record = ValueRecord::from_storage(StorageValue::Json(vec![json!("a")]));
        assert_eq!(record.populated(), 1);
        assert_eq!(record.get(ColumnKind::Json), StorageValue::Json(vec![json!("a")]));
        assert_eq!(record.get(ColumnKind::Text), StorageValue::Null);

        assert_eq!(ValueRecord::from_storage(StorageValue::Null).populated(), 0);
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::new("company", "7").to_string(), "company#7");
        assert_eq!(
            EntityRef::new("company", "7").for_tenant("acme").to_string(),
            "company#7@acme"
        );
    }
}
