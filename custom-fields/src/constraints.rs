//! Database constraint catalog.
//!
//! Physical limits of each storage column per SQL dialect, expressed in the
//! same [`RuleSpec`] vocabulary as user-declared rules so the merge can treat
//! both sides alike.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::convert::StorageValue;
use crate::error::{FieldsError, Result};
use crate::rules::RuleSpec;
use crate::types::{ColumnKind, FieldType};

/// Maximum length of the `string_value` column.
pub const STRING_MAX_LENGTH: u64 = 255;

/// Total digits of the `float_value` decimal column.
pub const DECIMAL_PRECISION: u32 = 30;

/// Fractional digits of the `float_value` decimal column.
pub const DECIMAL_SCALE: u32 = 15;

/// Storage engine family.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    #[default]
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Longest value the `text_value` column can hold.
    pub fn text_max_length(&self) -> u64 {
        match self {
            Dialect::MySql => 65_535,
            Dialect::Postgres => 1_073_741_823,
            Dialect::Sqlite => 1_000_000_000,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pgsql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(FieldsError::InvalidSetting {
                key: "dialect".into(),
                message: format!("unknown storage dialect '{other}'"),
            }),
        }
    }
}

/// Physical bounds for one field type in one dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintSet {
    pub column: ColumnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
    /// `(precision, scale)` of a decimal column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
}

impl ConstraintSet {
    fn new(column: ColumnKind) -> Self {
        Self {
            column,
            max_length: None,
            min_value: None,
            max_value: None,
            decimal: None,
            max_items: None,
        }
    }

    /// Last line of defence before a write: reject values the column cannot
    /// physically hold.
    pub fn check(&self, field: &str, value: &StorageValue) -> Result<()> {
        match value {
            StorageValue::Text(s) | StorageValue::String(s) => {
                if let Some(max) = self.max_length {
                    let len = s.chars().count() as u64;
                    if len > max {
                        return Err(FieldsError::constraint(
                            field,
                            format!("length {len} exceeds column limit {max}"),
                        ));
                    }
                }
            }
            StorageValue::Float(f) => {
                let limit = self
                    .max_value
                    .as_deref()
                    .and_then(|m| m.parse::<f64>().ok());
                if let Some(limit) = limit {
                    if f.abs() > limit {
                        return Err(FieldsError::constraint(
                            field,
                            format!("{f} exceeds decimal({DECIMAL_PRECISION},{DECIMAL_SCALE})"),
                        ));
                    }
                }
            }
            StorageValue::Json(items) => {
                if let Some(max) = self.max_items {
                    if items.len() > max as usize {
                        return Err(FieldsError::constraint(
                            field,
                            format!("{} items exceed the limit of {max}", items.len()),
                        ));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Base item limit for multi-valued types.
pub fn base_max_items(type_: FieldType) -> Option<u32> {
    match type_ {
        FieldType::CheckboxList | FieldType::ToggleButtons => Some(50),
        FieldType::MultiSelect => Some(100),
        FieldType::TagsInput => Some(200),
        FieldType::Text
        | FieldType::Textarea
        | FieldType::RichEditor
        | FieldType::MarkdownEditor
        | FieldType::Link
        | FieldType::ColorPicker
        | FieldType::Number
        | FieldType::Currency
        | FieldType::Select
        | FieldType::Radio
        | FieldType::Checkbox
        | FieldType::Toggle
        | FieldType::Date
        | FieldType::DateTime => None,
    }
}

/// Ciphertext overhead leaves room for three quarters of the items, rounded up.
pub fn encrypted_item_limit(base: u32) -> u32 {
    (base * 3).div_ceil(4)
}

/// AES-GCM nonce and tag carried by every ciphertext before base64 encoding.
const CIPHERTEXT_OVERHEAD: u64 = 12 + 16;

/// Plaintext bytes whose base64 ciphertext still fits `column_max` characters.
pub fn encrypted_length_limit(column_max: u64) -> u64 {
    (column_max / 4 * 3).saturating_sub(CIPHERTEXT_OVERHEAD)
}

/// Largest magnitude the decimal column holds, e.g. `999…9.999…9`.
pub fn decimal_max() -> String {
    let integer_digits = (DECIMAL_PRECISION - DECIMAL_SCALE) as usize;
    format!(
        "{}.{}",
        "9".repeat(integer_digits),
        "9".repeat(DECIMAL_SCALE as usize)
    )
}

/// Physical limits for a field type in a dialect.
pub fn limits_for(type_: FieldType, dialect: Dialect, encrypted: bool) -> ConstraintSet {
    let column = type_.column();
    let mut set = ConstraintSet::new(column);
    match column {
        ColumnKind::String | ColumnKind::Text => {
            let column_max = if column == ColumnKind::String {
                STRING_MAX_LENGTH
            } else {
                dialect.text_max_length()
            };
            set.max_length = Some(if encrypted {
                encrypted_length_limit(column_max)
            } else {
                column_max
            });
        }
        ColumnKind::Integer => {
            set.min_value = Some(i64::MIN.to_string());
            set.max_value = Some(i64::MAX.to_string());
        }
        ColumnKind::Float => {
            let max = decimal_max();
            set.min_value = Some(format!("-{max}"));
            set.max_value = Some(max);
            set.decimal = Some((DECIMAL_PRECISION, DECIMAL_SCALE));
        }
        ColumnKind::Json => {
            set.max_items = base_max_items(type_).map(|base| {
                if encrypted {
                    encrypted_item_limit(base)
                } else {
                    base
                }
            });
        }
        ColumnKind::Boolean | ColumnKind::Date | ColumnKind::DateTime => {}
    }
    set
}

/// Express a constraint set as validation rules.
pub fn as_rules(set: &ConstraintSet) -> Vec<RuleSpec> {
    let mut rules = Vec::new();
    match set.column {
        ColumnKind::Text | ColumnKind::String => rules.push(RuleSpec::flag("string")),
        ColumnKind::Integer => rules.push(RuleSpec::flag("integer")),
        ColumnKind::Float => rules.push(RuleSpec::flag("numeric")),
        ColumnKind::Boolean => rules.push(RuleSpec::flag("boolean")),
        ColumnKind::Date | ColumnKind::DateTime => rules.push(RuleSpec::flag("date")),
        ColumnKind::Json => rules.push(RuleSpec::flag("array")),
    }
    if let Some(max) = set.max_length {
        rules.push(RuleSpec::with_param("max", max));
    }
    if let Some(min) = &set.min_value {
        rules.push(RuleSpec::with_param("min", min));
    }
    if let Some(max) = &set.max_value {
        rules.push(RuleSpec::with_param("max", max));
    }
    if let Some((_, scale)) = set.decimal {
        rules.push(RuleSpec::new("decimal", ["0".to_string(), scale.to_string()]));
    }
    if let Some(items) = set.max_items {
        rules.push(RuleSpec::with_param("max", items));
    }
    rules
}

/// Column type the catalog recommends for a value column in a dialect.
pub fn recommended_column_type(column: ColumnKind, dialect: Dialect) -> &'static str {
    match (column, dialect) {
        (ColumnKind::Text, Dialect::MySql) => "LONGTEXT",
        (ColumnKind::Text, _) => "TEXT",
        (ColumnKind::String, _) => "VARCHAR(255)",
        (ColumnKind::Integer, Dialect::Sqlite) => "INTEGER",
        (ColumnKind::Integer, _) => "BIGINT",
        (ColumnKind::Float, Dialect::MySql) => "DECIMAL(30,15)",
        (ColumnKind::Float, Dialect::Postgres) => "NUMERIC(30,15)",
        (ColumnKind::Float, Dialect::Sqlite) => "REAL",
        (ColumnKind::Boolean, Dialect::MySql) => "TINYINT(1)",
        (ColumnKind::Boolean, _) => "BOOLEAN",
        (ColumnKind::Date, _) => "DATE",
        (ColumnKind::DateTime, Dialect::Postgres) => "TIMESTAMP",
        (ColumnKind::DateTime, _) => "DATETIME",
        (ColumnKind::Json, Dialect::Postgres) => "JSONB",
        (ColumnKind::Json, Dialect::MySql) => "JSON",
        (ColumnKind::Json, Dialect::Sqlite) => "TEXT",
    }
}
