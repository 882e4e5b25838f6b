//! Safe value conversion.
//!
//! Turns untrusted input into exactly the representation the target storage
//! column needs. Numeric and collection paths never fail: out-of-range
//! integers are clamped and unusable input becomes [`StorageValue::Null`].
//! Malformed date, datetime and boolean input is logged and stored as null;
//! [`SafeValueConverter::try_to_storage_value`] reports it as a
//! [`ConversionError`] instead.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::FieldsConfig;
use crate::types::{ColumnKind, FieldType};

/// Default `date_value` input format.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default `datetime_value` input format.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Plain decimal or scientific notation, nothing else (no `inf`, `NaN`, hex).
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());

static INTEGER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

/// 2^63 as f64; the first float past `i64::MAX`.
const I64_UPPER_F64: f64 = 9_223_372_036_854_775_808.0;

/// A value ready to be written to one storage column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "column", content = "value", rename_all = "snake_case")]
pub enum StorageValue {
    Null,
    Text(String),
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(Vec<Value>),
}

impl StorageValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }

    /// The column this value belongs in, `None` for null.
    pub fn column(&self) -> Option<ColumnKind> {
        match self {
            StorageValue::Null => None,
            StorageValue::Text(_) => Some(ColumnKind::Text),
            StorageValue::String(_) => Some(ColumnKind::String),
            StorageValue::Integer(_) => Some(ColumnKind::Integer),
            StorageValue::Float(_) => Some(ColumnKind::Float),
            StorageValue::Boolean(_) => Some(ColumnKind::Boolean),
            StorageValue::Date(_) => Some(ColumnKind::Date),
            StorageValue::DateTime(_) => Some(ColumnKind::DateTime),
            StorageValue::Json(_) => Some(ColumnKind::Json),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageValue::Text(s) | StorageValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON rendering for collaborators that do not care about columns.
    pub fn to_json(&self) -> Value {
        match self {
            StorageValue::Null => Value::Null,
            StorageValue::Text(s) | StorageValue::String(s) => Value::String(s.clone()),
            StorageValue::Integer(i) => Value::from(*i),
            StorageValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            StorageValue::Boolean(b) => Value::Bool(*b),
            StorageValue::Date(d) => Value::String(d.format(DEFAULT_DATE_FORMAT).to_string()),
            StorageValue::DateTime(dt) => {
                Value::String(dt.format(DEFAULT_DATETIME_FORMAT).to_string())
            }
            StorageValue::Json(items) => Value::Array(items.clone()),
        }
    }

    /// The raw stored ids/values for option or lookup resolution.
    pub fn raw_ids(&self) -> Vec<String> {
        match self {
            StorageValue::Null => Vec::new(),
            StorageValue::Integer(i) => vec![i.to_string()],
            StorageValue::Text(s) | StorageValue::String(s) => vec![s.clone()],
            StorageValue::Json(items) => items.iter().map(scalar_to_string).collect(),
            other => vec![scalar_to_string(&other.to_json())],
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Raw input could not be coerced into the target column.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {input} to {column}: {reason}")]
pub struct ConversionError {
    pub column: ColumnKind,
    pub input: String,
    pub reason: String,
}

impl ConversionError {
    fn new(column: ColumnKind, input: &Value, reason: impl Into<String>) -> Self {
        Self {
            column,
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Converts raw input for a field type into a [`StorageValue`].
#[derive(Debug, Clone)]
pub struct SafeValueConverter {
    date_format: String,
    datetime_format: String,
}

impl Default for SafeValueConverter {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT)
    }
}

impl SafeValueConverter {
    pub fn new(date_format: impl Into<String>, datetime_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
            datetime_format: datetime_format.into(),
        }
    }

    pub fn from_config(config: &FieldsConfig) -> Self {
        Self::new(config.date_format.clone(), config.datetime_format.clone())
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    /// Convert `raw` into the column representation for `type_`.
    ///
    /// Never fails: input the column cannot represent is logged and becomes
    /// `Null`.
    pub fn to_storage_value(&self, raw: &Value, type_: FieldType) -> StorageValue {
        self.try_to_storage_value(raw, type_).unwrap_or_else(|error| {
            warn!(field_type = %type_, %error, "malformed input, storing null");
            StorageValue::Null
        })
    }

    /// Strict variant of [`to_storage_value`](Self::to_storage_value):
    /// malformed date, datetime and boolean input is an error.
    pub fn try_to_storage_value(
        &self,
        raw: &Value,
        type_: FieldType,
    ) -> Result<StorageValue, ConversionError> {
        let column = type_.column();
        let value = match column {
            ColumnKind::Integer => to_integer(raw).map_or(StorageValue::Null, StorageValue::Integer),
            ColumnKind::Float => to_float(raw).map_or(StorageValue::Null, StorageValue::Float),
            ColumnKind::Json => to_list(raw).map_or(StorageValue::Null, StorageValue::Json),
            ColumnKind::Boolean => {
                to_boolean(raw)?.map_or(StorageValue::Null, StorageValue::Boolean)
            }
            ColumnKind::Date => self.to_date(raw)?.map_or(StorageValue::Null, StorageValue::Date),
            ColumnKind::DateTime => self
                .to_datetime(raw)?
                .map_or(StorageValue::Null, StorageValue::DateTime),
            ColumnKind::Text => to_text(raw).map_or(StorageValue::Null, StorageValue::Text),
            ColumnKind::String => to_text(raw).map_or(StorageValue::Null, StorageValue::String),
        };
        Ok(value)
    }

    fn to_date(&self, raw: &Value) -> Result<Option<NaiveDate>, ConversionError> {
        match raw {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), &self.date_format)
                .map(Some)
                .map_err(|e| {
                    ConversionError::new(
                        ColumnKind::Date,
                        raw,
                        format!("expected format {}: {e}", self.date_format),
                    )
                }),
            _ => Err(ConversionError::new(ColumnKind::Date, raw, "expected a date string")),
        }
    }

    fn to_datetime(&self, raw: &Value) -> Result<Option<NaiveDateTime>, ConversionError> {
        match raw {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), &self.datetime_format)
                .map(Some)
                .map_err(|e| {
                    ConversionError::new(
                        ColumnKind::DateTime,
                        raw,
                        format!("expected format {}: {e}", self.datetime_format),
                    )
                }),
            _ => Err(ConversionError::new(
                ColumnKind::DateTime,
                raw,
                "expected a datetime string",
            )),
        }
    }
}

/// Convert with the default date formats.
pub fn to_storage_value(raw: &Value, type_: FieldType) -> StorageValue {
    SafeValueConverter::default().to_storage_value(raw, type_)
}

/// Integer path. Clamps to i64 bounds, truncates fractions, `None` for
/// anything non-numeric.
pub fn to_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if n.as_u64().is_some() {
                warn!(input = %n, clamped = i64::MAX, "integer value exceeds i64 range, clamping");
                Some(i64::MAX)
            } else {
                n.as_f64().and_then(float_to_i64)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if !NUMERIC.is_match(s) {
                return None;
            }
            if let Ok(i) = s.parse::<i64>() {
                return Some(i);
            }
            if INTEGER_LITERAL.is_match(s) {
                let clamped = if s.starts_with('-') { i64::MIN } else { i64::MAX };
                warn!(input = %s, clamped, "integer value exceeds i64 range, clamping");
                return Some(clamped);
            }
            s.parse::<f64>().ok().and_then(float_to_i64)
        }
        _ => None,
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_UPPER_F64 {
        warn!(input = f, clamped = i64::MAX, "integer value exceeds i64 range, clamping");
        return Some(i64::MAX);
    }
    if f < -I64_UPPER_F64 {
        warn!(input = f, clamped = i64::MIN, "integer value exceeds i64 range, clamping");
        return Some(i64::MIN);
    }
    Some(f.trunc() as i64)
}

/// Float path. No clamping; non-numeric and non-finite input is `None`.
pub fn to_float(raw: &Value) -> Option<f64> {
    let f = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if NUMERIC.is_match(s) {
                s.parse::<f64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }?;
    if f.is_finite() {
        Some(f)
    } else {
        warn!(input = %raw, "float value is not finite, storing null");
        None
    }
}

/// Json path. Arrays pass through, JSON strings decode, plain strings split on
/// commas, other scalars are wrapped. Empty input is `None`.
pub fn to_list(raw: &Value) -> Option<Vec<Value>> {
    let items = match raw {
        Value::Null => return None,
        Value::Array(items) => items.clone(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match decode_json_collection(s) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) => return None,
                Some(other) => vec![other],
                None => s
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            }
        }
        other => vec![other.clone()],
    };
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn decode_json_collection(s: &str) -> Option<Value> {
    if s.starts_with('[') || s.starts_with('{') {
        serde_json::from_str(s).ok()
    } else {
        None
    }
}

fn to_boolean(raw: &Value) -> Result<Option<bool>, ConversionError> {
    match raw {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(ConversionError::new(ColumnKind::Boolean, raw, "expected 0 or 1")),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConversionError::new(
                ColumnKind::Boolean,
                raw,
                "expected a boolean word",
            )),
        },
        _ => Err(ConversionError::new(ColumnKind::Boolean, raw, "expected a boolean")),
    }
}

fn to_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        structured => Some(structured.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn convert(raw: Value, type_: FieldType) -> StorageValue {
        SafeValueConverter::default()
            .try_to_storage_value(&raw, type_)
            .unwrap()
    }

    #[test]
    fn integer_accepts_numbers_and_numeric_strings() {
        assert_eq!(convert(json!(42), FieldType::Number), StorageValue::Integer(42));
        assert_eq!(convert(json!("42"), FieldType::Number), StorageValue::Integer(42));
        assert_eq!(convert(json!(" -7 "), FieldType::Number), StorageValue::Integer(-7));
        assert_eq!(convert(json!("1.5e3"), FieldType::Number), StorageValue::Integer(1500));
        assert_eq!(convert(json!("12.9"), FieldType::Number), StorageValue::Integer(12));
        assert_eq!(convert(json!(-12.9), FieldType::Number), StorageValue::Integer(-12));
    }

    #[test]
    fn integer_clamps_out_of_range() {
        assert_eq!(
            convert(json!(u64::MAX), FieldType::Number),
            StorageValue::Integer(i64::MAX)
        );
        assert_eq!(
            convert(json!("99999999999999999999999"), FieldType::Number),
            StorageValue::Integer(i64::MAX)
        );
        assert_eq!(
            convert(json!("-99999999999999999999999"), FieldType::Number),
            StorageValue::Integer(i64::MIN)
        );
        assert_eq!(
            convert(json!("1e30"), FieldType::Number),
            StorageValue::Integer(i64::MAX)
        );
        assert_eq!(
            convert(json!(-1e300), FieldType::Number),
            StorageValue::Integer(i64::MIN)
        );
        assert_eq!(
            convert(json!("1e400"), FieldType::Number),
            StorageValue::Integer(i64::MAX)
        );
    }

    #[test]
    fn integer_non_numeric_is_null() {
        for raw in [json!("abc"), json!("inf"), json!("NaN"), json!("0x10"), json!(""), json!(true), json!(null), json!([1])] {
            assert_eq!(convert(raw.clone(), FieldType::Number), StorageValue::Null, "{raw}");
        }
    }

    #[test]
    fn select_stores_option_id_as_integer() {
        assert_eq!(convert(json!("3"), FieldType::Select), StorageValue::Integer(3));
        assert_eq!(convert(json!(3), FieldType::Radio), StorageValue::Integer(3));
    }

    #[test]
    fn float_path() {
        assert_eq!(convert(json!("19.99"), FieldType::Currency), StorageValue::Float(19.99));
        assert_eq!(convert(json!(2), FieldType::Currency), StorageValue::Float(2.0));
        assert_eq!(convert(json!("2.5E2"), FieldType::Currency), StorageValue::Float(250.0));
        assert_eq!(convert(json!("cheap"), FieldType::Currency), StorageValue::Null);
        assert_eq!(convert(json!("1e400"), FieldType::Currency), StorageValue::Null);
    }

    #[test]
    fn tags_from_string_and_array_agree() {
        let expected = StorageValue::Json(vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(convert(json!("a,b,c"), FieldType::TagsInput), expected);
        assert_eq!(convert(json!(["a", "b", "c"]), FieldType::TagsInput), expected);
        assert_eq!(convert(json!(" a , b,,c "), FieldType::TagsInput), expected);
        assert_eq!(convert(json!(r#"["a","b","c"]"#), FieldType::TagsInput), expected);
    }

    #[test]
    fn json_path_edge_cases() {
        assert_eq!(convert(json!(null), FieldType::MultiSelect), StorageValue::Null);
        assert_eq!(convert(json!(""), FieldType::MultiSelect), StorageValue::Null);
        assert_eq!(convert(json!([]), FieldType::MultiSelect), StorageValue::Null);
        assert_eq!(convert(json!("[]"), FieldType::MultiSelect), StorageValue::Null);
        assert_eq!(
            convert(json!(7), FieldType::CheckboxList),
            StorageValue::Json(vec![json!(7)])
        );
        assert_eq!(
            convert(json!("solo"), FieldType::ToggleButtons),
            StorageValue::Json(vec![json!("solo")])
        );
        assert_eq!(
            convert(json!([1, "2", {"x": 3}]), FieldType::MultiSelect),
            StorageValue::Json(vec![json!(1), json!("2"), json!({"x": 3})])
        );
        // broken JSON falls back to comma splitting
        assert_eq!(
            convert(json!("[a,b"), FieldType::TagsInput),
            StorageValue::Json(vec![json!("[a"), json!("b")])
        );
    }

    #[test]
    fn boolean_path() {
        assert_eq!(convert(json!(true), FieldType::Toggle), StorageValue::Boolean(true));
        assert_eq!(convert(json!("yes"), FieldType::Checkbox), StorageValue::Boolean(true));
        assert_eq!(convert(json!("OFF"), FieldType::Checkbox), StorageValue::Boolean(false));
        assert_eq!(convert(json!(0), FieldType::Checkbox), StorageValue::Boolean(false));
        assert_eq!(convert(json!(""), FieldType::Checkbox), StorageValue::Null);
        let strict = SafeValueConverter::default();
        assert!(strict.try_to_storage_value(&json!("maybe"), FieldType::Checkbox).is_err());
        assert!(strict.try_to_storage_value(&json!(2), FieldType::Toggle).is_err());
    }

    #[test]
    fn malformed_input_becomes_null() {
        assert_eq!(to_storage_value(&json!("maybe"), FieldType::Checkbox), StorageValue::Null);
        assert_eq!(to_storage_value(&json!(2), FieldType::Toggle), StorageValue::Null);
        assert_eq!(to_storage_value(&json!("29/02/2024"), FieldType::Date), StorageValue::Null);
        assert_eq!(to_storage_value(&json!(20240229), FieldType::Date), StorageValue::Null);
        assert_eq!(
            to_storage_value(&json!("yesterday"), FieldType::DateTime),
            StorageValue::Null
        );
    }

    #[test]
    fn date_paths_use_configured_format() {
        assert_eq!(
            convert(json!("2024-02-29"), FieldType::Date),
            StorageValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        let err = SafeValueConverter::default()
            .try_to_storage_value(&json!("29/02/2024"), FieldType::Date)
            .unwrap_err();
        assert_eq!(err.column, ColumnKind::Date);

        let european = SafeValueConverter::new("%d/%m/%Y", "%d/%m/%Y %H:%M");
        assert_eq!(
            european.to_storage_value(&json!("29/02/2024"), FieldType::Date),
            StorageValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(
            european.to_storage_value(&json!("01/03/2024 09:30"), FieldType::DateTime),
            StorageValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap()
            )
        );
        assert!(SafeValueConverter::default()
            .try_to_storage_value(&json!(20240229), FieldType::Date)
            .is_err());
        assert_eq!(convert(json!(null), FieldType::DateTime), StorageValue::Null);
    }

    #[test]
    fn text_and_string_paths() {
        assert_eq!(
            convert(json!("hello"), FieldType::Textarea),
            StorageValue::Text("hello".into())
        );
        assert_eq!(
            convert(json!("https://example.com"), FieldType::Link),
            StorageValue::String("https://example.com".into())
        );
        assert_eq!(convert(json!(12), FieldType::Text), StorageValue::Text("12".into()));
        assert_eq!(
            convert(json!({"a": 1}), FieldType::RichEditor),
            StorageValue::Text(r#"{"a":1}"#.into())
        );
        assert_eq!(convert(json!(""), FieldType::ColorPicker), StorageValue::Null);
    }

    #[test]
    fn converted_value_lands_in_registry_column() {
        let samples = [json!("1"), json!("a,b"), json!(true), json!("2024-01-01"), json!("2024-01-01 10:00:00")];
        for t in FieldType::ALL {
            for raw in &samples {
                if let Some(column) = to_storage_value(raw, t).column() {
                    assert_eq!(column, t.column(), "{t} {raw}");
                }
            }
        }
    }

    #[test]
    fn raw_ids() {
        assert_eq!(StorageValue::Integer(4).raw_ids(), vec!["4"]);
        assert_eq!(
            StorageValue::Json(vec![json!(1), json!("two")]).raw_ids(),
            vec!["1", "two"]
        );
        assert!(StorageValue::Null.raw_ids().is_empty());
    }

    proptest! {
        #[test]
        fn in_range_integers_round_trip(x in any::<i64>()) {
            prop_assert_eq!(convert(json!(x), FieldType::Number), StorageValue::Integer(x));
            prop_assert_eq!(convert(json!(x.to_string()), FieldType::Number), StorageValue::Integer(x));
        }

        #[test]
        fn above_range_integers_clamp_to_max(x in (i64::MAX as u64 + 1)..=u64::MAX) {
            prop_assert_eq!(convert(json!(x), FieldType::Number), StorageValue::Integer(i64::MAX));
            let big = format!("{x}000");
            prop_assert_eq!(convert(json!(big), FieldType::Number), StorageValue::Integer(i64::MAX));
        }

        #[test]
        fn alphabetic_strings_are_null(s in "[a-zA-Z][a-zA-Z ]{0,20}") {
            prop_assert_eq!(convert(json!(s), FieldType::Number), StorageValue::Null);
        }
    }
}
