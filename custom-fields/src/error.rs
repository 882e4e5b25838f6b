//! Error types for the custom fields core

use thiserror::Error;

use crate::convert::ConversionError;

/// Result type for custom field operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Errors that can occur in custom field operations
#[derive(Debug, Error)]
pub enum FieldsError {
    /// A field type name has no registered column mapping
    #[error("unsupported field type: {name}")]
    UnsupportedFieldType { name: String },

    /// Raw input could not be coerced into the target column
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A value exceeds a physical column bound
    #[error("constraint violation on field '{field}': {message}")]
    ConstraintViolation { field: String, message: String },

    /// Encryption requested where it cannot be applied
    #[error("encryption misconfigured on field '{field}': {reason}")]
    EncryptionMisconfiguration { field: String, reason: String },

    /// Field code already taken within its entity type and tenant
    #[error("duplicate field code '{code}' for entity type '{entity_type}'")]
    DuplicateFieldCode { entity_type: String, code: String },

    /// Field definition not found by id
    #[error("field not found: {id}")]
    FieldNotFound { id: i64 },

    /// Field definition not found by code
    #[error("field not found: {entity_type}.{code}")]
    FieldCodeNotFound { entity_type: String, code: String },

    /// Section not found by id
    #[error("section not found: {id}")]
    SectionNotFound { id: i64 },

    /// Rule string could not be parsed at the boundary
    #[error("invalid rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    /// A configuration value is out of range or unknown
    #[error("invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    /// Encrypting or decrypting a value failed
    #[error("crypto error: {message}")]
    Crypto { message: String },

    /// One or more fields in a bulk save failed hard
    #[error("{} field(s) failed to save: {}", .failures.len(), failure_codes(.failures))]
    BatchFailed { failures: Vec<FieldFailure> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

/// A single field that failed during a bulk save.
#[derive(Debug)]
pub struct FieldFailure {
    pub code: String,
    pub error: Box<FieldsError>,
}

fn failure_codes(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(|f| f.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FieldsError {
    /// Create an unsupported field type error
    pub fn unsupported_type(name: impl Into<String>) -> Self {
        Self::UnsupportedFieldType { name: name.into() }
    }

    /// Create a constraint violation error
    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an encryption misconfiguration error
    pub fn encryption(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EncryptionMisconfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Structural errors abort the operation that raised them; everything else
    /// is scoped to a single field.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFieldType { .. }
                | Self::EncryptionMisconfiguration { .. }
                | Self::DuplicateFieldCode { .. }
        )
    }
}

impl From<figment::Error> for FieldsError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldsError::unsupported_type("signature");
        assert_eq!(err.to_string(), "unsupported field type: signature");
    }

    #[test]
    fn test_duplicate_code_display() {
        let err = FieldsError::DuplicateFieldCode {
            entity_type: "company".into(),
            code: "industry".into(),
        };
        assert!(err.to_string().contains("industry"));
        assert!(err.to_string().contains("company"));
    }

    #[test]
    fn test_batch_failed_lists_codes() {
        let err = FieldsError::BatchFailed {
            failures: vec![
                FieldFailure {
                    code: "summary".into(),
                    error: Box::new(FieldsError::constraint("summary", "too long")),
                },
                FieldFailure {
                    code: "website".into(),
                    error: Box::new(FieldsError::constraint("website", "too long")),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 field(s) failed to save: summary, website"
        );
    }

    #[test]
    fn test_structural_classification() {
        assert!(FieldsError::unsupported_type("x").is_structural());
        assert!(FieldsError::encryption("x", "not encryptable").is_structural());
        assert!(!FieldsError::constraint("x", "too long").is_structural());
    }
}
