//! Configuration for the custom fields core, loaded with figment.
//!
//! Sources, later overriding earlier:
//! 1. Built-in defaults
//! 2. An optional TOML, YAML or JSON file
//! 3. `CUSTOM_FIELDS_*` environment variables

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraints::Dialect;
use crate::convert::{SafeValueConverter, DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT};
use crate::crypto::AesGcmEncrypter;
use crate::error::{FieldsError, Result};

/// Environment variable prefix, e.g. `CUSTOM_FIELDS_DIALECT=postgres`.
pub const ENV_PREFIX: &str = "CUSTOM_FIELDS_";

/// Default SQLite database filename.
pub const DEFAULT_DATABASE_PATH: &str = "custom-fields.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldsConfig {
    /// Dialect whose column limits feed validation.
    pub dialect: Dialect,
    pub database_path: PathBuf,
    /// chrono format used to parse `date` input.
    pub date_format: String,
    /// chrono format used to parse `date-time` input.
    pub datetime_format: String,
    /// Base64 encoded 32-byte key for encrypted fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            encryption_key: None,
        }
    }
}

impl FieldsConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: FieldsConfig = Self::figment(file).extract()?;
        config.validate()?;
        debug!(
            dialect = %config.dialect,
            database = %config.database_path.display(),
            encrypted = config.encryption_key.is_some(),
            "loaded custom fields configuration"
        );
        Ok(config)
    }

    /// Build the figment with all sources in precedence order.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FieldsConfig::default()));

        if let Some(path) = file {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    fn validate(&self) -> Result<()> {
        if self.date_format.trim().is_empty() {
            return Err(FieldsError::InvalidSetting {
                key: "date_format".into(),
                message: "must not be empty".into(),
            });
        }
        if self.datetime_format.trim().is_empty() {
            return Err(FieldsError::InvalidSetting {
                key: "datetime_format".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn converter(&self) -> SafeValueConverter {
        SafeValueConverter::from_config(self)
    }

    /// The configured encrypter, if a key is set.
    pub fn encrypter(&self) -> Result<Option<AesGcmEncrypter>> {
        self.encryption_key
            .as_deref()
            .map(AesGcmEncrypter::from_base64_key)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn defaults_without_sources() {
        let config = FieldsConfig::load(None).unwrap();
        assert_eq!(config, FieldsConfig::default());
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert!(config.encrypter().unwrap().is_none());
    }

    #[test]
    #[serial]
    fn toml_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fields.toml");
        fs::write(
            &path,
            "dialect = \"mysql\"\ndate_format = \"%d/%m/%Y\"\n",
        )
        .unwrap();

        let config = FieldsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.dialect, Dialect::MySql);
        assert_eq!(config.date_format, "%d/%m/%Y");
        assert_eq!(config.datetime_format, DEFAULT_DATETIME_FORMAT);
    }

    #[test]
    #[serial]
    fn yaml_file_is_detected_by_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fields.yaml");
        fs::write(&path, "dialect: postgres\ndatabase_path: /var/lib/fields.db\n").unwrap();

        let config = FieldsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.database_path, PathBuf::from("/var/lib/fields.db"));
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fields.toml");
        fs::write(&path, "dialect = \"mysql\"\n").unwrap();

        std::env::set_var("CUSTOM_FIELDS_DIALECT", "postgres");
        let config = FieldsConfig::load(Some(&path));
        std::env::remove_var("CUSTOM_FIELDS_DIALECT");

        assert_eq!(config.unwrap().dialect, Dialect::Postgres);
    }

    #[test]
    #[serial]
    fn empty_date_format_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fields.toml");
        fs::write(&path, "date_format = \"\"\n").unwrap();

        let result = FieldsConfig::load(Some(&path));
        assert!(matches!(result, Err(FieldsError::InvalidSetting { .. })));
    }

    #[test]
    #[serial]
    fn unknown_dialect_fails_to_load() {
        std::env::set_var("CUSTOM_FIELDS_DIALECT", "oracle");
        let result = FieldsConfig::load(None);
        std::env::remove_var("CUSTOM_FIELDS_DIALECT");

        assert!(matches!(result, Err(FieldsError::Config(_))));
    }
}
