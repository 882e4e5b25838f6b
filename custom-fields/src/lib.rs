//! Typed value store and validation-rule resolution for custom fields
//!
//! `custom-fields` lets a host attach administrator-defined, typed fields to
//! any entity without a schema migration per field. Values live in an
//! entity-attribute-value table with one column per storage kind.
//!
//! # Architecture
//!
//! - **Registry**: every [`FieldType`] maps to exactly one [`ColumnKind`]
//! - **Converter**: untrusted input becomes a column-safe [`StorageValue`];
//!   numeric overflow clamps, malformed data becomes null
//! - **Catalog**: physical column limits per [`Dialect`], expressed as rules
//! - **Merge**: user rules and catalog rules combine, stricter bound wins
//! - **Value store**: find-or-create upserts through an injected repository,
//!   with optional encryption of text-like values
//!
//! Hosts consume two contracts: [`SafeValueConverter::to_storage_value`] and
//! [`ValidationEngine::effective_rules`].

pub mod config;
pub mod constraints;
pub mod convert;
pub mod crypto;
pub mod error;
pub mod lookup;
pub mod registry;
pub mod rules;
pub mod seed;
pub mod store;
pub mod types;
pub mod validation;
pub mod values;

pub use config::FieldsConfig;
pub use constraints::{as_rules, limits_for, ConstraintSet, Dialect};
pub use convert::{to_storage_value, ConversionError, SafeValueConverter, StorageValue};
pub use crypto::{AesGcmEncrypter, Encrypter};
pub use error::{FieldFailure, FieldsError, Result};
pub use lookup::{LookupRegistry, TitleResolvable};
pub use registry::{column_for, is_multi_valued, is_optionable};
pub use rules::{merge, RuleSpec};
pub use seed::{FieldSeed, SeedReport};
pub use store::{
    ColumnAudit, DefinitionRepository, EntityRef, SqliteStore, ValueRecord, ValueRepository,
};
pub use types::{
    ColumnKind, FieldDefinition, FieldOption, FieldSection, FieldSettings, FieldType, NewField,
};
pub use validation::{is_required, ValidationEngine};
pub use values::ValueStore;
