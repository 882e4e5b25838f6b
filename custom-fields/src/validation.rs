//! Effective validation rules for a field definition.
//!
//! The rules a host validates against are the merge of what the administrator
//! declared and what the storage column can physically hold. Encryption
//! misconfiguration is caught here, before anything is written.

use crate::constraints::{as_rules, limits_for, Dialect};
use crate::error::{FieldsError, Result};
use crate::rules::{contains_rule, merge, RuleSpec};
use crate::types::{FieldDefinition, FieldType};

/// True iff the field declares a `required` rule. Parameters and other rules
/// are irrelevant.
pub fn is_required(field: &FieldDefinition) -> bool {
    contains_rule(&field.validation_rules, "required")
}

/// Resolves effective rules against one storage dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine {
    dialect: Dialect,
}

impl ValidationEngine {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Reject encryption on types whose column cannot hold ciphertext.
    pub fn check_encryption(field: &FieldDefinition) -> Result<()> {
        Self::check_encryption_of(&field.code, field.type_, field.is_encrypted())
    }

    /// Same check for a definition that is not stored yet.
    pub fn check_encryption_of(code: &str, type_: FieldType, encrypted: bool) -> Result<()> {
        if encrypted && !type_.is_encryptable() {
            return Err(FieldsError::encryption(
                code,
                format!("field type '{type_}' cannot be encrypted"),
            ));
        }
        Ok(())
    }

    /// Rules derived from the field type and its column limits.
    pub fn system_rules(&self, field: &FieldDefinition) -> Vec<RuleSpec> {
        let mut rules = Vec::new();
        if !is_required(field) {
            rules.push(RuleSpec::flag("nullable"));
        }
        rules.extend(field.type_.base_rules());
        rules.extend(as_rules(&limits_for(
            field.type_,
            self.dialect,
            field.is_encrypted(),
        )));
        rules
    }

    /// The merged rule list for `field`.
    pub fn effective_rules(&self, field: &FieldDefinition) -> Result<Vec<RuleSpec>> {
        Self::check_encryption(field)?;
        Ok(merge(&field.validation_rules, &self.system_rules(field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSettings;

    fn rules(specs: &[&str]) -> Vec<RuleSpec> {
        specs.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn field(type_: FieldType, declared: &[&str]) -> FieldDefinition {
        FieldDefinition {
            id: 1,
            code: "sample".into(),
            name: "Sample".into(),
            type_,
            entity_type: "company".into(),
            tenant_id: None,
            section_id: None,
            sort_order: 0,
            validation_rules: rules(declared),
            settings: FieldSettings::default(),
            width: None,
            active: true,
            system_defined: false,
            lookup_type: None,
            options: Vec::new(),
        }
    }

    #[test]
    fn required_is_by_name_only() {
        assert!(is_required(&field(FieldType::Text, &["required"])));
        assert!(is_required(&field(FieldType::Text, &["max:10", "required"])));
        assert!(!is_required(&field(FieldType::Text, &["required_if:kind,person"])));
        assert!(!is_required(&field(FieldType::Text, &[])));
        assert!(field(FieldType::Number, &["required"]).is_required());
    }

    #[test]
    fn user_max_tighter_than_text_column() {
        let engine = ValidationEngine::new(Dialect::MySql);
        let effective = engine
            .effective_rules(&field(FieldType::Textarea, &["required", "max:100"]))
            .unwrap();
        assert_eq!(effective, rules(&["required", "max:100", "string"]));
    }

    #[test]
    fn column_limit_tighter_than_user_max() {
        let engine = ValidationEngine::new(Dialect::MySql);
        let effective = engine
            .effective_rules(&field(FieldType::Textarea, &["max:100000"]))
            .unwrap();
        assert_eq!(effective, rules(&["max:65535", "nullable", "string"]));
    }

    #[test]
    fn integer_user_bounds_survive() {
        let engine = ValidationEngine::new(Dialect::Postgres);
        let effective = engine
            .effective_rules(&field(FieldType::Number, &["min:10", "max:100"]))
            .unwrap();
        assert_eq!(effective, rules(&["min:10", "max:100", "nullable", "integer"]));
    }

    #[test]
    fn link_gets_url_and_string_limit() {
        let engine = ValidationEngine::default();
        let effective = engine.effective_rules(&field(FieldType::Link, &[])).unwrap();
        assert_eq!(effective, rules(&["nullable", "string", "url", "max:255"]));
    }

    #[test]
    fn encrypted_multi_select_gets_reduced_item_limit() {
        let engine = ValidationEngine::default();
        let mut f = field(FieldType::MultiSelect, &[]);
        f.settings.encrypted = true;
        // json columns are not encryptable, but the catalog still prices it in
        assert!(matches!(
            engine.effective_rules(&f),
            Err(FieldsError::EncryptionMisconfiguration { .. })
        ));
        assert!(engine
            .system_rules(&f)
            .contains(&"max:75".parse().unwrap()));
    }

    #[test]
    fn encrypted_text_is_allowed() {
        let engine = ValidationEngine::default();
        let mut f = field(FieldType::Text, &["max:50"]);
        f.settings.encrypted = true;
        let effective = engine.effective_rules(&f).unwrap();
        assert!(effective.contains(&"max:50".parse().unwrap()));
    }

    #[test]
    fn unknown_user_rules_pass_through() {
        let engine = ValidationEngine::default();
        let effective = engine
            .effective_rules(&field(FieldType::Text, &["vat_number:EU"]))
            .unwrap();
        assert_eq!(effective[0], RuleSpec::new("vat_number", ["EU"]));
    }

    #[test]
    fn every_type_resolves_when_not_encrypted() {
        let engine = ValidationEngine::default();
        for t in FieldType::ALL {
            let effective = engine.effective_rules(&field(t, &[])).unwrap();
            assert!(contains_rule(&effective, "nullable"), "{t}");
        }
    }
}
