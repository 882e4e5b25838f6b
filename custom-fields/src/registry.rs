//! Field type registry.
//!
//! Maps each field type to the single storage column it occupies and answers
//! the shape questions the converter, catalog and value store ask about it.
//! Every function matches exhaustively so a new variant fails to compile until
//! it has been placed.

use crate::rules::RuleSpec;
use crate::types::{ColumnKind, FieldType};

impl FieldType {
    /// The storage column this type occupies.
    pub fn column(&self) -> ColumnKind {
        match self {
            FieldType::Text
            | FieldType::Textarea
            | FieldType::RichEditor
            | FieldType::MarkdownEditor => ColumnKind::Text,
            FieldType::Link | FieldType::ColorPicker => ColumnKind::String,
            FieldType::Number | FieldType::Select | FieldType::Radio => ColumnKind::Integer,
            FieldType::Currency => ColumnKind::Float,
            FieldType::Checkbox | FieldType::Toggle => ColumnKind::Boolean,
            FieldType::MultiSelect
            | FieldType::CheckboxList
            | FieldType::TagsInput
            | FieldType::ToggleButtons => ColumnKind::Json,
            FieldType::Date => ColumnKind::Date,
            FieldType::DateTime => ColumnKind::DateTime,
        }
    }

    /// True for the json-backed choice types.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            FieldType::MultiSelect
                | FieldType::CheckboxList
                | FieldType::TagsInput
                | FieldType::ToggleButtons
        )
    }

    /// True when values are drawn from named options or an external lookup.
    pub fn is_optionable(&self) -> bool {
        matches!(
            self,
            FieldType::Select
                | FieldType::Radio
                | FieldType::MultiSelect
                | FieldType::CheckboxList
                | FieldType::TagsInput
                | FieldType::ToggleButtons
        )
    }

    /// Only the text-like family can hold ciphertext.
    pub fn is_encryptable(&self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::Textarea
                | FieldType::RichEditor
                | FieldType::MarkdownEditor
                | FieldType::Link
        )
    }

    /// Type-intrinsic validation rules, before any column limits.
    pub fn base_rules(&self) -> Vec<RuleSpec> {
        let names: &[&str] = match self {
            FieldType::Text
            | FieldType::Textarea
            | FieldType::RichEditor
            | FieldType::MarkdownEditor => &["string"],
            FieldType::Link => &["string", "url"],
            FieldType::ColorPicker => &["string"],
            FieldType::Number | FieldType::Select | FieldType::Radio => &["integer"],
            FieldType::Currency => &["numeric"],
            FieldType::Checkbox | FieldType::Toggle => &["boolean"],
            FieldType::MultiSelect
            | FieldType::CheckboxList
            | FieldType::TagsInput
            | FieldType::ToggleButtons => &["array"],
            FieldType::Date | FieldType::DateTime => &["date"],
        };
        names.iter().map(|n| RuleSpec::flag(*n)).collect()
    }
}

/// The storage column for a field type.
pub fn column_for(type_: FieldType) -> ColumnKind {
    type_.column()
}

pub fn is_multi_valued(type_: FieldType) -> bool {
    type_.is_multi_valued()
}

pub fn is_optionable(type_: FieldType) -> bool {
    type_.is_optionable()
}

/// All registered types that occupy a given column.
pub fn types_for_column(column: ColumnKind) -> Vec<FieldType> {
    FieldType::ALL
        .iter()
        .copied()
        .filter(|t| t.column() == column)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FieldType::Text, ColumnKind::Text)]
    #[case(FieldType::Textarea, ColumnKind::Text)]
    #[case(FieldType::RichEditor, ColumnKind::Text)]
    #[case(FieldType::MarkdownEditor, ColumnKind::Text)]
    #[case(FieldType::Link, ColumnKind::String)]
    #[case(FieldType::ColorPicker, ColumnKind::String)]
    #[case(FieldType::Number, ColumnKind::Integer)]
    #[case(FieldType::Select, ColumnKind::Integer)]
    #[case(FieldType::Radio, ColumnKind::Integer)]
    #[case(FieldType::Currency, ColumnKind::Float)]
    #[case(FieldType::Checkbox, ColumnKind::Boolean)]
    #[case(FieldType::Toggle, ColumnKind::Boolean)]
    #[case(FieldType::MultiSelect, ColumnKind::Json)]
    #[case(FieldType::CheckboxList, ColumnKind::Json)]
    #[case(FieldType::TagsInput, ColumnKind::Json)]
    #[case(FieldType::ToggleButtons, ColumnKind::Json)]
    #[case(FieldType::Date, ColumnKind::Date)]
    #[case(FieldType::DateTime, ColumnKind::DateTime)]
    fn column_mapping(#[case] type_: FieldType, #[case] expected: ColumnKind) {
        assert_eq!(column_for(type_), expected);
        // pure: asking twice gives the same answer
        assert_eq!(column_for(type_), column_for(type_));
    }

    #[test]
    fn multi_valued_iff_json_backed() {
        for t in FieldType::ALL {
            assert_eq!(is_multi_valued(t), t.column() == ColumnKind::Json, "{t}");
        }
    }

    #[test]
    fn multi_valued_types_are_optionable() {
        for t in FieldType::ALL {
            if t.is_multi_valued() {
                assert!(is_optionable(t), "{t}");
            }
        }
        assert!(is_optionable(FieldType::Select));
        assert!(!is_optionable(FieldType::Text));
        assert!(!is_optionable(FieldType::Number));
    }

    #[test]
    fn encryptable_types_are_text_like() {
        for t in FieldType::ALL {
            if t.is_encryptable() {
                assert!(
                    matches!(t.column(), ColumnKind::Text | ColumnKind::String),
                    "{t}"
                );
            }
        }
        assert!(!FieldType::ColorPicker.is_encryptable());
        assert!(!FieldType::TagsInput.is_encryptable());
    }

    #[test]
    fn types_for_column_partitions_registry() {
        let total: usize = ColumnKind::ALL
            .iter()
            .map(|c| types_for_column(*c).len())
            .sum();
        assert_eq!(total, FieldType::ALL.len());
        assert_eq!(types_for_column(ColumnKind::Float), vec![FieldType::Currency]);
    }

    #[test]
    fn base_rules_name_the_column_shape() {
        let names = |t: FieldType| -> Vec<String> {
            t.base_rules().into_iter().map(|r| r.name).collect()
        };
        assert_eq!(names(FieldType::Number), vec!["integer"]);
        assert_eq!(names(FieldType::TagsInput), vec!["array"]);
        assert_eq!(names(FieldType::Link), vec!["string", "url"]);
    }
}
