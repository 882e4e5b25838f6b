//! Core field definition types.
//!
//! Field definitions describe named, typed attributes attached to a host
//! entity type. All types serialize via serde so definitions can be seeded
//! from YAML and stored as JSON columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FieldsError;
use crate::rules::RuleSpec;

/// The closed set of supported field types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Textarea,
    RichEditor,
    MarkdownEditor,
    Link,
    ColorPicker,
    Number,
    Currency,
    Select,
    Radio,
    Checkbox,
    Toggle,
    MultiSelect,
    CheckboxList,
    TagsInput,
    ToggleButtons,
    Date,
    DateTime,
}

impl FieldType {
    /// Every field type, in declaration order.
    pub const ALL: [FieldType; 18] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::RichEditor,
        FieldType::MarkdownEditor,
        FieldType::Link,
        FieldType::ColorPicker,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Toggle,
        FieldType::MultiSelect,
        FieldType::CheckboxList,
        FieldType::TagsInput,
        FieldType::ToggleButtons,
        FieldType::Date,
        FieldType::DateTime,
    ];

    /// The stable name used in storage and seed files.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::RichEditor => "rich-editor",
            FieldType::MarkdownEditor => "markdown-editor",
            FieldType::Link => "link",
            FieldType::ColorPicker => "color-picker",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Toggle => "toggle",
            FieldType::MultiSelect => "multi-select",
            FieldType::CheckboxList => "checkbox-list",
            FieldType::TagsInput => "tags-input",
            FieldType::ToggleButtons => "toggle-buttons",
            FieldType::Date => "date",
            FieldType::DateTime => "date-time",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = FieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FieldsError::unsupported_type(s))
    }
}

/// One of the fixed storage slots of a value record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Json,
}

impl ColumnKind {
    pub const ALL: [ColumnKind; 8] = [
        ColumnKind::Text,
        ColumnKind::String,
        ColumnKind::Integer,
        ColumnKind::Float,
        ColumnKind::Boolean,
        ColumnKind::Date,
        ColumnKind::DateTime,
        ColumnKind::Json,
    ];

    /// Name of the backing column in `custom_field_values`.
    pub fn column_name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text_value",
            ColumnKind::String => "string_value",
            ColumnKind::Integer => "integer_value",
            ColumnKind::Float => "float_value",
            ColumnKind::Boolean => "boolean_value",
            ColumnKind::Date => "date_value",
            ColumnKind::DateTime => "datetime_value",
            ColumnKind::Json => "json_value",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Per-field behavior flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSettings {
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default = "default_true")]
    pub visible_in_list: bool,
    #[serde(default = "default_true")]
    pub visible_in_view: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            encrypted: false,
            searchable: false,
            visible_in_list: true,
            visible_in_view: true,
        }
    }
}

/// A named choice belonging to one field definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldOption {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
}

/// A grouping of field definitions within an entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSection {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A stored custom field definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub validation_rules: Vec<RuleSpec>,
    #[serde(default)]
    pub settings: FieldSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub system_defined: bool,
    /// Name of a registered lookup source when values reference external
    /// records instead of inline options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

impl FieldDefinition {
    /// The storage column this field reads and writes.
    pub fn column(&self) -> ColumnKind {
        self.type_.column()
    }

    pub fn is_encrypted(&self) -> bool {
        self.settings.encrypted
    }

    /// True iff a `required` rule is declared.
    pub fn is_required(&self) -> bool {
        crate::validation::is_required(self)
    }
}

/// Input for creating a field definition. Also the shape of a seed file entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewField {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub validation_rules: Vec<RuleSpec>,
    #[serde(default)]
    pub settings: FieldSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    #[serde(default)]
    pub system_defined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_type: Option<String>,
    /// Option names, created in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl NewField {
    pub fn new(
        entity_type: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        type_: FieldType,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            type_,
            entity_type: entity_type.into(),
            tenant_id: None,
            section_id: None,
            sort_order: 0,
            validation_rules: Vec::new(),
            settings: FieldSettings::default(),
            width: None,
            system_defined: false,
            lookup_type: None,
            options: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<RuleSpec>) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.settings.encrypted = true;
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }
}
