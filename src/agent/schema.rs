//! Structured-output contract (spec §4.5, §9).
//!
//! A language-neutral structural schema: field names, types, optionality,
//! and description text used both to prompt the model and to validate its
//! response. Validation is strict about required/typed fields but
//! permissive about extras.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("response did not match schema: {0}")]
    Invalid(String),
}

impl SchemaError {
    /// Schema validation failures are permanent after the single repair
    /// attempt the engine performs (spec §4.5, §7).
    pub fn is_transient(&self) -> bool {
        false
    }

    pub fn violations(&self) -> &str {
        match self {
            Self::Invalid(message) => message,
        }
    }
}

impl From<Vec<String>> for SchemaError {
    fn from(violations: Vec<String>) -> Self {
        Self::Invalid(violations.join("; "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Enum { members: Vec<String> },
    SequenceOf { item: Box<FieldType> },
    MappingOf { value: Box<FieldType> },
    Object { schema: Schema },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: String,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
            description: description.into(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// A human-readable description of the schema, suitable for embedding
    /// in a prompt via the `{schema_hint}` placeholder (spec §4.3).
    pub fn as_hint(&self) -> String {
        self.fields
            .iter()
            .map(|f| {
                let opt = if f.optional { " (optional)" } else { "" };
                format!("- {}{}: {} — {}", f.name, opt, type_hint(&f.field_type), f.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validates `value` (expected to be a JSON object) against this
    /// schema, collecting every violation rather than stopping at the
    /// first (spec §4.5: a single repair prompt should give the model as
    /// much signal as possible).
    pub fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        validate_object(&self.fields, value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn validate_strict(&self, value: &Value) -> Result<(), SchemaError> {
        self.validate(value).map_err(SchemaError::from)
    }
}

fn type_hint(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "string".to_string(),
        FieldType::Integer => "integer".to_string(),
        FieldType::Float => "float".to_string(),
        FieldType::Boolean => "boolean".to_string(),
        FieldType::Enum { members } => format!("enum[{}]", members.join(", ")),
        FieldType::SequenceOf { item } => format!("sequence-of {}", type_hint(item)),
        FieldType::MappingOf { value } => format!("mapping-of {}", type_hint(value)),
        FieldType::Object { .. } => "object".to_string(),
    }
}

fn validate_object(fields: &[Field], value: &Value, path: &str, violations: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        violations.push(format!("{path}: expected an object"));
        return;
    };

    for field in fields {
        let field_path = if path.is_empty() {
            field.name.clone()
        } else {
            format!("{path}.{}", field.name)
        };

        match obj.get(&field.name) {
            None => {
                if !field.optional {
                    violations.push(format!("{field_path}: missing required field"));
                }
            }
            Some(v) => validate_value(&field.field_type, v, &field_path, violations),
        }
    }
}

fn validate_value(field_type: &FieldType, value: &Value, path: &str, violations: &mut Vec<String>) {
    match field_type {
        FieldType::String => {
            if !value.is_string() {
                violations.push(format!("{path}: expected string"));
            }
        }
        FieldType::Integer => {
            if !value.is_i64() && !value.is_u64() {
                violations.push(format!("{path}: expected integer"));
            }
        }
        FieldType::Float => {
            if !value.is_number() {
                violations.push(format!("{path}: expected float"));
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                violations.push(format!("{path}: expected boolean"));
            }
        }
        FieldType::Enum { members } => match value.as_str() {
            Some(s) if members.iter().any(|m| m == s) => {}
            _ => violations.push(format!("{path}: expected one of [{}]", members.join(", "))),
        },
        FieldType::SequenceOf { item } => match value.as_array() {
            Some(items) => {
                for (i, element) in items.iter().enumerate() {
                    validate_value(item, element, &format!("{path}[{i}]"), violations);
                }
            }
            None => violations.push(format!("{path}: expected a sequence")),
        },
        FieldType::MappingOf { value: value_type } => match value.as_object() {
            Some(map) => {
                for (key, v) in map {
                    validate_value(value_type, v, &format!("{path}.{key}"), violations);
                }
            }
            None => violations.push(format!("{path}: expected a mapping")),
        },
        FieldType::Object { schema } => validate_object(&schema.fields, value, path, violations),
    }
}
