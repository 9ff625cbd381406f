//! Typed input schemas for tools.
//!
//! Every tool declares a [`ToolSchema`]. The registry validates model-produced
//! arguments against it before any remote call is made, and the same schema is
//! rendered as JSON Schema for the model's tool definitions.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::fmt;

/// The type of a single schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    /// Whole number with optional inclusive bounds.
    Integer { min: Option<i64>, max: Option<i64> },
    Number,
    Boolean,
    StringList,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// Calendar date formatted `YYYY-MM-DD`.
    Date,
}

impl FieldKind {
    pub fn integer() -> Self {
        Self::Integer { min: None, max: None }
    }

    pub fn integer_between(min: i64, max: i64) -> Self {
        Self::Integer { min: Some(min), max: Some(max) }
    }

    pub fn one_of(values: &[&str]) -> Self {
        Self::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    fn check(&self, field: &str, value: &Value) -> Option<String> {
        match self {
            FieldKind::String => (!value.is_string()).then(|| format!("'{field}' must be a string")),
            FieldKind::Integer { min, max } => {
                let Some(n) = value.as_i64() else {
                    return Some(format!("'{field}' must be a whole number"));
                };
                match (*min, *max) {
                    (Some(lo), Some(hi)) if n < lo || n > hi => {
                        Some(format!("'{field}' must be between {lo} and {hi}"))
                    }
                    (Some(lo), None) if n < lo => Some(format!("'{field}' must be at least {lo}")),
                    (None, Some(hi)) if n > hi => Some(format!("'{field}' must be at most {hi}")),
                    _ => None,
                }
            }
            FieldKind::Number => (!value.is_number()).then(|| format!("'{field}' must be a number")),
            FieldKind::Boolean => (!value.is_boolean()).then(|| format!("'{field}' must be true or false")),
            FieldKind::StringList => {
                let ok = value
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_string));
                (!ok).then(|| format!("'{field}' must be a list of strings"))
            }
            FieldKind::Enum(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => None,
                _ => Some(format!("'{field}' must be one of {}", allowed.join(", "))),
            },
            FieldKind::Date => {
                let ok = value
                    .as_str()
                    .is_some_and(|s| s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok());
                (!ok).then(|| format!("'{field}' must be a date formatted YYYY-MM-DD"))
            }
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({ "type": "string" }),
            FieldKind::Integer { min, max } => {
                let mut schema = json!({ "type": "integer" });
                if let Some(lo) = min {
                    schema["minimum"] = json!(lo);
                }
                if let Some(hi) = max {
                    schema["maximum"] = json!(hi);
                }
                schema
            }
            FieldKind::Number => json!({ "type": "number" }),
            FieldKind::Boolean => json!({ "type": "boolean" }),
            FieldKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
            FieldKind::Date => json!({ "type": "string", "format": "date" }),
        }
    }
}

/// A named field in a tool's input.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: String,
}

/// The full input schema of one tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
    any_of: Vec<String>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, false, description)
    }

    /// At least one of the named fields must be present.
    pub fn require_any_of(mut self, names: &[&str]) -> Self {
        self.any_of = names.iter().map(|n| n.to_string()).collect();
        self
    }

    fn field(mut self, name: &str, kind: FieldKind, required: bool, description: &str) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required,
            description: description.to_string(),
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check `arguments` against this schema.
    ///
    /// `null` on an optional field counts as absent. Unknown fields are
    /// rejected so a model cannot smuggle extra data to the backend.
    pub fn validate(&self, arguments: &Value) -> Result<(), SchemaViolation> {
        let mut violation = SchemaViolation::default();

        let Some(object) = arguments.as_object() else {
            violation.issues.push("arguments must be a JSON object".into());
            return Err(violation);
        };

        for key in object.keys() {
            if self.field_spec(key).is_none() {
                violation.issues.push(format!("unknown field '{key}'"));
            }
        }

        for spec in &self.fields {
            match present(object, &spec.name) {
                None if spec.required => violation.missing.push(spec.name.clone()),
                None => {}
                Some(value) => {
                    if let Some(issue) = spec.kind.check(&spec.name, value) {
                        violation.issues.push(issue);
                    }
                }
            }
        }

        if !self.any_of.is_empty() && self.any_of.iter().all(|n| present(object, n).is_none()) {
            violation
                .issues
                .push(format!("at least one of {} must be provided", self.any_of.join(", ")));
        }

        if violation.is_empty() { Ok(()) } else { Err(violation) }
    }

    /// Render as a JSON Schema object for the model.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.fields {
            let mut prop = spec.kind.json_schema();
            if !spec.description.is_empty() {
                prop["description"] = json!(spec.description);
            }
            properties.insert(spec.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|v| !v.is_null())
}

/// Why a set of arguments did not match a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaViolation {
    /// Required fields that were absent.
    pub missing: Vec<String>,
    /// Everything else: wrong types, bad values, unknown fields.
    pub issues: Vec<String>,
}

impl SchemaViolation {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.issues.is_empty()
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        parts.extend(self.issues.iter().cloned());
        write!(f, "{}", parts.join("; "))
    }
}
