//! Declarative input schemas for tools
//!
//! A schema is used twice: to validate and normalize untrusted tool
//! arguments, and to produce the JSON Schema advertised in `tools/list`.
//! Both are derived from the same description so they cannot drift apart.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// JSON Schema dialect advertised to clients
const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Shape of a single value
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String,
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Boolean,
    /// String restricted to a fixed set of members
    Enum(Vec<&'static str>),
    Array {
        items: Box<Schema>,
        max_items: Option<usize>,
    },
    Object(ObjectSchema),
}

/// A named property of an object schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    schema: Schema,
    description: Option<&'static str>,
    optional: bool,
    default: Option<Value>,
}

impl Field {
    fn of(schema: Schema) -> Self {
        Self {
            schema,
            description: None,
            optional: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::of(Schema::String)
    }

    pub fn number() -> Self {
        Self::of(Schema::Number {
            minimum: None,
            maximum: None,
        })
    }

    pub fn integer() -> Self {
        Self::of(Schema::Integer {
            minimum: None,
            maximum: None,
        })
    }

    pub fn boolean() -> Self {
        Self::of(Schema::Boolean)
    }

    pub fn one_of(members: &[&'static str]) -> Self {
        Self::of(Schema::Enum(members.to_vec()))
    }

    pub fn array(items: Schema) -> Self {
        Self::of(Schema::Array {
            items: Box::new(items),
            max_items: None,
        })
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::of(Schema::Object(schema))
    }

    /// Mark the field as not required
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Value filled in when the field is absent (implies optional)
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Inclusive numeric bounds
    pub fn range(mut self, min: i64, max: i64) -> Self {
        match &mut self.schema {
            Schema::Integer { minimum, maximum } => {
                *minimum = Some(min);
                *maximum = Some(max);
            }
            Schema::Number { minimum, maximum } => {
                *minimum = Some(min as f64);
                *maximum = Some(max as f64);
            }
            _ => {}
        }
        self
    }

    /// Maximum array length
    pub fn max_items(mut self, max: usize) -> Self {
        if let Schema::Array { max_items, .. } = &mut self.schema {
            *max_items = Some(max);
        }
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn description(&self) -> Option<&'static str> {
        self.description
    }
}

/// Object with ordered, named fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: IndexMap<&'static str, Field>,
    /// Reject unknown keys instead of stripping them
    strict: bool,
}

impl ObjectSchema {
    /// Object that silently drops unknown keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Object that rejects unknown keys
    pub fn strict() -> Self {
        Self {
            fields: IndexMap::new(),
            strict: true,
        }
    }

    pub fn field(mut self, name: &'static str, field: Field) -> Self {
        self.fields.insert(name, field);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Field)> {
        self.fields.iter().map(|(name, field)| (*name, field))
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Validate `value`, returning it with defaults filled in and unknown
    /// keys of non-strict objects removed.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        let normalized = check_object(self, value, &mut path, &mut issues);

        match normalized {
            Some(value) if issues.is_empty() => Ok(value),
            _ => Err(ValidationError { issues }),
        }
    }

    /// JSON Schema (draft-07) describing this object
    pub fn to_json_schema(&self) -> Value {
        let mut root = Map::new();
        root.insert("$schema".to_string(), json!(JSON_SCHEMA_DRAFT));
        root.extend(object_json(self));
        Value::Object(root)
    }
}

/// One problem found during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending value (empty for the root)
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Arguments did not satisfy a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

impl std::error::Error for ValidationError {}

fn push_issue(path: &[String], issues: &mut Vec<ValidationIssue>, message: String) {
    issues.push(ValidationIssue {
        path: path.join("."),
        message,
    });
}

fn received(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check(schema: &Schema, value: &Value, path: &mut Vec<String>, issues: &mut Vec<ValidationIssue>) -> Option<Value> {
    match schema {
        Schema::String => match value {
            Value::String(_) => Some(value.clone()),
            other => {
                push_issue(path, issues, format!("Expected string, received {}", received(other)));
                None
            }
        },
        Schema::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            other => {
                push_issue(path, issues, format!("Expected boolean, received {}", received(other)));
                None
            }
        },
        Schema::Number { minimum, maximum } => {
            let Some(n) = value.as_f64() else {
                push_issue(path, issues, format!("Expected number, received {}", received(value)));
                return None;
            };
            let before = issues.len();
            check_bounds(n, *minimum, *maximum, path, issues);
            (issues.len() == before).then(|| value.clone())
        }
        Schema::Integer { minimum, maximum } => {
            let n = match value {
                Value::Number(num) => match num.as_i64() {
                    Some(i) => i,
                    None => match num.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                        _ => {
                            push_issue(path, issues, "Expected integer, received float".to_string());
                            return None;
                        }
                    },
                },
                other => {
                    push_issue(path, issues, format!("Expected integer, received {}", received(other)));
                    return None;
                }
            };
            let before = issues.len();
            check_bounds(n as f64, minimum.map(|m| m as f64), maximum.map(|m| m as f64), path, issues);
            (issues.len() == before).then(|| Value::from(n))
        }
        Schema::Enum(members) => match value.as_str() {
            Some(s) if members.contains(&s) => Some(value.clone()),
            _ => {
                let expected: Vec<String> = members.iter().map(|m| format!("'{}'", m)).collect();
                let got = match value {
                    Value::String(s) => format!("'{}'", s),
                    other => received(other).to_string(),
                };
                push_issue(
                    path,
                    issues,
                    format!("Invalid enum value. Expected {}, received {}", expected.join(" | "), got),
                );
                None
            }
        },
        Schema::Array { items, max_items } => {
            let Some(elements) = value.as_array() else {
                push_issue(path, issues, format!("Expected array, received {}", received(value)));
                return None;
            };
            if let Some(max) = max_items {
                if elements.len() > *max {
                    push_issue(path, issues, format!("Array must contain at most {} element(s)", max));
                    return None;
                }
            }
            let mut out = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                path.push(index.to_string());
                if let Some(v) = check(items, element, path, issues) {
                    out.push(v);
                }
                path.pop();
            }
            Some(Value::Array(out))
        }
        Schema::Object(object) => check_object(object, value, path, issues),
    }
}

fn check_bounds(
    n: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    path: &[String],
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(min) = minimum {
        if n < min {
            push_issue(path, issues, format!("Number must be greater than or equal to {}", min));
        }
    }
    if let Some(max) = maximum {
        if n > max {
            push_issue(path, issues, format!("Number must be less than or equal to {}", max));
        }
    }
}

fn check_object(
    schema: &ObjectSchema,
    value: &Value,
    path: &mut Vec<String>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    let Some(map) = value.as_object() else {
        push_issue(path, issues, format!("Expected object, received {}", received(value)));
        return None;
    };

    let mut out = Map::new();
    for (name, field) in &schema.fields {
        path.push((*name).to_string());
        match map.get(*name) {
            Some(v) => {
                if let Some(normalized) = check(&field.schema, v, path, issues) {
                    out.insert((*name).to_string(), normalized);
                }
            }
            None => {
                if let Some(default) = &field.default {
                    out.insert((*name).to_string(), default.clone());
                } else if !field.optional {
                    push_issue(path, issues, "Required".to_string());
                }
            }
        }
        path.pop();
    }

    if schema.strict {
        let unknown: Vec<String> = map
            .keys()
            .filter(|k| !schema.fields.contains_key(k.as_str()))
            .map(|k| format!("'{}'", k))
            .collect();
        if !unknown.is_empty() {
            push_issue(
                path,
                issues,
                format!("Unrecognized key(s) in object: {}", unknown.join(", ")),
            );
        }
    }

    Some(Value::Object(out))
}

fn schema_json(schema: &Schema) -> Map<String, Value> {
    let mut out = Map::new();
    match schema {
        Schema::String => {
            out.insert("type".to_string(), json!("string"));
        }
        Schema::Boolean => {
            out.insert("type".to_string(), json!("boolean"));
        }
        Schema::Number { minimum, maximum } => {
            out.insert("type".to_string(), json!("number"));
            if let Some(min) = minimum {
                out.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = maximum {
                out.insert("maximum".to_string(), json!(max));
            }
        }
        Schema::Integer { minimum, maximum } => {
            out.insert("type".to_string(), json!("integer"));
            if let Some(min) = minimum {
                out.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = maximum {
                out.insert("maximum".to_string(), json!(max));
            }
        }
        Schema::Enum(members) => {
            out.insert("type".to_string(), json!("string"));
            out.insert("enum".to_string(), json!(members));
        }
        Schema::Array { items, max_items } => {
            out.insert("type".to_string(), json!("array"));
            out.insert("items".to_string(), Value::Object(schema_json(items)));
            if let Some(max) = max_items {
                out.insert("maxItems".to_string(), json!(max));
            }
        }
        Schema::Object(object) => out = object_json(object),
    }
    out
}

fn object_json(schema: &ObjectSchema) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, field) in &schema.fields {
        let mut prop = schema_json(&field.schema);
        if let Some(default) = &field.default {
            prop.insert("default".to_string(), default.clone());
        }
        if let Some(description) = field.description {
            prop.insert("description".to_string(), json!(description));
        }
        properties.insert((*name).to_string(), Value::Object(prop));

        if !field.optional {
            required.push(*name);
        }
    }

    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));
    out.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".to_string(), json!(required));
    }
    if schema.strict {
        out.insert("additionalProperties".to_string(), json!(false));
    }
    out
}
