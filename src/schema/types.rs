/// Schema type definitions
///
/// A schema is an ordered list of field specs. Validation is a pure function from
/// (schema, payload) to the full list of field violations.

use crate::error::{CoreError, CoreResult};
use crate::storage::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected shape of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// Any non-null value
    Any,
    Text,
    Integer,
    /// Integer or floating point
    Number,
    Boolean,
    List,
    Map,
}

impl TypeTag {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeTag::Any => true,
            TypeTag::Text => matches!(value, Value::Text(_)),
            TypeTag::Integer => matches!(value, Value::Int(_)),
            TypeTag::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            TypeTag::Boolean => matches!(value, Value::Bool(_)),
            TypeTag::List => matches!(value, Value::List(_)),
            TypeTag::Map => matches!(value, Value::Map(_)),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Any => "any",
            TypeTag::Text => "text",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::List => "list",
            TypeTag::Map => "map",
        };
        f.write_str(name)
    }
}

/// Per-field constraint, checked only when the value has the expected type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Minimum text length in characters
    MinLength(usize),
    /// Maximum text length in characters
    MaxLength(usize),
    /// Inclusive numeric bounds
    Range { min: Option<f64>, max: Option<f64> },
    /// Text must be one of these values
    OneOf(Vec<String>),
    /// Text must match this regex (compiled at registration)
    Pattern(String),
    MinItems(usize),
    MaxItems(usize),
}

/// One field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub type_tag: TypeTag,
    pub required: bool,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub description: String,
    /// Filled in at creation when the field is absent or null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            required: true,
            constraints: Vec::new(),
            description: String::new(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            required: false,
            ..Self::required(name, type_tag)
        }
    }

    /// Add a constraint (builder style)
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Named field-shape definition for one asset kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique key, equal to the asset kind it validates
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Fields in declaration order; violations are reported in this order
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }
}

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    TypeMismatch { expected: TypeTag, found: String },
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    OutOfRange { min: Option<f64>, max: Option<f64>, actual: f64 },
    NotInSet { allowed: Vec<String> },
    PatternMismatch { pattern: String },
    TooFewItems { min: usize, actual: usize },
    TooManyItems { max: usize, actual: usize },
}

/// A single schema violation on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' ", self.field)?;
        match &self.kind {
            ViolationKind::Missing => write!(f, "is required"),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "expects {}, got {}", expected, found)
            }
            ViolationKind::TooShort { min, actual } => {
                write!(f, "is too short ({} < {} chars)", actual, min)
            }
            ViolationKind::TooLong { max, actual } => {
                write!(f, "is too long ({} > {} chars)", actual, max)
            }
            ViolationKind::OutOfRange { min, max, actual } => {
                let lower = min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".into());
                let upper = max.map(|v| v.to_string()).unwrap_or_else(|| "inf".into());
                write!(f, "value {} is outside [{}, {}]", actual, lower, upper)
            }
            ViolationKind::NotInSet { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
            ViolationKind::PatternMismatch { pattern } => {
                write!(f, "does not match /{}/", pattern)
            }
            ViolationKind::TooFewItems { min, actual } => {
                write!(f, "has {} items, needs at least {}", actual, min)
            }
            ViolationKind::TooManyItems { max, actual } => {
                write!(f, "has {} items, allows at most {}", actual, max)
            }
        }
    }
}

/// Outcome of validating one payload against one schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub kind: String,
    pub violations: Vec<FieldViolation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn a failed validation into `CoreError::Validation`
    pub fn into_result(self) -> CoreResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation {
                kind: self.kind,
                violations: self.violations,
            })
        }
    }
}
