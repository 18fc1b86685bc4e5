/// Schema registry using ArcSwap
///
/// Schemas are compiled on registration (regex patterns built once) and published
/// by swapping the whole map, so validation never blocks on a concurrent register.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::schema::types::{
    Constraint, FieldSpec, FieldViolation, Schema, ValidationResult, ViolationKind,
};
use crate::storage::types::{Payload, Value};
use arc_swap::ArcSwap;
use regex::Regex;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of named schemas
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Key: schema name (asset kind), Value: compiled schema
    schemas: ArcSwap<HashMap<String, Arc<CompiledSchema>>>,
}

/// Schema with its regex constraints compiled
///
/// `patterns[i]` holds the compiled `Pattern` constraints of `schema.fields[i]`.
#[derive(Debug)]
pub struct CompiledSchema {
    pub schema: Schema,
    patterns: Vec<Vec<Regex>>,
}

impl CompiledSchema {
    /// Compile a schema, rejecting duplicate field names and invalid patterns
    pub fn compile(schema: Schema) -> CoreResult<Self> {
        if schema.name.trim().is_empty() {
            return Err(CoreError::InvalidDefinition("schema name must not be empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        let mut patterns = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "schema '{}' declares field '{}' twice",
                    schema.name, field.name
                )));
            }

            if let Some(default) = &field.default {
                if !field.type_tag.accepts(default) {
                    return Err(CoreError::InvalidDefinition(format!(
                        "schema '{}' field '{}': default is {}, expected {}",
                        schema.name,
                        field.name,
                        default.type_name(),
                        field.type_tag
                    )));
                }
            }

            let mut compiled = Vec::new();
            for constraint in &field.constraints {
                if let Constraint::Pattern(pattern) = constraint {
                    let regex = Regex::new(pattern).map_err(|e| {
                        CoreError::InvalidDefinition(format!(
                            "schema '{}' field '{}': invalid pattern: {}",
                            schema.name, field.name, e
                        ))
                    })?;
                    compiled.push(regex);
                }
            }
            patterns.push(compiled);
        }

        Ok(Self { schema, patterns })
    }

    /// Fill absent (or null) fields that declare a default
    pub fn apply_defaults(&self, payload: &mut Payload) {
        for field in &self.schema.fields {
            let Some(default) = &field.default else {
                continue;
            };
            if payload.get(&field.name).map_or(true, Value::is_null) {
                payload.insert(field.name.clone(), default.clone());
            }
        }
    }

    /// Validate a payload, collecting every violation in field order
    ///
    /// Null counts as absent. A type mismatch is reported once and suppresses that
    /// field's constraint checks; fields not declared in the schema are allowed.
    pub fn validate(&self, payload: &Payload) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        for (field, patterns) in self.schema.fields.iter().zip(&self.patterns) {
            let value = match payload.get(&field.name) {
                Some(value) if !value.is_null() => value,
                _ => {
                    if field.required {
                        violations.push(FieldViolation::new(&field.name, ViolationKind::Missing));
                    }
                    continue;
                }
            };

            if !field.type_tag.accepts(value) {
                violations.push(FieldViolation::new(
                    &field.name,
                    ViolationKind::TypeMismatch {
                        expected: field.type_tag,
                        found: value.type_name().to_string(),
                    },
                ));
                continue;
            }

            check_constraints(field, patterns, value, &mut violations);
        }

        violations
    }
}

fn check_constraints(
    field: &FieldSpec,
    patterns: &[Regex],
    value: &Value,
    violations: &mut Vec<FieldViolation>,
) {
    let mut patterns = patterns.iter();
    let violate = |kind| FieldViolation::new(&field.name, kind);

    for constraint in &field.constraints {
        match constraint {
            Constraint::MinLength(min) => {
                if let Some(text) = value.as_str() {
                    let actual = text.chars().count();
                    if actual < *min {
                        violations.push(violate(ViolationKind::TooShort { min: *min, actual }));
                    }
                }
            }
            Constraint::MaxLength(max) => {
                if let Some(text) = value.as_str() {
                    let actual = text.chars().count();
                    if actual > *max {
                        violations.push(violate(ViolationKind::TooLong { max: *max, actual }));
                    }
                }
            }
            Constraint::Range { min, max } => {
                if let Some(actual) = value.as_f64() {
                    let below = min.map_or(false, |min| actual < min);
                    let above = max.map_or(false, |max| actual > max);
                    if below || above {
                        violations.push(violate(ViolationKind::OutOfRange {
                            min: *min,
                            max: *max,
                            actual,
                        }));
                    }
                }
            }
            Constraint::OneOf(allowed) => {
                if let Some(text) = value.as_str() {
                    if !allowed.iter().any(|candidate| candidate == text) {
                        violations.push(violate(ViolationKind::NotInSet {
                            allowed: allowed.clone(),
                        }));
                    }
                }
            }
            Constraint::Pattern(pattern) => {
                // Compiled regexes are stored in constraint order
                let regex = patterns.next();
                if let (Some(text), Some(regex)) = (value.as_str(), regex) {
                    if !regex.is_match(text) {
                        violations.push(violate(ViolationKind::PatternMismatch {
                            pattern: pattern.clone(),
                        }));
                    }
                }
            }
            Constraint::MinItems(min) => {
                if let Some(items) = value.as_list() {
                    if items.len() < *min {
                        violations.push(violate(ViolationKind::TooFewItems {
                            min: *min,
                            actual: items.len(),
                        }));
                    }
                }
            }
            Constraint::MaxItems(max) => {
                if let Some(items) = value.as_list() {
                    if items.len() > *max {
                        violations.push(violate(ViolationKind::TooManyItems {
                            max: *max,
                            actual: items.len(),
                        }));
                    }
                }
            }
        }
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its name
    ///
    /// Re-registering an existing name replaces the old schema as a whole; fields
    /// are never merged. Returns `true` when an existing schema was replaced.
    pub fn register(&self, schema: Schema) -> CoreResult<bool> {
        let name = schema.name.clone();
        let compiled = Arc::new(CompiledSchema::compile(schema)?);

        let previous = self.schemas.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&compiled));
            next
        });

        let replaced = previous.contains_key(&name);
        if replaced {
            tracing::info!("♻️ Re-registered schema '{}' (previous definition replaced)", name);
        } else {
            tracing::info!("📐 Registered schema '{}' ({} fields)", name, compiled.schema.fields.len());
        }
        Ok(replaced)
    }

    /// Validate `payload` against the schema registered for `kind`
    ///
    /// Fails with `NotFound` when no schema is registered for `kind`; otherwise
    /// returns every violation found.
    pub fn validate(&self, kind: &str, payload: &Payload) -> CoreResult<ValidationResult> {
        let compiled = self
            .compiled(kind)
            .ok_or_else(|| CoreError::not_found(EntityKind::Schema, kind))?;

        Ok(ValidationResult {
            kind: kind.to_string(),
            violations: compiled.validate(payload),
        })
    }

    /// Return `payload` with the defaults of `kind`'s schema filled in
    pub fn apply_defaults(&self, kind: &str, mut payload: Payload) -> CoreResult<Payload> {
        let compiled = self
            .compiled(kind)
            .ok_or_else(|| CoreError::not_found(EntityKind::Schema, kind))?;
        compiled.apply_defaults(&mut payload);
        Ok(payload)
    }

    /// Get the registered definition
    pub fn get(&self, name: &str) -> Option<Schema> {
        self.compiled(name).map(|compiled| compiled.schema.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.load().contains_key(name)
    }

    /// Registered schema names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.load().keys().cloned().collect();
        names.sort();
        names
    }

    fn compiled(&self, name: &str) -> Option<Arc<CompiledSchema>> {
        self.schemas.load().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use crate::schema::types::TypeTag;
    use crate::storage::types::payload_from_json;

    fn post_schema() -> Schema {
        Schema::new("social_post")
            .field(FieldSpec::required("text", TypeTag::Text).with(Constraint::MaxLength(10)))
            .field(
                FieldSpec::optional("style", TypeTag::Text)
                    .with(Constraint::OneOf(vec!["modern".into(), "bold".into()])),
            )
            .field(
                FieldSpec::optional("color", TypeTag::Text)
                    .with(Constraint::Pattern("^#[0-9a-fA-F]{6}$".into())),
            )
            .field(FieldSpec::optional("likes", TypeTag::Integer).with(Constraint::Range {
                min: Some(0.0),
                max: None,
            }))
            .field(FieldSpec::optional("tags", TypeTag::List).with(Constraint::MaxItems(2)))
    }

    #[test]
    fn collects_every_violation_in_one_pass() {
        let registry = SchemaRegistry::new();
        registry.register(post_schema()).unwrap();

        let payload = payload_from_json(json!({
            "text": "far too long for this",
            "style": "retro",
            "color": "red",
            "likes": -1,
            "tags": ["a", "b", "c"],
        }))
        .unwrap();

        let result = registry.validate("social_post", &payload).unwrap();
        let fields: Vec<&str> = result.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["text", "style", "color", "likes", "tags"]);
    }

    #[test]
    fn null_counts_as_missing_and_type_mismatch_skips_constraints() {
        let registry = SchemaRegistry::new();
        registry.register(post_schema()).unwrap();

        let payload = payload_from_json(json!({"text": null, "style": 5})).unwrap();
        let result = registry.validate("social_post", &payload).unwrap();
        assert_eq!(result.violations.len(), 2);
        assert_eq!(result.violations[0].kind, ViolationKind::Missing);
        assert_matches!(result.violations[1].kind, ViolationKind::TypeMismatch { .. });
    }

    #[test]
    fn valid_payload_passes() {
        let registry = SchemaRegistry::new();
        registry.register(post_schema()).unwrap();
        let payload = payload_from_json(json!({"text": "hi", "color": "#00FF00"})).unwrap();
        assert!(registry.validate("social_post", &payload).unwrap().is_valid());
    }

    #[test]
    fn unknown_kind_is_not_found() {
        let registry = SchemaRegistry::new();
        let err = registry.validate("nope", &Payload::new()).unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: EntityKind::Schema, .. });
    }

    #[test]
    fn reregistration_replaces_instead_of_merging() {
        let registry = SchemaRegistry::new();
        assert!(!registry.register(post_schema()).unwrap());

        let replacement = Schema::new("social_post").field(FieldSpec::required("body", TypeTag::Text));
        assert!(registry.register(replacement).unwrap());

        let schema = registry.get("social_post").unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].name, "body");
    }

    #[test]
    fn invalid_pattern_and_duplicate_fields_are_rejected() {
        let registry = SchemaRegistry::new();
        let bad_pattern = Schema::new("x")
            .field(FieldSpec::required("a", TypeTag::Text).with(Constraint::Pattern("(".into())));
        assert_matches!(registry.register(bad_pattern), Err(CoreError::InvalidDefinition(_)));

        let duplicate = Schema::new("y")
            .field(FieldSpec::required("a", TypeTag::Text))
            .field(FieldSpec::optional("a", TypeTag::Integer));
        assert_matches!(registry.register(duplicate), Err(CoreError::InvalidDefinition(_)));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn defaults_fill_absent_and_null_fields_only() {
        let registry = SchemaRegistry::new();
        registry
            .register(
                Schema::new("post")
                    .field(FieldSpec::required("text", TypeTag::Text))
                    .field(FieldSpec::optional("style", TypeTag::Text).with_default("modern"))
                    .field(FieldSpec::optional("color", TypeTag::Text).with_default("#000000")),
            )
            .unwrap();

        let payload = payload_from_json(json!({"text": "hi", "style": "bold", "color": null})).unwrap();
        let filled = registry.apply_defaults("post", payload).unwrap();
        assert_eq!(filled["style"], Value::from("bold"));
        assert_eq!(filled["color"], Value::from("#000000"));
        assert!(registry.validate("post", &filled).unwrap().is_valid());

        let err = registry.apply_defaults("nope", Payload::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn default_of_the_wrong_type_is_rejected() {
        let registry = SchemaRegistry::new();
        let schema = Schema::new("x").field(FieldSpec::optional("count", TypeTag::Integer).with_default("many"));
        assert_matches!(registry.register(schema), Err(CoreError::InvalidDefinition(_)));
    }
}
