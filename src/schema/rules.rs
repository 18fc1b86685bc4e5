/// Business rules independent of schema shape
///
/// A rule is a named, pure predicate over a payload (plus kind and metadata). The
/// engine applies a list of rule names and reports every failure together.

use crate::error::{CoreError, CoreResult};
use crate::storage::types::{Asset, Metadata, Payload, Value};
use arc_swap::ArcSwap;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::{collections::HashMap, fmt, sync::Arc};

/// What a rule predicate returns: `Err(reason)` on failure
pub type RuleOutcome = Result<(), String>;

type Predicate = Arc<dyn Fn(&RuleInput<'_>) -> RuleOutcome + Send + Sync>;

/// Data a rule is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub kind: &'a str,
    pub payload: &'a Payload,
    pub metadata: Option<&'a Metadata>,
}

impl<'a> RuleInput<'a> {
    pub fn new(kind: &'a str, payload: &'a Payload) -> Self {
        Self {
            kind,
            payload,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: &'a Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Non-null payload field
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.payload.get(name).filter(|value| !value.is_null())
    }
}

impl<'a> From<&'a Asset> for RuleInput<'a> {
    fn from(asset: &'a Asset) -> Self {
        RuleInput::new(&asset.kind, &asset.payload).with_metadata(&asset.metadata)
    }
}

/// Failing error-severity rules reject; warnings are only reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// A named validation predicate
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    predicate: Predicate,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> RuleOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            severity: Severity::Error,
            predicate: Arc::new(predicate),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Downgrade to a warning: failures are reported but never reject
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn check(&self, input: &RuleInput<'_>) -> RuleOutcome {
        (self.predicate)(input)
    }

    /// Field must be present and non-null (non-empty for text)
    pub fn required(name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let description = format!("'{}' must be present", field);
        Rule::new(name, move |input| match input.field(&field) {
            Some(Value::Text(text)) if text.trim().is_empty() => {
                Err(format!("'{}' must not be blank", field))
            }
            Some(_) => Ok(()),
            None => Err(format!("'{}' is required", field)),
        })
        .describe(description)
    }

    /// Text field, when present, must match `pattern`
    pub fn pattern(
        name: impl Into<String>,
        field: impl Into<String>,
        pattern: &str,
    ) -> CoreResult<Self> {
        let field = field.into();
        let regex = Regex::new(pattern)
            .map_err(|e| CoreError::InvalidDefinition(format!("invalid rule pattern: {}", e)))?;
        let description = format!("'{}' must match /{}/", field, pattern);
        Ok(Rule::new(name, move |input| match input.field(&field) {
            Some(Value::Text(text)) if !regex.is_match(text) => Err(format!(
                "'{}' value '{}' does not match /{}/",
                field,
                text,
                regex.as_str()
            )),
            _ => Ok(()),
        })
        .describe(description))
    }

    /// Numeric field, when present, must lie within the inclusive bounds
    pub fn range(
        name: impl Into<String>,
        field: impl Into<String>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        let field = field.into();
        let description = format!("'{}' must be within range", field);
        Rule::new(name, move |input| {
            let Some(value) = input.field(&field) else {
                return Ok(());
            };
            let Some(number) = value.as_f64() else {
                return Err(format!("'{}' must be a number", field));
            };
            if min.map_or(false, |min| number < min) || max.map_or(false, |max| number > max) {
                return Err(format!("'{}' value {} is out of range", field, number));
            }
            Ok(())
        })
        .describe(description)
    }

    /// Relation between two fields, checked only when both are present
    pub fn cross_field<F>(
        name: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&Value, &Value) -> RuleOutcome + Send + Sync + 'static,
    {
        let first = first.into();
        let second = second.into();
        let description = format!("'{}' and '{}' must be consistent", first, second);
        Rule::new(name, move |input| {
            match (input.field(&first), input.field(&second)) {
                (Some(a), Some(b)) => check(a, b),
                _ => Ok(()),
            }
        })
        .describe(description)
    }

    /// Text field, when present, must parse as a currency amount
    pub fn currency(name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let description = format!("'{}' must parse as a currency amount", field);
        Rule::new(name, move |input| match input.field(&field) {
            None => Ok(()),
            Some(Value::Text(text)) => parse_currency(text)
                .map(|_| ())
                .ok_or_else(|| format!("'{}' value '{}' is not a currency amount", field, text)),
            Some(Value::Int(_) | Value::Float(_)) => Ok(()),
            Some(other) => Err(format!(
                "'{}' must be a currency amount, got {}",
                field,
                other.type_name()
            )),
        })
        .describe(description)
    }
}

/// Parse amounts like "$10,000", "EUR 2500.50", "15k" or "1,200 USD"
///
/// Returns the numeric amount with any currency symbol or ISO code stripped.
pub fn parse_currency(text: &str) -> Option<f64> {
    static AMOUNT: OnceLock<Option<Regex>> = OnceLock::new();
    let amount = AMOUNT
        .get_or_init(|| {
            Regex::new(
                r"^(?:[$€£¥]|[A-Z]{3})?\s*(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)(?P<k>[kK])?\s*(?:[A-Z]{3})?$",
            )
            .ok()
        })
        .as_ref()?;

    let captures = amount.captures(text.trim())?;
    let number: f64 = captures.name("num")?.as_str().replace(',', "").parse().ok()?;
    Some(if captures.name("k").is_some() { number * 1000.0 } else { number })
}

/// A failed error-severity rule (or an unknown rule name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub rule: String,
    pub reason: String,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule '{}': {}", self.rule, self.reason)
    }
}

/// Every failure from one `apply` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub violations: Vec<RuleViolation>,
    pub warnings: Vec<RuleViolation>,
}

impl RuleReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// `CoreError::RuleViolation` when any error-severity rule failed, otherwise the warnings
    pub fn into_result(self) -> CoreResult<Vec<RuleViolation>> {
        if self.violations.is_empty() {
            Ok(self.warnings)
        } else {
            Err(CoreError::RuleViolation {
                violations: self.violations,
            })
        }
    }
}

/// Registry and evaluator of named rules
#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: ArcSwap<HashMap<String, Arc<Rule>>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a rule under its name
    pub fn register(&self, rule: Rule) {
        let name = rule.name.clone();
        let rule = Arc::new(rule);
        self.rules.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&rule));
            next
        });
        tracing::info!("📏 Registered rule '{}'", name);
    }

    /// Register a bare predicate under `name`
    pub fn register_rule<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&RuleInput<'_>) -> RuleOutcome + Send + Sync + 'static,
    {
        self.register(Rule::new(name, predicate));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Rule>> {
        self.rules.load().get(name).cloned()
    }

    /// Registered rule names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Evaluate every named rule against `input`
    ///
    /// Never stops at the first failure. An unknown rule name is itself reported
    /// as a violation.
    pub fn apply<S: AsRef<str>>(&self, names: &[S], input: &RuleInput<'_>) -> RuleReport {
        let rules = self.rules.load();
        let mut report = RuleReport::default();

        for name in names {
            let name = name.as_ref();
            let Some(rule) = rules.get(name) else {
                report.violations.push(RuleViolation {
                    rule: name.to_string(),
                    reason: format!("rule '{}' is not registered", name),
                });
                continue;
            };

            if let Err(reason) = rule.check(input) {
                let violation = RuleViolation {
                    rule: name.to_string(),
                    reason,
                };
                match rule.severity {
                    Severity::Error => report.violations.push(violation),
                    Severity::Warning => report.warnings.push(violation),
                }
            }
        }

        if !report.is_ok() {
            tracing::debug!(
                "Rules failed for '{}': {} violations, {} warnings",
                input.kind,
                report.violations.len(),
                report.warnings.len()
            );
        }
        report
    }
}
