//! Field conditions attached to rules and their evaluation against resource
//! attributes.
//!
//! Storage uses Mongo-style operator keys (`$eq`, `$ne`, `$in`, `$nin`,
//! `$glob`, `$all`, `$any`); a bare string is an implicit `$eq`.
//!
//! Missing attributes never raise: negative operators (`$ne`, `$nin`) hold
//! vacuously, every other operator fails.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::RuleError;

/// Concrete attribute value of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Scalar text such as an environment slug or a secret path.
    Text(String),
    /// Set of strings such as secret tag slugs.
    Set(Vec<String>),
}

impl AttributeValue {
    /// Returns the value as a slice of members; text is a one-element set.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Text(value) => std::slice::from_ref(value),
            Self::Set(values) => values.as_slice(),
        }
    }

    fn contains(&self, candidate: &str) -> bool {
        self.values().iter().any(|value| value == candidate)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::Set(values)
    }
}

/// Attribute bag of the resource a permission check is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceAttributes(BTreeMap<String, AttributeValue>);

impl ResourceAttributes {
    /// Creates an empty attribute bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text attribute.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0
            .insert(field.into(), AttributeValue::Text(value.into()));
        self
    }

    /// Adds a set attribute.
    #[must_use]
    pub fn with_set<I, T>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.0.insert(field.into(), AttributeValue::Set(values));
        self
    }

    /// Returns the attribute value, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.0.get(field)
    }

    /// Returns whether no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hierarchical path pattern compiled once at construction.
///
/// `*` may cross `/`, so `/foo/*` covers `/foo/bar/baz`, while the literal
/// part must match whole segments: `/foo/*` never covers `/foobar`.
///
/// `*` also matches nothing, so `/foo/*` covers the folder path `/foo/`
/// itself. Write `/foo/?*` to require at least one character below it.
#[derive(Clone)]
pub struct PathGlob {
    pattern: String,
    matcher: GlobMatcher,
}

impl PathGlob {
    /// Compiles a glob pattern.
    pub fn new(pattern: impl Into<String>) -> Result<Self, RuleError> {
        let pattern = pattern.into();
        let glob = GlobBuilder::new(pattern.as_str())
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|error| RuleError::InvalidGlob {
                pattern: pattern.clone(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            matcher: glob.compile_matcher(),
            pattern,
        })
    }

    /// Returns the source pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns whether the value matches the pattern.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.matcher.is_match(value)
    }

    /// Returns the leading part of the pattern that holds no glob syntax.
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        let end = self
            .pattern
            .find(GLOB_SYNTAX)
            .unwrap_or(self.pattern.len());
        &self.pattern[..end]
    }

    /// Returns whether the pattern matches only its own text.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.literal_prefix().len() == self.pattern.len()
    }

    /// Returns whether the pattern is a literal prefix followed only by
    /// stars, so it matches every value starting with that prefix.
    #[must_use]
    pub fn is_prefix_pattern(&self) -> bool {
        let rest = &self.pattern[self.literal_prefix().len()..];
        !rest.is_empty() && rest.chars().all(|character| character == '*')
    }
}

const GLOB_SYNTAX: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

impl Debug for PathGlob {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.debug_tuple("PathGlob").field(&self.pattern).finish()
    }
}

impl PartialEq for PathGlob {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathGlob {}

/// Requirement mode for set containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagMatchMode {
    /// At least one required value must be present.
    Any,
    /// Every required value must be present.
    All,
}

/// Operator discriminant; its order is the canonical order inside a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperatorKind {
    /// `$eq`
    Equals,
    /// `$ne`
    NotEquals,
    /// `$in`
    In,
    /// `$nin`
    NotIn,
    /// `$glob`
    Glob,
    /// `$all`
    ContainsAll,
    /// `$any`
    ContainsAny,
}

impl OperatorKind {
    /// Returns the storage key.
    #[must_use]
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Equals => "$eq",
            Self::NotEquals => "$ne",
            Self::In => "$in",
            Self::NotIn => "$nin",
            Self::Glob => "$glob",
            Self::ContainsAll => "$all",
            Self::ContainsAny => "$any",
        }
    }

    /// Parses a storage key.
    #[must_use]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Self::Equals),
            "$ne" => Some(Self::NotEquals),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::NotIn),
            "$glob" => Some(Self::Glob),
            "$all" => Some(Self::ContainsAll),
            "$any" => Some(Self::ContainsAny),
            _ => None,
        }
    }

    /// Negative operators hold when the attribute is absent.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::NotEquals | Self::NotIn)
    }
}

/// One operator applied to one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOperator {
    /// Value equals the literal (set attribute: contains it).
    Equals(String),
    /// Value differs from the literal (set attribute: does not contain it).
    NotEquals(String),
    /// Value is one of the literals (set attribute: intersects them).
    In(Vec<String>),
    /// Value is none of the literals (set attribute: disjoint from them).
    NotIn(Vec<String>),
    /// Value matches the path pattern (set attribute: any member matches).
    Glob(PathGlob),
    /// Set attribute contains the required values per mode.
    Contains {
        /// Required values.
        values: Vec<String>,
        /// Whether any or all values are required.
        mode: TagMatchMode,
    },
}

impl ConditionOperator {
    /// Returns the operator discriminant.
    #[must_use]
    pub fn kind(&self) -> OperatorKind {
        match self {
            Self::Equals(_) => OperatorKind::Equals,
            Self::NotEquals(_) => OperatorKind::NotEquals,
            Self::In(_) => OperatorKind::In,
            Self::NotIn(_) => OperatorKind::NotIn,
            Self::Glob(_) => OperatorKind::Glob,
            Self::Contains {
                mode: TagMatchMode::All,
                ..
            } => OperatorKind::ContainsAll,
            Self::Contains {
                mode: TagMatchMode::Any,
                ..
            } => OperatorKind::ContainsAny,
        }
    }

    /// Evaluates the operator against an attribute that may be absent.
    #[must_use]
    pub fn matches(&self, value: Option<&AttributeValue>) -> bool {
        let Some(value) = value else {
            return self.kind().is_negative();
        };

        match self {
            Self::Equals(expected) => value.contains(expected),
            Self::NotEquals(expected) => !value.contains(expected),
            Self::In(options) => options.iter().any(|option| value.contains(option)),
            Self::NotIn(options) => !options.iter().any(|option| value.contains(option)),
            Self::Glob(glob) => value.values().iter().any(|member| glob.is_match(member)),
            Self::Contains {
                values,
                mode: TagMatchMode::All,
            } => !values.is_empty() && values.iter().all(|required| value.contains(required)),
            Self::Contains {
                values,
                mode: TagMatchMode::Any,
            } => values.iter().any(|required| value.contains(required)),
        }
    }

    /// Evaluates the operator against a single text value.
    #[must_use]
    pub fn matches_text(&self, value: &str) -> bool {
        self.matches(Some(&AttributeValue::Text(value.to_owned())))
    }

    fn operand_json(&self) -> Value {
        match self {
            Self::Equals(value) | Self::NotEquals(value) => Value::String(value.clone()),
            Self::Glob(glob) => Value::String(glob.as_str().to_owned()),
            Self::In(values) | Self::NotIn(values) | Self::Contains { values, .. } => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }

    fn from_operand(kind: OperatorKind, operand: &Value) -> Result<Self, RuleError> {
        match kind {
            OperatorKind::Equals => Ok(Self::Equals(text_operand(kind, operand)?)),
            OperatorKind::NotEquals => Ok(Self::NotEquals(text_operand(kind, operand)?)),
            OperatorKind::Glob => Ok(Self::Glob(PathGlob::new(text_operand(kind, operand)?)?)),
            OperatorKind::In => Ok(Self::In(list_operand(kind, operand)?)),
            OperatorKind::NotIn => Ok(Self::NotIn(list_operand(kind, operand)?)),
            OperatorKind::ContainsAll => Ok(Self::Contains {
                values: list_operand(kind, operand)?,
                mode: TagMatchMode::All,
            }),
            OperatorKind::ContainsAny => Ok(Self::Contains {
                values: list_operand(kind, operand)?,
                mode: TagMatchMode::Any,
            }),
        }
    }
}

fn text_operand(kind: OperatorKind, operand: &Value) -> Result<String, RuleError> {
    operand.as_str().map(str::to_owned).ok_or_else(|| {
        RuleError::MalformedRule(format!(
            "operator '{}' expects a string operand",
            kind.storage_key()
        ))
    })
}

fn list_operand(kind: OperatorKind, operand: &Value) -> Result<Vec<String>, RuleError> {
    let malformed = || {
        RuleError::MalformedRule(format!(
            "operator '{}' expects an array of strings",
            kind.storage_key()
        ))
    };

    operand
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(malformed))
        .collect()
}

/// All operators constraining one attribute; every operator must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCondition {
    operators: Vec<ConditionOperator>,
}

impl FieldCondition {
    /// Creates a condition from operators, at most one per kind.
    pub fn new(mut operators: Vec<ConditionOperator>) -> Result<Self, RuleError> {
        if operators.is_empty() {
            return Err(RuleError::MalformedRule(
                "field condition requires at least one operator".to_owned(),
            ));
        }

        operators.sort_by_key(ConditionOperator::kind);
        if operators
            .windows(2)
            .any(|pair| pair[0].kind() == pair[1].kind())
        {
            return Err(RuleError::MalformedRule(
                "field condition repeats an operator".to_owned(),
            ));
        }

        Ok(Self { operators })
    }

    /// `$eq` condition.
    #[must_use]
    pub fn equals(value: impl Into<String>) -> Self {
        Self::single(ConditionOperator::Equals(value.into()))
    }

    /// `$ne` condition.
    #[must_use]
    pub fn not_equals(value: impl Into<String>) -> Self {
        Self::single(ConditionOperator::NotEquals(value.into()))
    }

    /// `$in` condition.
    #[must_use]
    pub fn one_of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::single(ConditionOperator::In(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// `$nin` condition.
    #[must_use]
    pub fn none_of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::single(ConditionOperator::NotIn(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// `$glob` condition.
    pub fn glob(pattern: impl Into<String>) -> Result<Self, RuleError> {
        Ok(Self::single(ConditionOperator::Glob(PathGlob::new(
            pattern,
        )?)))
    }

    /// `$all` / `$any` condition on a set attribute.
    #[must_use]
    pub fn contains<I, T>(values: I, mode: TagMatchMode) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::single(ConditionOperator::Contains {
            values: values.into_iter().map(Into::into).collect(),
            mode,
        })
    }

    fn single(operator: ConditionOperator) -> Self {
        Self {
            operators: vec![operator],
        }
    }

    /// Returns operators in canonical order.
    #[must_use]
    pub fn operators(&self) -> &[ConditionOperator] {
        self.operators.as_slice()
    }

    /// Returns whether every operator holds for the value.
    #[must_use]
    pub fn matches(&self, value: Option<&AttributeValue>) -> bool {
        self.operators.iter().all(|operator| operator.matches(value))
    }

    /// Encodes the condition as an operator object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .operators
            .iter()
            .map(|operator| {
                (
                    operator.kind().storage_key().to_owned(),
                    operator.operand_json(),
                )
            })
            .collect();
        Value::Object(object)
    }

    /// Decodes a bare string (implicit `$eq`) or an operator object.
    pub fn from_json(value: &Value) -> Result<Self, RuleError> {
        match value {
            Value::String(literal) => Ok(Self::equals(literal.clone())),
            Value::Object(object) => {
                let operators = object
                    .iter()
                    .map(|(key, operand)| {
                        let kind = OperatorKind::from_storage_key(key)
                            .ok_or_else(|| RuleError::UnknownOperator(key.clone()))?;
                        ConditionOperator::from_operand(kind, operand)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::new(operators)
            }
            _ => Err(RuleError::MalformedRule(
                "condition must be a string or an operator object".to_owned(),
            )),
        }
    }
}

/// Attribute conditions of a rule; every field condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeMap<String, FieldCondition>);

impl Conditions {
    /// Creates an empty condition set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field condition, replacing any previous one for the field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, condition: FieldCondition) -> Self {
        self.0.insert(field.into(), condition);
        self
    }

    /// Returns the condition for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldCondition> {
        self.0.get(field)
    }

    /// Iterates field conditions in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldCondition)> {
        self.0
            .iter()
            .map(|(field, condition)| (field.as_str(), condition))
    }

    /// Returns constrained field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns whether no field is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether the resource satisfies every field condition.
    #[must_use]
    pub fn matches(&self, attributes: &ResourceAttributes) -> bool {
        self.first_unmet_field(attributes).is_none()
    }

    /// Returns the first field whose condition the resource fails.
    #[must_use]
    pub fn first_unmet_field(&self, attributes: &ResourceAttributes) -> Option<&str> {
        self.iter()
            .find(|(field, condition)| !condition.matches(attributes.get(field)))
            .map(|(field, _)| field)
    }

    /// Encodes the conditions as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(field, condition)| (field.clone(), condition.to_json()))
                .collect(),
        )
    }

    /// Decodes a JSON object of field conditions.
    pub fn from_json(value: &Value) -> Result<Self, RuleError> {
        let object = value.as_object().ok_or_else(|| {
            RuleError::MalformedRule("conditions must be a JSON object".to_owned())
        })?;

        object
            .iter()
            .map(|(field, condition)| Ok((field.clone(), FieldCondition::from_json(condition)?)))
            .collect::<Result<BTreeMap<_, _>, RuleError>>()
            .map(Self)
    }
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}
