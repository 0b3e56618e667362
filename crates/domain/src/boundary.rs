//! Privilege boundary between a granting ability and a requested rule set.
//!
//! A child rule set stays inside its parent when every (action, subject)
//! it grants is granted by the parent for at least the same resources, and
//! no later parent denial could overlap those resources. Operator
//! containment is decided syntactically and respects whether an attribute
//! holds one value or a set; anything not provable counts as a missing
//! permission.

use serde::Serialize;

use crate::ability::Ability;
use crate::condition::{ConditionOperator, Conditions, FieldCondition, PathGlob, TagMatchMode};
use crate::rule::{PermissionRule, RuleActions, RuleSubject};
use crate::vocabulary::{PermissionVocabulary, VocabularyTerm};

/// One (action, subject) pair the parent does not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPermission {
    /// Action storage name.
    pub action: &'static str,
    /// Subject storage name.
    pub subject: &'static str,
    /// Conditions of the uncovered child rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

/// Result of [`validate_permission_boundary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryReport {
    /// Whether the child stays inside the parent.
    pub is_valid: bool,
    /// Uncovered grants, in child rule order.
    pub missing_permissions: Vec<MissingPermission>,
}

/// Checks that `child` never grants more than `parent`.
///
/// Inverted child rules only narrow and are ignored.
#[must_use]
pub fn validate_permission_boundary<V: PermissionVocabulary>(
    parent: &Ability<V>,
    child: &[PermissionRule<V>],
) -> BoundaryReport {
    let mut missing_permissions: Vec<MissingPermission> = Vec::new();

    for rule in child.iter().filter(|rule| !rule.is_inverted()) {
        for (action, subject) in expand_pairs(rule) {
            if is_covered(parent, action, subject, rule.conditions()) {
                continue;
            }

            let entry = MissingPermission {
                action: action.as_str(),
                subject: subject.as_str(),
                conditions: rule.conditions().cloned(),
            };
            if !missing_permissions.contains(&entry) {
                missing_permissions.push(entry);
            }
        }
    }

    BoundaryReport {
        is_valid: missing_permissions.is_empty(),
        missing_permissions,
    }
}

fn expand_pairs<V: PermissionVocabulary>(
    rule: &PermissionRule<V>,
) -> Vec<(V::Action, V::Subject)> {
    let subjects: Vec<V::Subject> = match rule.subject() {
        RuleSubject::All => V::Subject::all().to_vec(),
        RuleSubject::Only(subject) => vec![subject],
    };

    let mut pairs = Vec::new();
    for subject in subjects {
        match rule.actions() {
            RuleActions::All => pairs.extend(
                V::supported_actions(subject)
                    .iter()
                    .map(|action| (*action, subject)),
            ),
            RuleActions::Only(actions) => pairs.extend(
                actions
                    .iter()
                    .filter(|action| V::supported_actions(subject).contains(*action))
                    .map(|action| (*action, subject)),
            ),
        }
    }

    pairs
}

fn is_covered<V: PermissionVocabulary>(
    parent: &Ability<V>,
    action: V::Action,
    subject: V::Subject,
    child: Option<&Conditions>,
) -> bool {
    let positions: Vec<usize> = parent.covering_positions(action, subject).collect();
    let rules = parent.rules();

    positions.iter().enumerate().any(|(offset, position)| {
        let grant = &rules[*position];
        !grant.is_inverted()
            && conditions_contain::<V>(grant.conditions(), child)
            && positions[offset + 1..].iter().all(|later| {
                let later = &rules[*later];
                !later.is_inverted() || conditions_disjoint::<V>(later.conditions(), child)
            })
    })
}

/// How many values a resource attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Single,
    Set,
}

impl Cardinality {
    fn of<V: PermissionVocabulary>(field: &str) -> Self {
        if V::set_fields().iter().any(|declared| *declared == field) {
            Self::Set
        } else {
            Self::Single
        }
    }
}

fn conditions_contain<V: PermissionVocabulary>(
    parent: Option<&Conditions>,
    child: Option<&Conditions>,
) -> bool {
    let Some(parent) = parent else {
        return true;
    };
    let Some(child) = child else {
        return false;
    };

    parent.iter().all(|(field, parent_field)| {
        let cardinality = Cardinality::of::<V>(field);
        child
            .get(field)
            .is_some_and(|child_field| field_contains(parent_field, child_field, cardinality))
    })
}

fn field_contains(
    parent: &FieldCondition,
    child: &FieldCondition,
    cardinality: Cardinality,
) -> bool {
    parent.operators().iter().all(|parent_operator| {
        child.operators().iter().any(|child_operator| {
            operator_contains(parent_operator, child_operator, cardinality)
        })
    })
}

fn conditions_disjoint<V: PermissionVocabulary>(
    denial: Option<&Conditions>,
    child: Option<&Conditions>,
) -> bool {
    let (Some(denial), Some(child)) = (denial, child) else {
        return false;
    };

    denial.iter().any(|(field, denial_field)| {
        let cardinality = Cardinality::of::<V>(field);
        child.get(field).is_some_and(|child_field| {
            denial_field.operators().iter().any(|denial_operator| {
                child_field.operators().iter().any(|child_operator| {
                    operators_disjoint(denial_operator, child_operator, cardinality)
                })
            })
        })
    })
}

/// Whether every attribute satisfying `child` also satisfies `parent`.
///
/// On a set attribute `$eq`, `$in` and `$glob` only ask that some member
/// matches, so a negative parent says nothing about a positive child.
fn operator_contains(
    parent: &ConditionOperator,
    child: &ConditionOperator,
    cardinality: Cardinality,
) -> bool {
    use ConditionOperator::{Contains, Equals, Glob, In, NotEquals, NotIn};

    let single = cardinality == Cardinality::Single;

    match (parent, child) {
        (Equals(expected), Equals(value)) => expected == value,
        (Equals(expected), In(values)) => {
            !values.is_empty() && values.iter().all(|value| value == expected)
        }
        (Equals(expected), Glob(glob)) => glob.is_literal() && glob.as_str() == expected,

        (NotEquals(excluded), Equals(value)) if single => value != excluded,
        (NotEquals(excluded), NotEquals(value)) => value == excluded,
        (NotEquals(excluded), In(values)) if single => !values.contains(excluded),
        (NotEquals(excluded), NotIn(values)) => values.contains(excluded),
        (NotEquals(excluded), Glob(glob)) if single => !glob.is_match(excluded),

        (In(options), Equals(value)) => options.contains(value),
        (In(options), In(values)) => {
            !values.is_empty() && values.iter().all(|value| options.contains(value))
        }
        (In(options), Glob(glob)) => {
            glob.is_literal() && options.iter().any(|option| option == glob.as_str())
        }

        (NotIn(excluded), Equals(value)) if single => !excluded.contains(value),
        (NotIn(excluded), In(values)) if single => {
            values.iter().all(|value| !excluded.contains(value))
        }
        (NotIn(excluded), NotIn(values)) => excluded.iter().all(|value| values.contains(value)),
        (NotIn(excluded), Glob(glob)) if single => {
            !excluded.iter().any(|value| glob.is_match(value))
        }

        (Glob(pattern), Equals(value)) => pattern.is_match(value),
        (Glob(pattern), In(values)) => {
            !values.is_empty() && values.iter().all(|value| pattern.is_match(value))
        }
        (Glob(pattern), Glob(glob)) => glob_contains(pattern, glob),

        (
            Contains {
                values: required,
                mode: TagMatchMode::All,
            },
            Contains {
                values,
                mode: TagMatchMode::All,
            },
        ) => !required.is_empty() && required.iter().all(|tag| values.contains(tag)),
        (
            Contains {
                values: accepted,
                mode: TagMatchMode::Any,
            },
            Contains {
                values,
                mode: TagMatchMode::Any,
            },
        ) => !values.is_empty() && values.iter().all(|tag| accepted.contains(tag)),

        _ => false,
    }
}

/// Whether every value matched by `child` is matched by `parent`.
fn glob_contains(parent: &PathGlob, child: &PathGlob) -> bool {
    if child.is_literal() {
        return parent.is_match(child.as_str());
    }

    parent.is_prefix_pattern() && child.literal_prefix().starts_with(parent.literal_prefix())
}

/// Whether no attribute can satisfy both operators.
///
/// A set can hold several distinct members at once, so two positive
/// operators naming different values never exclude each other there.
fn operators_disjoint(
    denial: &ConditionOperator,
    child: &ConditionOperator,
    cardinality: Cardinality,
) -> bool {
    use ConditionOperator::{Contains, Equals, Glob, In, NotEquals, NotIn};

    let single = cardinality == Cardinality::Single;

    match (denial, child) {
        (Equals(denied), Equals(value)) if single => denied != value,
        (Equals(denied), In(values)) if single => !values.contains(denied),
        (Equals(denied), NotEquals(value)) => denied == value,
        (Equals(denied), NotIn(values)) => values.contains(denied),
        (Equals(denied), Glob(glob)) if single => !glob.is_match(denied),

        (NotEquals(allowed), Equals(value)) => allowed == value,
        (NotEquals(allowed), In(values)) => {
            !values.is_empty() && values.iter().all(|value| value == allowed)
        }

        (In(denied), Equals(value)) if single => !denied.contains(value),
        (In(denied), In(values)) if single => !values.iter().any(|value| denied.contains(value)),
        (In(denied), NotIn(values)) => denied.iter().all(|value| values.contains(value)),
        (In(denied), Glob(glob)) if single => !denied.iter().any(|value| glob.is_match(value)),

        (NotIn(allowed), Equals(value)) => allowed.contains(value),
        (NotIn(allowed), In(values)) => {
            !values.is_empty() && values.iter().all(|value| allowed.contains(value))
        }

        (Glob(pattern), Equals(value)) if single => !pattern.is_match(value),
        (Glob(pattern), In(values)) if single => {
            !values.iter().any(|value| pattern.is_match(value))
        }

        (
            Contains {
                values: denied,
                mode: TagMatchMode::Any,
            },
            NotIn(values),
        ) => denied.iter().all(|tag| values.contains(tag)),

        _ => false,
    }
}
