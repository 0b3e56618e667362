//! Compact storage form of rule lists.
//!
//! A packed rule is a JSON array `[actions, subject, conditions, inverted]`
//! with actions joined by `,`, `0` for absent conditions and `1`/`0` for the
//! inverted flag. Trailing default slots are trimmed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Conditions;
use crate::rule::{PermissionRule, RuleDocument};
use crate::vocabulary::PermissionVocabulary;
use crate::RuleError;

/// One rule in its packed storage form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedRule(Vec<Value>);

impl PackedRule {
    /// Packs a single rule.
    #[must_use]
    pub fn pack<V: PermissionVocabulary>(rule: &PermissionRule<V>) -> Self {
        let mut slots = vec![
            Value::String(rule.actions().storage_names().join(",")),
            Value::String(rule.subject().storage_name().to_owned()),
            rule.conditions()
                .map_or(Value::from(0), Conditions::to_json),
            Value::from(u8::from(rule.is_inverted())),
        ];

        while slots.len() > 2 && slots.last().is_some_and(|slot| *slot == Value::from(0)) {
            slots.pop();
        }

        Self(slots)
    }

    /// Unpacks and validates a single rule.
    pub fn unpack<V: PermissionVocabulary>(&self) -> Result<PermissionRule<V>, RuleError> {
        unpack_slots(self.0.as_slice())
    }

    /// Returns the raw slots.
    #[must_use]
    pub fn slots(&self) -> &[Value] {
        self.0.as_slice()
    }
}

fn unpack_slots<V: PermissionVocabulary>(slots: &[Value]) -> Result<PermissionRule<V>, RuleError> {
    let (actions, subject, rest) = match slots {
        [actions, subject, rest @ ..] if rest.len() <= 2 => (actions, subject, rest),
        _ => {
            return Err(RuleError::MalformedRule(format!(
                "packed rule must have 2 to 4 slots, found {}",
                slots.len()
            )));
        }
    };

    let actions = actions.as_str().ok_or_else(|| {
        RuleError::MalformedRule("packed actions must be a string".to_owned())
    })?;
    let subject = subject.as_str().ok_or_else(|| {
        RuleError::MalformedRule("packed subject must be a string".to_owned())
    })?;

    let conditions = match rest.first() {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) if number.as_u64() == Some(0) => None,
        Some(value) => Some(Conditions::from_json(value)?),
    };

    let inverted = match rest.get(1) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => match number.as_u64() {
            Some(0) => false,
            Some(1) => true,
            _ => {
                return Err(RuleError::MalformedRule(format!(
                    "packed inverted flag must be 0 or 1, found {number}"
                )));
            }
        },
        Some(other) => {
            return Err(RuleError::MalformedRule(format!(
                "packed inverted flag has unexpected value {other}"
            )));
        }
    };

    PermissionRule::parts(actions, subject, conditions, inverted)
}

/// Packs rules in order.
#[must_use]
pub fn pack_rules<V: PermissionVocabulary>(rules: &[PermissionRule<V>]) -> Vec<PackedRule> {
    rules.iter().map(PackedRule::pack).collect()
}

/// Unpacks rules in order; the first failure carries its rule index.
pub fn unpack_rules<V: PermissionVocabulary>(
    packed: &[PackedRule],
) -> Result<Vec<PermissionRule<V>>, RuleError> {
    packed
        .iter()
        .enumerate()
        .map(|(index, rule)| rule.unpack().map_err(|error| error.at(index)))
        .collect()
}

/// Packs rules into the JSON value persisted on role rows.
#[must_use]
pub fn pack_rules_value<V: PermissionVocabulary>(rules: &[PermissionRule<V>]) -> Value {
    Value::Array(
        pack_rules(rules)
            .into_iter()
            .map(|packed| Value::Array(packed.0))
            .collect(),
    )
}

/// Decodes a persisted permissions value.
///
/// Accepts packed arrays, human-readable rule objects, or either of those
/// stored as a JSON string.
pub fn unpack_rules_value<V: PermissionVocabulary>(
    value: &Value,
) -> Result<Vec<PermissionRule<V>>, RuleError> {
    match value {
        Value::String(raw) => {
            let decoded = serde_json::from_str::<Value>(raw).map_err(|error| {
                RuleError::MalformedRule(format!("permissions are not valid JSON: {error}"))
            })?;
            if decoded.is_string() {
                return Err(RuleError::MalformedRule(
                    "permissions are doubly encoded".to_owned(),
                ));
            }
            unpack_rules_value(&decoded)
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| unpack_item(item).map_err(|error| error.at(index)))
            .collect(),
        _ => Err(RuleError::MalformedRule(
            "permissions must be a JSON array".to_owned(),
        )),
    }
}

fn unpack_item<V: PermissionVocabulary>(item: &Value) -> Result<PermissionRule<V>, RuleError> {
    match item {
        Value::Array(slots) => unpack_slots(slots),
        Value::Object(_) => {
            let document = serde_json::from_value::<RuleDocument>(item.clone())
                .map_err(|error| RuleError::MalformedRule(error.to_string()))?;
            PermissionRule::from_document(&document)
        }
        _ => Err(RuleError::MalformedRule(
            "rule must be a packed array or a rule object".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::{PackedRule, pack_rules, pack_rules_value, unpack_rules, unpack_rules_value};
    use crate::{
        Conditions, FieldCondition, PermissionRule, PermissionVocabulary, ProjectAction,
        ProjectPermissions, ProjectSubject, RuleActions, RuleError, RuleSetBuilder, RuleSubject,
        TagMatchMode, VocabularyTerm,
    };

    fn path_glob(pattern: &str) -> FieldCondition {
        match FieldCondition::glob(pattern) {
            Ok(condition) => condition,
            Err(error) => panic!("pattern should compile: {error}"),
        }
    }

    #[test]
    fn packed_form_trims_default_slots() {
        let rules = RuleSetBuilder::<ProjectPermissions>::new()
            .can([ProjectAction::Read, ProjectAction::Edit], ProjectSubject::Secrets)
            .cannot([ProjectAction::Delete], ProjectSubject::Secrets)
            .can_where(
                [ProjectAction::Read],
                ProjectSubject::SecretFolders,
                Conditions::new().with("environment", FieldCondition::equals("dev")),
            )
            .build();

        assert_eq!(
            pack_rules_value(&rules),
            json!([
                ["read,edit", "secrets"],
                ["delete", "secrets", 0, 1],
                ["read", "secret-folders", { "environment": { "$eq": "dev" } }],
            ])
        );
    }

    #[test]
    fn wildcard_rule_packs_to_manage_all() {
        let packed = PackedRule::pack(&PermissionRule::<ProjectPermissions>::manage_all());
        assert_eq!(packed.slots(), &[json!("manage"), json!("all")]);
    }

    #[test]
    fn unpack_accepts_readable_documents_and_string_encoding() {
        let stored = json!([
            { "action": "read", "subject": "secrets" },
            ["edit", "secrets", { "secretPath": { "$glob": "/app/**" } }],
        ])
        .to_string();

        let rules = unpack_rules_value::<ProjectPermissions>(&json!(stored));
        let Ok(rules) = rules else {
            panic!("mixed stored permissions should decode");
        };
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].actions(), &RuleActions::Only(vec![ProjectAction::Read]));
        assert!(rules[1].conditions().is_some());
    }

    #[test]
    fn unpack_reports_index_of_malformed_rule() {
        let stored = json!([
            ["read", "secrets"],
            ["read", "secrets", { "environment": { "$regex": "prod" } }],
        ]);

        let result = unpack_rules_value::<ProjectPermissions>(&stored);
        assert!(matches!(
            result,
            Err(RuleError::AtIndex { index: 1, ref source })
                if matches!(**source, RuleError::UnknownOperator(_))
        ));
    }

    #[test]
    fn unpack_rejects_unknown_action_and_bad_shapes() {
        assert!(unpack_rules_value::<ProjectPermissions>(&json!([["fly", "secrets"]])).is_err());
        assert!(unpack_rules_value::<ProjectPermissions>(&json!([["read"]])).is_err());
        assert!(unpack_rules_value::<ProjectPermissions>(&json!([["read", "secrets", 0, 2]])).is_err());
        assert!(unpack_rules_value::<ProjectPermissions>(&json!({ "rules": [] })).is_err());
    }

    fn arb_conditions() -> impl Strategy<Value = Option<Conditions>> {
        let environment = prop_oneof![
            "[a-z]{1,8}".prop_map(|value| FieldCondition::equals(value)),
            "[a-z]{1,8}".prop_map(|value| FieldCondition::not_equals(value)),
            prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|values| FieldCondition::one_of(values)),
            prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|values| FieldCondition::none_of(values)),
        ];
        let secret_path = "(/[a-z]{1,5}){1,3}".prop_map(|prefix| path_glob(&format!("{prefix}/**")));
        let secret_tags = (prop::collection::vec("[a-z]{1,6}", 1..4), any::<bool>()).prop_map(
            |(tags, all)| {
                let mode = if all { TagMatchMode::All } else { TagMatchMode::Any };
                FieldCondition::contains(tags, mode)
            },
        );

        (
            prop::option::of(environment),
            prop::option::of(secret_path),
            prop::option::of(secret_tags),
        )
            .prop_map(|(environment, secret_path, secret_tags)| {
                let mut conditions = Conditions::new();
                if let Some(condition) = environment {
                    conditions = conditions.with("environment", condition);
                }
                if let Some(condition) = secret_path {
                    conditions = conditions.with("secretPath", condition);
                }
                if let Some(condition) = secret_tags {
                    conditions = conditions.with("secretTags", condition);
                }
                Some(conditions).filter(|conditions| !conditions.is_empty())
            })
    }

    fn arb_rule() -> impl Strategy<Value = PermissionRule<ProjectPermissions>> {
        (
            prop::sample::subsequence(SHARED_ACTIONS.to_vec(), 1..=SHARED_ACTIONS.len()),
            prop::sample::select(vec![ProjectSubject::Secrets, ProjectSubject::SecretFolders]),
            arb_conditions(),
            any::<bool>(),
        )
            .prop_filter_map("actions must suit the subject", |(actions, subject, conditions, inverted)| {
                let conditions = match (subject, conditions) {
                    (ProjectSubject::SecretFolders, Some(conditions)) => {
                        Some(conditions).filter(|conditions| {
                            conditions
                                .fields()
                                .all(|field| field == "environment" || field == "secretPath")
                        })
                    }
                    (_, conditions) => conditions,
                };
                PermissionRule::new(
                    RuleActions::Only(actions),
                    RuleSubject::Only(subject),
                    conditions,
                    inverted,
                )
                .ok()
            })
    }

    const SHARED_ACTIONS: &[ProjectAction] = &[
        ProjectAction::Read,
        ProjectAction::Create,
        ProjectAction::Edit,
        ProjectAction::Delete,
    ];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn unpack_inverts_pack(rules in prop::collection::vec(arb_rule(), 0..8)) {
            let packed = pack_rules(&rules);
            let restored = unpack_rules::<ProjectPermissions>(&packed);
            prop_assert_eq!(restored, Ok(rules.clone()));

            let via_value = unpack_rules_value::<ProjectPermissions>(&pack_rules_value(&rules));
            prop_assert_eq!(via_value, Ok(rules));
        }
    }

    #[test]
    fn every_project_action_survives_packing() {
        let rules: Vec<PermissionRule<ProjectPermissions>> = ProjectSubject::all()
            .iter()
            .flat_map(|subject| {
                RuleSetBuilder::<ProjectPermissions>::new()
                    .can(
                        ProjectPermissions::supported_actions(*subject).iter().copied(),
                        *subject,
                    )
                    .build()
            })
            .collect();

        assert_eq!(unpack_rules(&pack_rules(&rules)), Ok(rules));
    }
}
