//! Compiled, queryable rule sets.
//!
//! Rules are evaluated last-match-wins: the newest rule covering the queried
//! action, subject and attributes decides. A later inverted rule revokes what
//! an earlier rule granted, wildcards included.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use vaultgate_core::AppError;

use crate::condition::{Conditions, ResourceAttributes};
use crate::rule::{PermissionRule, RuleSubject};
use crate::vocabulary::{PermissionVocabulary, ScopeKind, VocabularyTerm};

/// Outcome of evaluating one query against an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The rule at this position granted the query.
    Allowed {
        /// Position of the deciding rule.
        rule_index: usize,
    },
    /// The inverted rule at this position denied the query.
    Denied {
        /// Position of the deciding rule.
        rule_index: usize,
    },
    /// No rule covered the query; the default is deny.
    NoMatch,
}

impl Decision {
    /// Returns whether the query is permitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Merged permission rules of one actor in one scope.
#[derive(Debug, Clone)]
pub struct Ability<V: PermissionVocabulary> {
    rules: Vec<PermissionRule<V>>,
    index: HashMap<V::Subject, Vec<usize>>,
}

impl<V: PermissionVocabulary> Ability<V> {
    /// Compiles rules given in evaluation order.
    #[must_use]
    pub fn build(rules: Vec<PermissionRule<V>>) -> Self {
        let mut wildcard = Vec::new();
        let mut direct: HashMap<V::Subject, Vec<usize>> = HashMap::new();
        for (position, rule) in rules.iter().enumerate() {
            match rule.subject() {
                RuleSubject::All => wildcard.push(position),
                RuleSubject::Only(subject) => direct.entry(subject).or_default().push(position),
            }
        }

        let mut index = HashMap::new();
        for subject in V::Subject::all() {
            let mut positions = direct.remove(subject).unwrap_or_default();
            positions.extend_from_slice(&wildcard);
            if positions.is_empty() {
                continue;
            }
            positions.sort_unstable();
            index.insert(*subject, positions);
        }

        Self { rules, index }
    }

    /// Ability that denies everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PermissionRule<V>] {
        self.rules.as_slice()
    }

    /// Consumes the ability and returns its rules.
    #[must_use]
    pub fn into_rules(self) -> Vec<PermissionRule<V>> {
        self.rules
    }

    /// Returns whether the ability holds no rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn positions(&self, subject: V::Subject) -> &[usize] {
        self.index
            .get(&subject)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Positions of rules covering the action and subject, oldest first.
    pub(crate) fn covering_positions(
        &self,
        action: V::Action,
        subject: V::Subject,
    ) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.positions(subject)
            .iter()
            .copied()
            .filter(move |position| self.rules[*position].actions().includes(action))
    }

    /// Evaluates a query and reports which rule decided it.
    #[must_use]
    pub fn decide(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> Decision {
        self.covering_positions(action, subject)
            .rev()
            .find(|position| self.rules[*position].matches_attributes(attributes))
            .map_or(Decision::NoMatch, |rule_index| {
                if self.rules[rule_index].is_inverted() {
                    Decision::Denied { rule_index }
                } else {
                    Decision::Allowed { rule_index }
                }
            })
    }

    /// Returns whether the action is permitted on the resource.
    #[must_use]
    pub fn can(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> bool {
        self.decide(action, subject, attributes).is_allowed()
    }

    /// Negation of [`Ability::can`].
    #[must_use]
    pub fn cannot(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> bool {
        !self.can(action, subject, attributes)
    }

    /// Returns whether the action could be permitted on at least one resource
    /// of the subject type.
    ///
    /// Conditioned allow rules count as matches and conditioned inverted rules
    /// are skipped, since they only deny some resources.
    #[must_use]
    pub fn can_some(&self, action: V::Action, subject: V::Subject) -> bool {
        for position in self.covering_positions(action, subject).rev() {
            let rule = &self.rules[position];
            match (rule.conditions().is_some(), rule.is_inverted()) {
                (true, true) => continue,
                (_, inverted) => return !inverted,
            }
        }

        false
    }

    /// Rules covering the action and subject, newest first.
    #[must_use]
    pub fn relevant_rules(
        &self,
        action: V::Action,
        subject: V::Subject,
    ) -> Vec<&PermissionRule<V>> {
        self.covering_positions(action, subject)
            .rev()
            .map(|position| &self.rules[position])
            .collect()
    }

    /// Fails with a [`ForbiddenError`] unless the query is permitted.
    pub fn throw_unless_can(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> Result<(), ForbiddenError> {
        let reason = match self.decide(action, subject, attributes) {
            Decision::Allowed { .. } => return Ok(()),
            Decision::Denied { rule_index } => DenialReason::ExplicitDeny {
                conditions: self.rules[rule_index].conditions().cloned(),
            },
            Decision::NoMatch => DenialReason::NoMatchingRule {
                unmet_fields: self.unmet_fields(action, subject, attributes),
            },
        };

        let allowed_actions = V::supported_actions(subject)
            .iter()
            .copied()
            .filter(|candidate| *candidate != action && self.can_some(*candidate, subject))
            .map(|candidate| candidate.as_str())
            .collect();

        Err(ForbiddenError {
            scope: V::SCOPE,
            action: action.as_str(),
            subject: subject.as_str(),
            reason,
            allowed_actions,
        })
    }

    fn unmet_fields(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for position in self.covering_positions(action, subject).rev() {
            let rule = &self.rules[position];
            if rule.is_inverted() {
                continue;
            }
            let Some(field) = rule
                .conditions()
                .and_then(|conditions| conditions.first_unmet_field(attributes))
            else {
                continue;
            };
            if !fields.iter().any(|known| known == field) {
                fields.push(field.to_owned());
            }
        }

        fields
    }
}

/// Why a permission check was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// An inverted rule matched; carries its conditions.
    ExplicitDeny {
        /// Conditions of the denying rule, absent for unconditional denials.
        conditions: Option<Conditions>,
    },
    /// No rule matched.
    NoMatchingRule {
        /// Attributes whose conditions failed on otherwise applicable rules.
        unmet_fields: Vec<String>,
    },
}

/// Denied permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenError {
    /// Scope the check ran in.
    pub scope: ScopeKind,
    /// Queried action.
    pub action: &'static str,
    /// Queried subject.
    pub subject: &'static str,
    /// Denial cause.
    pub reason: DenialReason,
    /// Other actions on the subject still permitted for some resources.
    pub allowed_actions: Vec<&'static str>,
}

impl Display for ForbiddenError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "you lack permission to {} on {}",
            self.action, self.subject
        )?;

        match &self.reason {
            DenialReason::ExplicitDeny {
                conditions: Some(conditions),
            } => write!(formatter, " (denied where {})", conditions.to_json())?,
            DenialReason::ExplicitDeny { conditions: None } => {
                write!(formatter, " (explicitly denied)")?;
            }
            DenialReason::NoMatchingRule { unmet_fields } if !unmet_fields.is_empty() => {
                write!(formatter, " (conditions unmet on {})", unmet_fields.join(", "))?;
            }
            DenialReason::NoMatchingRule { .. } => {}
        }

        if !self.allowed_actions.is_empty() {
            write!(formatter, "; allowed: {}", self.allowed_actions.join(", "))?;
        }

        Ok(())
    }
}

impl std::error::Error for ForbiddenError {}

impl From<ForbiddenError> for AppError {
    fn from(error: ForbiddenError) -> Self {
        AppError::Forbidden(error.to_string())
    }
}
