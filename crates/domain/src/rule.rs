use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::condition::{Conditions, ResourceAttributes};
use crate::vocabulary::{ALL_SUBJECTS, MANAGE_ACTION, PermissionVocabulary, VocabularyTerm};
use crate::RuleError;

/// Actions granted or denied by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleActions<A> {
    /// Every action, stored as `manage`.
    All,
    /// Listed actions in definition order.
    Only(Vec<A>),
}

impl<A: VocabularyTerm> RuleActions<A> {
    /// Returns whether the queried action is covered.
    #[must_use]
    pub fn includes(&self, action: A) -> bool {
        match self {
            Self::All => true,
            Self::Only(actions) => actions.contains(&action),
        }
    }

    /// Returns the storage names.
    #[must_use]
    pub fn storage_names(&self) -> Vec<&'static str> {
        match self {
            Self::All => vec![MANAGE_ACTION],
            Self::Only(actions) => actions.iter().map(VocabularyTerm::as_str).collect(),
        }
    }

    fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, RuleError> {
        let mut actions = Vec::new();
        for name in names {
            let name = name.trim();
            if name == MANAGE_ACTION {
                return Ok(Self::All);
            }

            let action =
                A::from_storage(name).ok_or_else(|| RuleError::UnknownAction(name.to_owned()))?;
            if !actions.contains(&action) {
                actions.push(action);
            }
        }

        if actions.is_empty() {
            return Err(RuleError::MalformedRule(
                "rule must name at least one action".to_owned(),
            ));
        }

        Ok(Self::Only(actions))
    }

    fn normalized(self) -> Self {
        match self {
            Self::All => Self::All,
            Self::Only(actions) => Self::Only(unique_actions(actions)),
        }
    }
}

fn unique_actions<A: PartialEq>(actions: impl IntoIterator<Item = A>) -> Vec<A> {
    let mut unique = Vec::new();
    for action in actions {
        if !unique.contains(&action) {
            unique.push(action);
        }
    }

    unique
}

/// Subject a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSubject<S> {
    /// Every subject, stored as `all`.
    All,
    /// One subject.
    Only(S),
}

impl<S: VocabularyTerm> RuleSubject<S> {
    /// Returns whether the queried subject is covered.
    #[must_use]
    pub fn includes(&self, subject: S) -> bool {
        match self {
            Self::All => true,
            Self::Only(own) => *own == subject,
        }
    }

    /// Returns the storage name.
    #[must_use]
    pub fn storage_name(&self) -> &'static str {
        match self {
            Self::All => ALL_SUBJECTS,
            Self::Only(subject) => subject.as_str(),
        }
    }

    fn parse(name: &str) -> Result<Self, RuleError> {
        if name == ALL_SUBJECTS {
            return Ok(Self::All);
        }

        S::from_storage(name)
            .map(Self::Only)
            .ok_or_else(|| RuleError::UnknownSubject(name.to_owned()))
    }
}

/// One permission grant (or explicit denial when inverted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule<V: PermissionVocabulary> {
    actions: RuleActions<V::Action>,
    subject: RuleSubject<V::Subject>,
    conditions: Option<Conditions>,
    inverted: bool,
}

impl<V: PermissionVocabulary> PermissionRule<V> {
    /// Creates a validated rule.
    pub fn new(
        actions: RuleActions<V::Action>,
        subject: RuleSubject<V::Subject>,
        conditions: Option<Conditions>,
        inverted: bool,
    ) -> Result<Self, RuleError> {
        let rule = Self {
            actions: actions.normalized(),
            subject,
            conditions: conditions.filter(|conditions| !conditions.is_empty()),
            inverted,
        };
        rule.validate()?;

        Ok(rule)
    }

    /// Allow rule covering every action on every subject.
    #[must_use]
    pub fn manage_all() -> Self {
        Self {
            actions: RuleActions::All,
            subject: RuleSubject::All,
            conditions: None,
            inverted: false,
        }
    }

    /// Checks the rule against the scope vocabulary.
    pub fn validate(&self) -> Result<(), RuleError> {
        if matches!(&self.actions, RuleActions::Only(actions) if actions.is_empty()) {
            return Err(RuleError::MalformedRule(
                "rule must name at least one action".to_owned(),
            ));
        }

        let RuleSubject::Only(subject) = self.subject else {
            if self.conditions.is_some() {
                return Err(RuleError::MalformedRule(format!(
                    "conditions are not allowed on subject '{ALL_SUBJECTS}'"
                )));
            }
            return Ok(());
        };

        if let RuleActions::Only(actions) = &self.actions {
            let supported = V::supported_actions(subject);
            if let Some(action) = actions.iter().find(|action| !supported.contains(*action)) {
                return Err(RuleError::UnsupportedAction {
                    action: action.as_str().to_owned(),
                    subject: subject.as_str().to_owned(),
                });
            }
        }

        if let Some(conditions) = &self.conditions {
            let declared = V::condition_fields(subject);
            let undeclared = conditions
                .fields()
                .find(|field| !declared.iter().any(|declared| declared == field));
            if let Some(field) = undeclared {
                return Err(RuleError::UnknownConditionField {
                    field: field.to_owned(),
                    subject: subject.as_str().to_owned(),
                });
            }
        }

        Ok(())
    }

    /// Returns the covered actions.
    #[must_use]
    pub fn actions(&self) -> &RuleActions<V::Action> {
        &self.actions
    }

    /// Returns the covered subject.
    #[must_use]
    pub fn subject(&self) -> RuleSubject<V::Subject> {
        self.subject
    }

    /// Returns the attribute conditions, if any.
    #[must_use]
    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// Returns whether this rule denies instead of grants.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Returns whether the rule covers the action and subject.
    #[must_use]
    pub fn applies_to(&self, action: V::Action, subject: V::Subject) -> bool {
        self.actions.includes(action) && self.subject.includes(subject)
    }

    /// Returns whether the rule's conditions hold for the resource.
    #[must_use]
    pub fn matches_attributes(&self, attributes: &ResourceAttributes) -> bool {
        self.conditions
            .as_ref()
            .is_none_or(|conditions| conditions.matches(attributes))
    }

    /// Converts the rule to its human-readable document form.
    #[must_use]
    pub fn to_document(&self) -> RuleDocument {
        RuleDocument {
            action: RuleDocumentAction::Many(
                self.actions
                    .storage_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            ),
            subject: self.subject.storage_name().to_owned(),
            conditions: self.conditions.as_ref().map(Conditions::to_json),
            inverted: self.inverted,
        }
    }

    /// Builds a validated rule from its document form.
    pub fn from_document(document: &RuleDocument) -> Result<Self, RuleError> {
        let actions = match &document.action {
            RuleDocumentAction::One(name) => RuleActions::parse(name.split(',')),
            RuleDocumentAction::Many(names) => RuleActions::parse(names.iter().map(String::as_str)),
        }?;
        let subject = RuleSubject::parse(document.subject.as_str())?;
        let conditions = document
            .conditions
            .as_ref()
            .filter(|value| !value.is_null())
            .map(Conditions::from_json)
            .transpose()?;

        Self::new(actions, subject, conditions, document.inverted)
    }

    pub(crate) fn parts(
        actions: &str,
        subject: &str,
        conditions: Option<Conditions>,
        inverted: bool,
    ) -> Result<Self, RuleError> {
        Self::new(
            RuleActions::parse(actions.split(','))?,
            RuleSubject::parse(subject)?,
            conditions,
            inverted,
        )
    }
}

impl<V: PermissionVocabulary> Serialize for PermissionRule<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de, V: PermissionVocabulary> Deserialize<'de> for PermissionRule<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = RuleDocument::deserialize(deserializer)?;
        Self::from_document(&document).map_err(serde::de::Error::custom)
    }
}

/// Action field of a rule document: one name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleDocumentAction {
    /// Single action name.
    One(String),
    /// Several action names.
    Many(Vec<String>),
}

/// Human-readable rule shape returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Action storage names.
    pub action: RuleDocumentAction,
    /// Subject storage name.
    pub subject: String,
    /// Condition object keyed by attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
    /// Whether the rule denies.
    #[serde(default)]
    pub inverted: bool,
}

/// Accumulates rules in definition order, mirroring how roles are written.
#[derive(Debug, Clone)]
pub struct RuleSetBuilder<V: PermissionVocabulary> {
    rules: Vec<PermissionRule<V>>,
}

impl<V: PermissionVocabulary> Default for RuleSetBuilder<V> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<V: PermissionVocabulary> RuleSetBuilder<V> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants every action on every subject.
    #[must_use]
    pub fn manage_all(mut self) -> Self {
        self.rules.push(PermissionRule::manage_all());
        self
    }

    /// Grants actions on a subject.
    ///
    /// Repeated actions are kept once; an empty action list adds no rule.
    #[must_use]
    pub fn can(self, actions: impl IntoIterator<Item = V::Action>, subject: V::Subject) -> Self {
        self.push(actions, subject, None, false)
    }

    /// Grants actions on a subject when the conditions hold.
    #[must_use]
    pub fn can_where(
        self,
        actions: impl IntoIterator<Item = V::Action>,
        subject: V::Subject,
        conditions: Conditions,
    ) -> Self {
        self.push(actions, subject, Some(conditions), false)
    }

    /// Denies actions on a subject.
    #[must_use]
    pub fn cannot(self, actions: impl IntoIterator<Item = V::Action>, subject: V::Subject) -> Self {
        self.push(actions, subject, None, true)
    }

    /// Denies actions on a subject when the conditions hold.
    #[must_use]
    pub fn cannot_where(
        self,
        actions: impl IntoIterator<Item = V::Action>,
        subject: V::Subject,
        conditions: Conditions,
    ) -> Self {
        self.push(actions, subject, Some(conditions), true)
    }

    fn push(
        mut self,
        actions: impl IntoIterator<Item = V::Action>,
        subject: V::Subject,
        conditions: Option<Conditions>,
        inverted: bool,
    ) -> Self {
        let actions = unique_actions(actions);
        if actions.is_empty() {
            return self;
        }

        self.rules.push(PermissionRule {
            actions: RuleActions::Only(actions),
            subject: RuleSubject::Only(subject),
            conditions: conditions.filter(|conditions| !conditions.is_empty()),
            inverted,
        });
        self
    }

    /// Returns the rules in definition order.
    #[must_use]
    pub fn build(self) -> Vec<PermissionRule<V>> {
        self.rules
    }

    /// Returns the rules after validating each against the vocabulary.
    pub fn try_build(self) -> Result<Vec<PermissionRule<V>>, RuleError> {
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|error| error.at(index))?;
        }

        Ok(self.rules)
    }
}
