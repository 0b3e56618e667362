use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::PermissionRule;

/// Storage name of the wildcard action that covers every action.
pub const MANAGE_ACTION: &str = "manage";

/// Storage name of the wildcard subject that covers every subject.
pub const ALL_SUBJECTS: &str = "all";

/// Role slug marking a membership role that points at a custom role row.
pub const CUSTOM_ROLE_SLUG: &str = "custom";

/// Authorization boundary a permission set is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Organization-wide permissions.
    Organization,
    /// Project-level permissions.
    Project,
}

impl ScopeKind {
    /// Returns a stable storage value for this scope kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Project => "project",
        }
    }
}

/// Closed set of names with stable storage values.
pub trait VocabularyTerm: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Returns the storage value.
    fn as_str(&self) -> &'static str;

    /// Returns every member of the set in declaration order.
    fn all() -> &'static [Self];

    /// Parses a storage value.
    fn from_storage(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|term| term.as_str() == value)
    }
}

/// Actions, subjects and predefined roles of one authorization scope.
///
/// Implemented by zero-sized markers so rule sets of different scopes
/// cannot be mixed.
pub trait PermissionVocabulary:
    Debug + Clone + Copy + PartialEq + Eq + Send + Sync + 'static
{
    /// Operations rules may grant.
    type Action: VocabularyTerm;
    /// Resource categories rules apply to.
    type Subject: VocabularyTerm;

    /// Scope this vocabulary belongs to.
    const SCOPE: ScopeKind;

    /// Actions that are meaningful on the subject.
    fn supported_actions(subject: Self::Subject) -> &'static [Self::Action];

    /// Attribute names conditions on the subject may reference.
    fn condition_fields(subject: Self::Subject) -> &'static [&'static str];

    /// Condition attributes that hold a set of strings instead of one value.
    fn set_fields() -> &'static [&'static str] {
        &[]
    }

    /// Rules of a built-in role, or `None` when the slug is not predefined.
    fn predefined_role(slug: &str) -> Option<Vec<PermissionRule<Self>>>;

    /// Returns whether the slug names a built-in role.
    fn is_predefined_role(slug: &str) -> bool {
        Self::predefined_role(slug).is_some()
    }
}
