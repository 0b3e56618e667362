//! Permission rules, their evaluation and their storage form.

#![forbid(unsafe_code)]

mod ability;
mod boundary;
mod condition;
mod error;
mod membership;
mod org;
mod pack;
mod project;
mod rule;
mod vocabulary;

pub use ability::{Ability, Decision, DenialReason, ForbiddenError};
pub use boundary::{BoundaryReport, MissingPermission, validate_permission_boundary};
pub use condition::{
    AttributeValue, ConditionOperator, Conditions, FieldCondition, OperatorKind, PathGlob,
    ResourceAttributes, TagMatchMode,
};
pub use error::RuleError;
pub use membership::{
    AccessGrant, TemporaryAccessMode, TemporaryAccessWindow, parse_temporary_range,
};
pub use org::{OrgAction, OrgPermissions, OrgSubject};
pub use pack::{PackedRule, pack_rules, pack_rules_value, unpack_rules, unpack_rules_value};
pub use project::{
    ProjectAction, ProjectPermissions, ProjectRule, ProjectSubject, ServiceTokenPermission,
    ServiceTokenScope, service_token_rules,
};
pub use rule::{
    PermissionRule, RuleActions, RuleDocument, RuleDocumentAction, RuleSetBuilder, RuleSubject,
};
pub use vocabulary::{
    ALL_SUBJECTS, CUSTOM_ROLE_SLUG, MANAGE_ACTION, PermissionVocabulary, ScopeKind,
    VocabularyTerm,
};

#[cfg(test)]
mod tests;
