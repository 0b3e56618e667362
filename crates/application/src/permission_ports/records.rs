use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;
use vaultgate_core::{OrgId, ProjectId};
use vaultgate_domain::{
    AccessGrant, CUSTOM_ROLE_SLUG, RuleError, ServiceTokenScope, TemporaryAccessMode,
};

/// Stored temporary-access columns of a role assignment or privilege.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporaryAccessRecord {
    /// Whether the grant is time-bound at all.
    pub is_temporary: bool,
    /// Temporary mode storage value.
    pub mode: Option<String>,
    /// Duration text such as `1h`.
    pub range: Option<String>,
    /// Window start.
    pub starts_at: Option<DateTime<Utc>>,
    /// Explicit window end.
    pub ends_at: Option<DateTime<Utc>>,
}

impl TemporaryAccessRecord {
    /// Columns of a grant that never expires.
    #[must_use]
    pub fn permanent() -> Self {
        Self::default()
    }

    /// Columns of a relative grant lasting `range` from `starts_at`.
    #[must_use]
    pub fn relative(starts_at: DateTime<Utc>, range: impl Into<String>) -> Self {
        Self {
            is_temporary: true,
            mode: Some(TemporaryAccessMode::Relative.as_str().to_owned()),
            range: Some(range.into()),
            starts_at: Some(starts_at),
            ends_at: None,
        }
    }

    /// Decodes the columns into a grant.
    pub fn grant(&self) -> Result<AccessGrant, RuleError> {
        AccessGrant::from_parts(
            self.is_temporary,
            self.mode.as_deref(),
            self.range.as_deref(),
            self.starts_at,
            self.ends_at,
        )
    }
}

/// One role assigned to a membership, directly or through a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRoleRecord {
    /// Assignment id.
    pub id: Uuid,
    /// Predefined role slug, or `custom`.
    pub role: String,
    /// Referenced custom role when `role` is `custom`.
    pub custom_role_id: Option<Uuid>,
    /// Lifetime of the assignment.
    pub temporary_access: TemporaryAccessRecord,
}

impl MembershipRoleRecord {
    /// Permanent assignment of a predefined role.
    #[must_use]
    pub fn predefined(role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            custom_role_id: None,
            temporary_access: TemporaryAccessRecord::permanent(),
        }
    }

    /// Permanent assignment of a custom role.
    #[must_use]
    pub fn custom(custom_role_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: CUSTOM_ROLE_SLUG.to_owned(),
            custom_role_id: Some(custom_role_id),
            temporary_access: TemporaryAccessRecord::permanent(),
        }
    }

    /// Replaces the assignment lifetime.
    #[must_use]
    pub fn with_temporary_access(mut self, temporary_access: TemporaryAccessRecord) -> Self {
        self.temporary_access = temporary_access;
        self
    }

    /// Returns whether the assignment points at a custom role.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom_role_id.is_some() || self.role == CUSTOM_ROLE_SLUG
    }
}

/// Roles an actor holds through one group in the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRolesRecord {
    /// Group id.
    pub group_id: Uuid,
    /// Group role assignments in assignment order.
    pub roles: Vec<MembershipRoleRecord>,
}

/// Rule set attached directly to one membership.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditionalPrivilegeRecord {
    /// Privilege id.
    pub id: Uuid,
    /// Privilege slug.
    pub slug: String,
    /// Stored rules, packed or human-readable.
    pub permissions: Value,
    /// Lifetime of the privilege.
    pub temporary_access: TemporaryAccessRecord,
}

/// Everything the store knows about an actor inside one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipRecord {
    /// Membership id; for group-only members, the first group membership.
    pub membership_id: Uuid,
    /// Organization owning the scope.
    pub org_id: OrgId,
    /// Whether the organization requires single sign-on for users.
    pub org_auth_enforced: bool,
    /// Direct role assignments in assignment order.
    pub roles: Vec<MembershipRoleRecord>,
    /// Group-derived role assignments, groups in store order.
    pub group_roles: Vec<GroupRolesRecord>,
    /// Additional privileges in creation order.
    pub additional_privileges: Vec<AdditionalPrivilegeRecord>,
}

/// Custom role row.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomRoleRecord {
    /// Role id.
    pub id: Uuid,
    /// Role slug, unique in its scope.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Stored rules, packed or human-readable.
    pub permissions: Value,
}

/// Legacy project service token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTokenRecord {
    /// Token id.
    pub id: Uuid,
    /// Token name.
    pub name: String,
    /// Project the token is bound to.
    pub project_id: ProjectId,
    /// Organization owning the project.
    pub org_id: OrgId,
    /// Environment and path restrictions.
    pub scopes: Vec<ServiceTokenScope>,
    /// Stored grant names (`read`, `write`).
    pub permissions: Vec<String>,
    /// Expiry, when the token has one.
    pub expires_at: Option<DateTime<Utc>>,
}
