use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;
use vaultgate_core::{Actor, AppResult, OrgId, ProjectId};
use vaultgate_domain::ScopeKind;

use super::records::{CustomRoleRecord, MembershipRecord, ServiceTokenRecord};

/// Concrete authorization boundary a check is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PermissionScope {
    /// One organization.
    Organization(OrgId),
    /// One project.
    Project(ProjectId),
}

impl PermissionScope {
    /// Returns the scope kind.
    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Organization(_) => ScopeKind::Organization,
            Self::Project(_) => ScopeKind::Project,
        }
    }
}

impl Display for PermissionScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization(org_id) => write!(formatter, "organization '{org_id}'"),
            Self::Project(project_id) => write!(formatter, "project '{project_id}'"),
        }
    }
}

/// Repository port for membership, role and token lookups.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Returns the actor's organization membership, direct or through groups.
    async fn find_org_membership(
        &self,
        actor: Actor,
        org_id: OrgId,
    ) -> AppResult<Option<MembershipRecord>>;

    /// Returns the actor's project membership, direct or through groups.
    async fn find_project_membership(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> AppResult<Option<MembershipRecord>>;

    /// Lists custom roles of the scope among `role_ids`. Unknown ids are omitted.
    async fn list_custom_roles(
        &self,
        scope: PermissionScope,
        role_ids: &[Uuid],
    ) -> AppResult<Vec<CustomRoleRecord>>;

    /// Finds one custom role of the scope by slug.
    async fn find_custom_role_by_slug(
        &self,
        scope: PermissionScope,
        slug: &str,
    ) -> AppResult<Option<CustomRoleRecord>>;

    /// Finds a service token by id.
    async fn find_service_token(&self, token_id: Uuid) -> AppResult<Option<ServiceTokenRecord>>;
}
