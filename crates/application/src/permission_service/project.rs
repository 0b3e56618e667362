use vaultgate_core::{Actor, ProjectId};
use vaultgate_domain::ProjectPermissions;

use super::*;

impl PermissionService {
    /// Builds the project ability of a user, machine identity or service token.
    pub async fn get_project_permission(
        &self,
        actor: Actor,
        project_id: ProjectId,
        auth_method: ActorAuthMethod,
        actor_org_id: Option<OrgId>,
    ) -> Result<ScopedPermission<ProjectPermissions>, PermissionError> {
        let resolved = self.resolver.resolve_project(actor, project_id).await?;
        compile(resolved, auth_method, actor_org_id)
    }

    /// Builds the ability of one project role.
    pub async fn get_project_permission_by_role(
        &self,
        role_slug: &str,
        project_id: ProjectId,
    ) -> Result<Ability<ProjectPermissions>, PermissionError> {
        self.role_ability(PermissionScope::Project(project_id), role_slug)
            .await
    }
}
