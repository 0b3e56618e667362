use vaultgate_core::Actor;
use vaultgate_domain::OrgPermissions;

use super::*;

impl PermissionService {
    /// Builds the organization ability of a user or machine identity.
    ///
    /// `actor_org_id` is the organization the actor's session is bound to.
    pub async fn get_org_permission(
        &self,
        actor: Actor,
        org_id: OrgId,
        auth_method: ActorAuthMethod,
        actor_org_id: Option<OrgId>,
    ) -> Result<ScopedPermission<OrgPermissions>, PermissionError> {
        let resolved = self.resolver.resolve_org(actor, org_id).await?;
        compile(resolved, auth_method, actor_org_id)
    }

    /// Builds the ability of one organization role.
    pub async fn get_org_permission_by_role(
        &self,
        role_slug: &str,
        org_id: OrgId,
    ) -> Result<Ability<OrgPermissions>, PermissionError> {
        self.role_ability(PermissionScope::Organization(org_id), role_slug)
            .await
    }
}
