use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use vaultgate_application::{
    AdditionalPrivilegeRecord, CustomRoleRecord, GroupRolesRecord, MembershipRecord,
    MembershipRoleRecord, PermissionRepository, PermissionScope, ServiceTokenRecord,
};
use vaultgate_core::{Actor, AppError, AppResult, OrgId, ProjectId};


/// In-memory permission repository for tests and local tooling.
///
/// Entries keep insertion order, matching the ordering the Postgres
/// repository derives from creation time.
#[derive(Debug, Default)]
pub struct InMemoryPermissionRepository {
    memberships: RwLock<HashMap<(Actor, PermissionScope), MembershipRecord>>,
    custom_roles: RwLock<Vec<(PermissionScope, CustomRoleRecord)>>,
    service_tokens: RwLock<HashMap<Uuid, ServiceTokenRecord>>,
}

impl InMemoryPermissionRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces the actor's membership in a scope.
    pub async fn save_membership(
        &self,
        actor: Actor,
        scope: PermissionScope,
        membership: MembershipRecord,
    ) {
        self.memberships
            .write()
            .await
            .insert((actor, scope), membership);
    }

    /// Appends a direct role assignment.
    pub async fn assign_role(
        &self,
        actor: Actor,
        scope: PermissionScope,
        role: MembershipRoleRecord,
    ) -> AppResult<()> {
        self.update_membership(actor, scope, |membership| membership.roles.push(role))
            .await
    }

    /// Appends the roles held through one group.
    pub async fn add_group_roles(
        &self,
        actor: Actor,
        scope: PermissionScope,
        group_roles: GroupRolesRecord,
    ) -> AppResult<()> {
        self.update_membership(actor, scope, |membership| {
            membership.group_roles.push(group_roles);
        })
        .await
    }

    /// Appends an additional privilege.
    pub async fn add_additional_privilege(
        &self,
        actor: Actor,
        scope: PermissionScope,
        privilege: AdditionalPrivilegeRecord,
    ) -> AppResult<()> {
        self.update_membership(actor, scope, |membership| {
            membership.additional_privileges.push(privilege);
        })
        .await
    }

    /// Stores a custom role; slugs are unique per scope.
    pub async fn save_custom_role(
        &self,
        scope: PermissionScope,
        role: CustomRoleRecord,
    ) -> AppResult<()> {
        let mut custom_roles = self.custom_roles.write().await;
        if custom_roles
            .iter()
            .any(|(role_scope, stored)| *role_scope == scope && stored.slug == role.slug)
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists in {scope}",
                role.slug
            )));
        }

        custom_roles.push((scope, role));
        Ok(())
    }

    /// Deletes a custom role. Assignments referencing it are left dangling.
    pub async fn delete_custom_role(&self, scope: PermissionScope, role_id: Uuid) -> AppResult<()> {
        let mut custom_roles = self.custom_roles.write().await;
        let before = custom_roles.len();
        custom_roles.retain(|(role_scope, role)| !(*role_scope == scope && role.id == role_id));

        if custom_roles.len() == before {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist in {scope}"
            )));
        }

        Ok(())
    }

    /// Stores or replaces a service token.
    pub async fn save_service_token(&self, token: ServiceTokenRecord) {
        self.service_tokens.write().await.insert(token.id, token);
    }

    async fn update_membership(
        &self,
        actor: Actor,
        scope: PermissionScope,
        update: impl FnOnce(&mut MembershipRecord) + Send,
    ) -> AppResult<()> {
        let mut memberships = self.memberships.write().await;
        let membership = memberships.get_mut(&(actor, scope)).ok_or_else(|| {
            AppError::NotFound(format!("{actor} is not a member of {scope}"))
        })?;

        update(membership);
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn find_org_membership(
        &self,
        actor: Actor,
        org_id: OrgId,
    ) -> AppResult<Option<MembershipRecord>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(actor, PermissionScope::Organization(org_id)))
            .cloned())
    }

    async fn find_project_membership(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> AppResult<Option<MembershipRecord>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(actor, PermissionScope::Project(project_id)))
            .cloned())
    }

    async fn list_custom_roles(
        &self,
        scope: PermissionScope,
        role_ids: &[Uuid],
    ) -> AppResult<Vec<CustomRoleRecord>> {
        Ok(self
            .custom_roles
            .read()
            .await
            .iter()
            .filter(|(role_scope, role)| *role_scope == scope && role_ids.contains(&role.id))
            .map(|(_, role)| role.clone())
            .collect())
    }

    async fn find_custom_role_by_slug(
        &self,
        scope: PermissionScope,
        slug: &str,
    ) -> AppResult<Option<CustomRoleRecord>> {
        Ok(self
            .custom_roles
            .read()
            .await
            .iter()
            .find(|(role_scope, role)| *role_scope == scope && role.slug == slug)
            .map(|(_, role)| role.clone()))
    }

    async fn find_service_token(&self, token_id: Uuid) -> AppResult<Option<ServiceTokenRecord>> {
        Ok(self.service_tokens.read().await.get(&token_id).cloned())
    }
}
