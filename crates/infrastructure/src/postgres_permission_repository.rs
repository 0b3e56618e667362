use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use vaultgate_application::{
    CustomRoleRecord, MembershipRecord, PermissionRepository, PermissionScope, ServiceTokenRecord,
};
use vaultgate_core::{Actor, AppError, AppResult, OrgId, ProjectId};

use sqlx::PgPool;

mod membership;
mod rows;

#[cfg(test)]
mod tests;

use rows::{CustomRoleRow, ServiceTokenRow};

/// PostgreSQL-backed repository for memberships, roles and service tokens.
///
/// List queries order by `created_at, id` so rule order is reproducible.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Storage discriminator and id of a scope.
fn scope_key(scope: PermissionScope) -> (&'static str, Uuid) {
    match scope {
        PermissionScope::Organization(org_id) => (scope.kind().as_str(), org_id.as_uuid()),
        PermissionScope::Project(project_id) => (scope.kind().as_str(), project_id.as_uuid()),
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn find_org_membership(
        &self,
        actor: Actor,
        org_id: OrgId,
    ) -> AppResult<Option<MembershipRecord>> {
        self.find_membership_impl(actor, PermissionScope::Organization(org_id))
            .await
    }

    async fn find_project_membership(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> AppResult<Option<MembershipRecord>> {
        self.find_membership_impl(actor, PermissionScope::Project(project_id))
            .await
    }

    async fn list_custom_roles(
        &self,
        scope: PermissionScope,
        role_ids: &[Uuid],
    ) -> AppResult<Vec<CustomRoleRecord>> {
        let (scope_kind, scope_id) = scope_key(scope);
        let rows = sqlx::query_as::<_, CustomRoleRow>(
            r#"
            SELECT id, slug, name, permissions
            FROM roles
            WHERE scope_kind = $1
              AND scope_id = $2
              AND id = ANY($3)
            ORDER BY created_at, id
            "#,
        )
        .bind(scope_kind)
        .bind(scope_id)
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load custom roles of {scope}: {error}"))
        })?;

        let roles: Vec<CustomRoleRecord> = rows.into_iter().map(CustomRoleRow::into_record).collect();
        if roles.len() < role_ids.len() {
            debug!(
                %scope,
                requested = role_ids.len(),
                found = roles.len(),
                "some custom roles no longer exist"
            );
        }

        Ok(roles)
    }

    async fn find_custom_role_by_slug(
        &self,
        scope: PermissionScope,
        slug: &str,
    ) -> AppResult<Option<CustomRoleRecord>> {
        let (scope_kind, scope_id) = scope_key(scope);
        let row = sqlx::query_as::<_, CustomRoleRow>(
            r#"
            SELECT id, slug, name, permissions
            FROM roles
            WHERE scope_kind = $1
              AND scope_id = $2
              AND slug = $3
            "#,
        )
        .bind(scope_kind)
        .bind(scope_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find role '{slug}' in {scope}: {error}"
            ))
        })?;

        Ok(row.map(CustomRoleRow::into_record))
    }

    async fn find_service_token(&self, token_id: Uuid) -> AppResult<Option<ServiceTokenRecord>> {
        let row = sqlx::query_as::<_, ServiceTokenRow>(
            r#"
            SELECT
                tokens.id,
                tokens.name,
                tokens.project_id,
                projects.org_id,
                tokens.scopes,
                tokens.permissions,
                tokens.expires_at
            FROM service_tokens AS tokens
            INNER JOIN projects
                ON projects.id = tokens.project_id
            WHERE tokens.id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find service token '{token_id}': {error}"))
        })?;

        row.map(ServiceTokenRow::into_record).transpose()
    }
}
