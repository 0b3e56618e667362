use sqlx::{FromRow, Postgres};
use vaultgate_core::ActorType;

use super::rows::{
    AdditionalPrivilegeRow, GroupMembershipRow, MembershipRoleRow, ScopeOwnerRow,
    assemble_membership,
};
use super::*;

#[derive(Debug, FromRow)]
struct MembershipIdRow {
    id: Uuid,
}

impl PostgresPermissionRepository {
    pub(super) async fn find_membership_impl(
        &self,
        actor: Actor,
        scope: PermissionScope,
    ) -> AppResult<Option<MembershipRecord>> {
        let Some(owner) = self.find_scope_owner(scope).await? else {
            debug!(%scope, "scope does not exist");
            return Ok(None);
        };

        let (scope_kind, scope_id) = scope_key(scope);
        let direct = sqlx::query_as::<_, MembershipIdRow>(
            r#"
            SELECT id
            FROM memberships
            WHERE scope_kind = $1
              AND scope_id = $2
              AND actor_type = $3
              AND actor_id = $4
            "#,
        )
        .bind(scope_kind)
        .bind(scope_id)
        .bind(actor.actor_type().as_str())
        .bind(actor.id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find membership of {actor} in {scope}: {error}"
            ))
        })?
        .map(|row| row.id);

        let groups = if actor.actor_type() == ActorType::User {
            self.list_group_memberships(actor, scope).await?
        } else {
            Vec::new()
        };

        if direct.is_none() && groups.is_empty() {
            debug!(%actor, %scope, "actor has no membership in scope");
            return Ok(None);
        }

        let membership_ids: Vec<Uuid> = direct
            .into_iter()
            .chain(groups.iter().map(|group| group.membership_id))
            .collect();
        let roles = sqlx::query_as::<_, MembershipRoleRow>(
            r#"
            SELECT
                id,
                membership_id,
                role,
                custom_role_id,
                is_temporary,
                temporary_mode,
                temporary_range,
                temporary_access_start_time,
                temporary_access_end_time
            FROM membership_roles
            WHERE membership_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&membership_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load membership roles of {actor} in {scope}: {error}"
            ))
        })?;

        let privileges = match direct {
            Some(membership_id) => self.list_additional_privileges(membership_id).await?,
            None => Vec::new(),
        };

        Ok(assemble_membership(owner, direct, &groups, roles, privileges))
    }

    async fn find_scope_owner(&self, scope: PermissionScope) -> AppResult<Option<ScopeOwnerRow>> {
        let query = match scope {
            PermissionScope::Organization(org_id) => sqlx::query_as::<Postgres, ScopeOwnerRow>(
                r#"
                SELECT id AS org_id, auth_enforced
                FROM organizations
                WHERE id = $1
                "#,
            )
            .bind(org_id.as_uuid()),
            PermissionScope::Project(project_id) => sqlx::query_as::<Postgres, ScopeOwnerRow>(
                r#"
                SELECT organizations.id AS org_id, organizations.auth_enforced
                FROM projects
                INNER JOIN organizations
                    ON organizations.id = projects.org_id
                WHERE projects.id = $1
                "#,
            )
            .bind(project_id.as_uuid()),
        };

        query.fetch_optional(&self.pool).await.map_err(|error| {
            AppError::Internal(format!("failed to load owner of {scope}: {error}"))
        })
    }

    async fn list_group_memberships(
        &self,
        actor: Actor,
        scope: PermissionScope,
    ) -> AppResult<Vec<GroupMembershipRow>> {
        let (scope_kind, scope_id) = scope_key(scope);
        sqlx::query_as::<_, GroupMembershipRow>(
            r#"
            SELECT memberships.id AS membership_id, memberships.actor_id AS group_id
            FROM memberships
            INNER JOIN user_group_memberships AS group_members
                ON group_members.group_id = memberships.actor_id
            WHERE memberships.scope_kind = $1
              AND memberships.scope_id = $2
              AND memberships.actor_type = 'group'
              AND group_members.user_id = $3
            ORDER BY group_members.created_at, memberships.id
            "#,
        )
        .bind(scope_kind)
        .bind(scope_id)
        .bind(actor.id())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load group memberships of {actor} in {scope}: {error}"
            ))
        })
    }

    async fn list_additional_privileges(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Vec<AdditionalPrivilegeRow>> {
        sqlx::query_as::<_, AdditionalPrivilegeRow>(
            r#"
            SELECT
                id,
                slug,
                permissions,
                is_temporary,
                temporary_mode,
                temporary_range,
                temporary_access_start_time,
                temporary_access_end_time
            FROM additional_privileges
            WHERE membership_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(membership_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load additional privileges of membership '{membership_id}': {error}"
            ))
        })
    }
}
