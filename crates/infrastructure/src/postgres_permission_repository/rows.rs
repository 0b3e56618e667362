use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use vaultgate_application::{
    AdditionalPrivilegeRecord, CustomRoleRecord, GroupRolesRecord, MembershipRecord,
    MembershipRoleRecord, ServiceTokenRecord, TemporaryAccessRecord,
};
use vaultgate_core::{AppError, AppResult, OrgId, ProjectId};
use vaultgate_domain::ServiceTokenScope;

#[derive(Debug, Clone, Copy, FromRow)]
pub(super) struct ScopeOwnerRow {
    pub(super) org_id: Uuid,
    pub(super) auth_enforced: bool,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub(super) struct GroupMembershipRow {
    pub(super) membership_id: Uuid,
    pub(super) group_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct MembershipRoleRow {
    pub(super) id: Uuid,
    pub(super) membership_id: Uuid,
    pub(super) role: String,
    pub(super) custom_role_id: Option<Uuid>,
    pub(super) is_temporary: bool,
    pub(super) temporary_mode: Option<String>,
    pub(super) temporary_range: Option<String>,
    pub(super) temporary_access_start_time: Option<DateTime<Utc>>,
    pub(super) temporary_access_end_time: Option<DateTime<Utc>>,
}

impl MembershipRoleRow {
    fn into_record(self) -> MembershipRoleRecord {
        MembershipRoleRecord {
            id: self.id,
            role: self.role,
            custom_role_id: self.custom_role_id,
            temporary_access: TemporaryAccessRecord {
                is_temporary: self.is_temporary,
                mode: self.temporary_mode,
                range: self.temporary_range,
                starts_at: self.temporary_access_start_time,
                ends_at: self.temporary_access_end_time,
            },
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct AdditionalPrivilegeRow {
    pub(super) id: Uuid,
    pub(super) slug: String,
    pub(super) permissions: Value,
    pub(super) is_temporary: bool,
    pub(super) temporary_mode: Option<String>,
    pub(super) temporary_range: Option<String>,
    pub(super) temporary_access_start_time: Option<DateTime<Utc>>,
    pub(super) temporary_access_end_time: Option<DateTime<Utc>>,
}

impl AdditionalPrivilegeRow {
    fn into_record(self) -> AdditionalPrivilegeRecord {
        AdditionalPrivilegeRecord {
            id: self.id,
            slug: self.slug,
            permissions: self.permissions,
            temporary_access: TemporaryAccessRecord {
                is_temporary: self.is_temporary,
                mode: self.temporary_mode,
                range: self.temporary_range,
                starts_at: self.temporary_access_start_time,
                ends_at: self.temporary_access_end_time,
            },
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct CustomRoleRow {
    pub(super) id: Uuid,
    pub(super) slug: String,
    pub(super) name: String,
    pub(super) permissions: Value,
}

impl CustomRoleRow {
    pub(super) fn into_record(self) -> CustomRoleRecord {
        CustomRoleRecord {
            id: self.id,
            slug: self.slug,
            name: self.name,
            permissions: self.permissions,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(super) struct ServiceTokenRow {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) project_id: Uuid,
    pub(super) org_id: Uuid,
    pub(super) scopes: Value,
    pub(super) permissions: Vec<String>,
    pub(super) expires_at: Option<DateTime<Utc>>,
}

impl ServiceTokenRow {
    pub(super) fn into_record(self) -> AppResult<ServiceTokenRecord> {
        let scopes = serde_json::from_value::<Vec<ServiceTokenScope>>(self.scopes).map_err(
            |error| {
                AppError::Internal(format!(
                    "failed to decode scopes of service token '{}': {error}",
                    self.id
                ))
            },
        )?;

        Ok(ServiceTokenRecord {
            id: self.id,
            name: self.name,
            project_id: ProjectId::from_uuid(self.project_id),
            org_id: OrgId::from_uuid(self.org_id),
            scopes,
            permissions: self.permissions,
            expires_at: self.expires_at,
        })
    }
}

/// Joins the direct membership, group memberships and their role rows into
/// one record. Returns `None` when the actor has neither kind of membership.
pub(super) fn assemble_membership(
    owner: ScopeOwnerRow,
    direct_membership_id: Option<Uuid>,
    groups: &[GroupMembershipRow],
    roles: Vec<MembershipRoleRow>,
    privileges: Vec<AdditionalPrivilegeRow>,
) -> Option<MembershipRecord> {
    let membership_id =
        direct_membership_id.or_else(|| groups.first().map(|group| group.membership_id))?;

    let mut direct_roles: Vec<MembershipRoleRecord> = Vec::new();
    let mut group_roles: Vec<GroupRolesRecord> = groups
        .iter()
        .map(|group| GroupRolesRecord {
            group_id: group.group_id,
            roles: Vec::new(),
        })
        .collect();

    for row in roles {
        if Some(row.membership_id) == direct_membership_id {
            direct_roles.push(row.into_record());
        } else if let Some(position) = groups
            .iter()
            .position(|group| group.membership_id == row.membership_id)
        {
            group_roles[position].roles.push(row.into_record());
        }
    }

    Some(MembershipRecord {
        membership_id,
        org_id: OrgId::from_uuid(owner.org_id),
        org_auth_enforced: owner.auth_enforced,
        roles: direct_roles,
        group_roles,
        additional_privileges: privileges
            .into_iter()
            .map(AdditionalPrivilegeRow::into_record)
            .collect(),
    })
}
