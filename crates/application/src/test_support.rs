use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;
use vaultgate_core::{Actor, AppResult, OrgId, ProjectId};

use crate::{
    CustomRoleRecord, MembershipRecord, MembershipRoleRecord, PermissionRepository,
    PermissionScope, ServiceTokenRecord,
};

#[derive(Default)]
pub(crate) struct FakePermissionRepository {
    pub(crate) org_memberships: HashMap<(Actor, OrgId), MembershipRecord>,
    pub(crate) project_memberships: HashMap<(Actor, ProjectId), MembershipRecord>,
    pub(crate) custom_roles: Vec<(PermissionScope, CustomRoleRecord)>,
    pub(crate) service_tokens: HashMap<Uuid, ServiceTokenRecord>,
    pub(crate) custom_role_lookups: Mutex<Vec<Vec<Uuid>>>,
}

#[async_trait]
impl PermissionRepository for FakePermissionRepository {
    async fn find_org_membership(
        &self,
        actor: Actor,
        org_id: OrgId,
    ) -> AppResult<Option<MembershipRecord>> {
        Ok(self.org_memberships.get(&(actor, org_id)).cloned())
    }

    async fn find_project_membership(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> AppResult<Option<MembershipRecord>> {
        Ok(self.project_memberships.get(&(actor, project_id)).cloned())
    }

    async fn list_custom_roles(
        &self,
        scope: PermissionScope,
        role_ids: &[Uuid],
    ) -> AppResult<Vec<CustomRoleRecord>> {
        self.custom_role_lookups.lock().await.push(role_ids.to_vec());

        Ok(self
            .custom_roles
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
            .iter()
            .find(|(role_scope, role)| *role_scope == scope && role.slug == slug)
            .map(|(_, role)| role.clone()))
    }

    async fn find_service_token(&self, token_id: Uuid) -> AppResult<Option<ServiceTokenRecord>> {
        Ok(self.service_tokens.get(&token_id).cloned())
    }
}

pub(crate) fn start_of_day() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single() {
        Some(value) => value,
        None => panic!("valid timestamp"),
    }
}

pub(crate) fn minutes_after_start(minutes: i64) -> DateTime<Utc> {
    start_of_day() + Duration::minutes(minutes)
}

pub(crate) fn membership(org_id: OrgId, roles: Vec<MembershipRoleRecord>) -> MembershipRecord {
    MembershipRecord {
        membership_id: Uuid::new_v4(),
        org_id,
        org_auth_enforced: false,
        roles,
        group_roles: Vec::new(),
        additional_privileges: Vec::new(),
    }
}

pub(crate) fn custom_role(slug: &str, permissions: Value) -> CustomRoleRecord {
    CustomRoleRecord {
        id: Uuid::new_v4(),
        slug: slug.to_owned(),
        name: slug.to_owned(),
        permissions,
    }
}
