use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use vaultgate_core::AppResult;
use vaultgate_domain::unpack_rules_value;

use crate::{CustomRoleRecord, MembershipRecord, MembershipRoleRecord, TemporaryAccessRecord};

use super::*;

impl ScopeResolver {
    pub(super) async fn resolve_membership<V: PermissionVocabulary>(
        &self,
        actor: Actor,
        scope: PermissionScope,
        membership: MembershipRecord,
    ) -> AppResult<ResolvedRules<V>> {
        let now = self.clock.now();

        let mut assignments: Vec<(RuleOrigin, &MembershipRoleRecord)> = Vec::new();
        for group in &membership.group_roles {
            let origin = RuleOrigin::Group {
                group_id: group.group_id,
            };
            assignments.extend(
                active_in_role_order(&group.roles, now)
                    .into_iter()
                    .map(|role| (origin, role)),
            );
        }
        assignments.extend(
            active_in_role_order(&membership.roles, now)
                .into_iter()
                .map(|role| (RuleOrigin::Direct, role)),
        );

        let custom_roles = self.load_custom_roles(scope, &assignments).await?;

        let mut resolved = ResolvedRules::new(MembershipSummary {
            actor,
            scope,
            membership_id: membership.membership_id,
            org_id: membership.org_id,
            org_auth_enforced: membership.org_auth_enforced,
        });

        for (origin, assignment) in assignments {
            let custom_role = assignment
                .custom_role_id
                .and_then(|custom_role_id| custom_roles.get(&custom_role_id));
            let role_slug = custom_role.map_or_else(
                || assignment.role.clone(),
                |custom_role| custom_role.slug.clone(),
            );
            let rules = assignment_rules::<V>(assignment, custom_role);

            resolved.push(
                origin,
                role_slug,
                assignment.custom_role_id,
                assignment.temporary_access.is_temporary,
                rules,
            );
        }

        for privilege in &membership.additional_privileges {
            if !is_active(&privilege.temporary_access, now, privilege.id) {
                continue;
            }

            let rules = match unpack_rules_value::<V>(&privilege.permissions) {
                Ok(rules) => rules,
                Err(error) => {
                    warn!(
                        privilege_id = %privilege.id,
                        slug = %privilege.slug,
                        error = %error,
                        "additional privilege has malformed rules and contributes none"
                    );
                    Vec::new()
                }
            };

            resolved.push(
                RuleOrigin::AdditionalPrivilege {
                    privilege_id: privilege.id,
                },
                privilege.slug.clone(),
                None,
                privilege.temporary_access.is_temporary,
                rules,
            );
        }

        Ok(resolved)
    }

    async fn load_custom_roles(
        &self,
        scope: PermissionScope,
        assignments: &[(RuleOrigin, &MembershipRoleRecord)],
    ) -> AppResult<HashMap<Uuid, CustomRoleRecord>> {
        let mut role_ids: Vec<Uuid> = Vec::new();
        for custom_role_id in assignments
            .iter()
            .filter_map(|(_, assignment)| assignment.custom_role_id)
        {
            if !role_ids.contains(&custom_role_id) {
                role_ids.push(custom_role_id);
            }
        }

        if role_ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self
            .repository
            .list_custom_roles(scope, &role_ids)
            .await?
            .into_iter()
            .map(|role| (role.id, role))
            .collect())
    }
}

/// Active assignments with predefined roles ahead of custom ones, each in
/// assignment order.
fn active_in_role_order(
    roles: &[MembershipRoleRecord],
    now: DateTime<Utc>,
) -> Vec<&MembershipRoleRecord> {
    let (custom, mut ordered): (Vec<_>, Vec<_>) = roles
        .iter()
        .filter(|role| is_active(&role.temporary_access, now, role.id))
        .partition(|role| role.is_custom());
    ordered.extend(custom);
    ordered
}

fn is_active(
    temporary_access: &TemporaryAccessRecord,
    now: DateTime<Utc>,
    grant_id: Uuid,
) -> bool {
    match temporary_access.grant() {
        Ok(grant) => {
            let active = grant.is_active_at(now);
            if !active {
                debug!(%grant_id, %now, "skipping inactive temporary grant");
            }
            active
        }
        Err(error) => {
            warn!(
                %grant_id,
                error = %error,
                "temporary grant has an invalid access window and is treated as inactive"
            );
            false
        }
    }
}

fn assignment_rules<V: PermissionVocabulary>(
    assignment: &MembershipRoleRecord,
    custom_role: Option<&CustomRoleRecord>,
) -> Vec<PermissionRule<V>> {
    if let Some(custom_role_id) = assignment.custom_role_id {
        let Some(custom_role) = custom_role else {
            warn!(
                assignment_id = %assignment.id,
                %custom_role_id,
                "membership references a custom role that no longer exists; it contributes no rules"
            );
            return Vec::new();
        };

        return match unpack_rules_value::<V>(&custom_role.permissions) {
            Ok(rules) => rules,
            Err(error) => {
                warn!(
                    %custom_role_id,
                    role_slug = %custom_role.slug,
                    error = %error,
                    "custom role has malformed rules and contributes none"
                );
                Vec::new()
            }
        };
    }

    if assignment.is_custom() {
        warn!(
            assignment_id = %assignment.id,
            "custom role assignment has no role id; it contributes no rules"
        );
        return Vec::new();
    }

    V::predefined_role(&assignment.role).unwrap_or_else(|| {
        warn!(
            assignment_id = %assignment.id,
            role = %assignment.role,
            scope = V::SCOPE.as_str(),
            "membership references an unknown predefined role; it contributes no rules"
        );
        Vec::new()
    })
}
