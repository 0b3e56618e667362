use std::sync::Arc;

use tracing::debug;
use vaultgate_core::{ActorAuthMethod, ActorType, AppError, OrgId};
use vaultgate_domain::{
    Ability, PermissionRule, PermissionVocabulary, ResourceAttributes, unpack_rules_value,
    validate_permission_boundary,
};

use crate::{
    Clock, MembershipSummary, PermissionError, PermissionRepository, PermissionScope,
    ResolvedRules, RuleSource, ScopeResolver,
};

mod org;
mod project;

#[cfg(test)]
mod tests;

/// Compiled ability of one actor in one scope, with its provenance.
#[derive(Debug, Clone)]
pub struct ScopedPermission<V: PermissionVocabulary> {
    /// Compiled rules.
    pub permission: Ability<V>,
    /// Membership the ability was built for.
    pub membership: MembershipSummary,
    /// Provenance blocks over `permission.rules()`.
    pub sources: Vec<RuleSource>,
}

impl<V: PermissionVocabulary> ScopedPermission<V> {
    /// Fails unless the action is permitted on the resource.
    pub fn throw_unless_can(
        &self,
        action: V::Action,
        subject: V::Subject,
        attributes: &ResourceAttributes,
    ) -> Result<(), PermissionError> {
        Ok(self
            .permission
            .throw_unless_can(action, subject, attributes)?)
    }

    /// Returns the provenance block containing a rule index.
    #[must_use]
    pub fn source_of(&self, rule_index: usize) -> Option<&RuleSource> {
        self.sources
            .iter()
            .find(|source| source.rules.contains(&rule_index))
    }
}

/// Entry point for permission checks.
///
/// Every call resolves and compiles afresh; nothing is cached between calls.
#[derive(Clone)]
pub struct PermissionService {
    repository: Arc<dyn PermissionRepository>,
    resolver: ScopeResolver,
}

impl PermissionService {
    /// Creates a permission service over a repository and clock.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: ScopeResolver::new(repository.clone(), clock),
            repository,
        }
    }

    /// Rejects requested rules that grant more than the actor holds.
    pub fn ensure_within_boundary<V: PermissionVocabulary>(
        actor_permission: &Ability<V>,
        requested: &[PermissionRule<V>],
    ) -> Result<(), PermissionError> {
        let report = validate_permission_boundary(actor_permission, requested);
        if report.is_valid {
            return Ok(());
        }

        Err(PermissionError::PrivilegeEscalation {
            missing: report.missing_permissions,
        })
    }

    async fn role_ability<V: PermissionVocabulary>(
        &self,
        scope: PermissionScope,
        role_slug: &str,
    ) -> Result<Ability<V>, PermissionError> {
        if let Some(rules) = V::predefined_role(role_slug) {
            return Ok(Ability::build(rules));
        }

        let role = self
            .repository
            .find_custom_role_by_slug(scope, role_slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_slug}' in {scope}")))?;
        let rules = unpack_rules_value::<V>(&role.permissions).map_err(|error| {
            AppError::Internal(format!(
                "role '{role_slug}' in {scope} has malformed rules: {error}"
            ))
        })?;

        Ok(Ability::build(rules))
    }
}

fn compile<V: PermissionVocabulary>(
    resolved: ResolvedRules<V>,
    auth_method: ActorAuthMethod,
    actor_org_id: Option<OrgId>,
) -> Result<ScopedPermission<V>, PermissionError> {
    let membership = resolved.membership;

    if let Some(actor_org_id) = actor_org_id
        && actor_org_id != membership.org_id
    {
        return Err(PermissionError::OrganizationMismatch {
            actor: membership.actor,
            actor_org_id,
            scope: membership.scope,
            scope_org_id: membership.org_id,
        });
    }

    if membership.org_auth_enforced
        && membership.actor.actor_type() == ActorType::User
        && !auth_method.is_single_sign_on()
    {
        return Err(PermissionError::AuthMethodNotAllowed {
            org_id: membership.org_id,
            auth_method,
        });
    }

    let permission = Ability::build(resolved.rules);
    debug!(
        actor = %membership.actor,
        scope = %membership.scope,
        rule_count = permission.rules().len(),
        "compiled permission"
    );

    Ok(ScopedPermission {
        permission,
        membership,
        sources: resolved.sources,
    })
}
