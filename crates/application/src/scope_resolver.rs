use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;
use vaultgate_core::{Actor, ActorType, OrgId, ProjectId};
use vaultgate_domain::{
    OrgPermissions, PermissionRule, PermissionVocabulary, ProjectPermissions, ScopeKind,
};

use crate::{Clock, PermissionError, PermissionRepository, PermissionScope};

mod membership;
mod service_token;


/// Where a block of resolved rules came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleOrigin {
    /// Role held through a user group.
    Group {
        /// Group id.
        group_id: Uuid,
    },
    /// Role assigned to the membership itself.
    Direct,
    /// Additional privilege attached to the membership.
    AdditionalPrivilege {
        /// Privilege id.
        privilege_id: Uuid,
    },
    /// Scopes of a legacy service token.
    ServiceToken {
        /// Token id.
        token_id: Uuid,
    },
}

/// Provenance of a contiguous block of resolved rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSource {
    /// Origin of the block.
    pub origin: RuleOrigin,
    /// Role, privilege or token name.
    pub role_slug: String,
    /// Custom role id, for custom role assignments.
    pub custom_role_id: Option<Uuid>,
    /// Whether the grant is time-bound.
    pub is_temporary: bool,
    /// Indices of the block inside [`ResolvedRules::rules`].
    pub rules: Range<usize>,
}

/// The actor's standing in the resolved scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MembershipSummary {
    /// Resolved actor.
    pub actor: Actor,
    /// Resolved scope.
    pub scope: PermissionScope,
    /// Membership id, or the token id for service tokens.
    pub membership_id: Uuid,
    /// Organization owning the scope.
    pub org_id: OrgId,
    /// Whether the organization requires single sign-on for users.
    pub org_auth_enforced: bool,
}

/// Ordered rules of every active grant of one actor in one scope.
#[derive(Debug, Clone)]
pub struct ResolvedRules<V: PermissionVocabulary> {
    /// Rules in evaluation order.
    pub rules: Vec<PermissionRule<V>>,
    /// Provenance blocks covering `rules` in order.
    pub sources: Vec<RuleSource>,
    /// Membership the rules were resolved for.
    pub membership: MembershipSummary,
}

impl<V: PermissionVocabulary> ResolvedRules<V> {
    fn new(membership: MembershipSummary) -> Self {
        Self {
            rules: Vec::new(),
            sources: Vec::new(),
            membership,
        }
    }

    fn push(
        &mut self,
        origin: RuleOrigin,
        role_slug: String,
        custom_role_id: Option<Uuid>,
        is_temporary: bool,
        rules: Vec<PermissionRule<V>>,
    ) {
        let start = self.rules.len();
        self.rules.extend(rules);
        self.sources.push(RuleSource {
            origin,
            role_slug,
            custom_role_id,
            is_temporary,
            rules: start..self.rules.len(),
        });
    }
}

/// Turns an actor's memberships in a scope into an ordered rule list.
///
/// Order: group roles, direct predefined roles, direct custom roles, then
/// additional privileges. Inside a group predefined roles precede custom
/// ones. Inactive grants, dangling custom roles and malformed stored rules
/// contribute nothing.
#[derive(Clone)]
pub struct ScopeResolver {
    repository: Arc<dyn PermissionRepository>,
    clock: Arc<dyn Clock>,
}

impl ScopeResolver {
    /// Creates a resolver over a repository and clock.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Resolves organization rules for a user or machine identity.
    pub async fn resolve_org(
        &self,
        actor: Actor,
        org_id: OrgId,
    ) -> Result<ResolvedRules<OrgPermissions>, PermissionError> {
        if actor.actor_type() == ActorType::Service {
            return Err(PermissionError::UnsupportedActor {
                actor_type: actor.actor_type(),
                scope: ScopeKind::Organization,
            });
        }

        let scope = PermissionScope::Organization(org_id);
        let membership = self
            .repository
            .find_org_membership(actor, org_id)
            .await?
            .ok_or(PermissionError::NotMember { actor, scope })?;

        let resolved = self.resolve_membership(actor, scope, membership).await?;
        debug!(%actor, %scope, rule_count = resolved.rules.len(), "resolved permission rules");
        Ok(resolved)
    }

    /// Resolves project rules for any actor type.
    pub async fn resolve_project(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> Result<ResolvedRules<ProjectPermissions>, PermissionError> {
        let scope = PermissionScope::Project(project_id);
        let resolved = if actor.actor_type() == ActorType::Service {
            self.resolve_service_token(actor, project_id).await?
        } else {
            let membership = self
                .repository
                .find_project_membership(actor, project_id)
                .await?
                .ok_or(PermissionError::NotMember { actor, scope })?;
            self.resolve_membership(actor, scope, membership).await?
        };

        debug!(%actor, %scope, rule_count = resolved.rules.len(), "resolved permission rules");
        Ok(resolved)
    }
}
