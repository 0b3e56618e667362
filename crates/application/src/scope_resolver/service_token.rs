use tracing::{debug, warn};
use vaultgate_domain::{ServiceTokenPermission, service_token_rules};

use super::*;

impl ScopeResolver {
    pub(super) async fn resolve_service_token(
        &self,
        actor: Actor,
        project_id: ProjectId,
    ) -> Result<ResolvedRules<ProjectPermissions>, PermissionError> {
        let scope = PermissionScope::Project(project_id);
        let not_member = PermissionError::NotMember { actor, scope };

        let Some(token) = self.repository.find_service_token(actor.id()).await? else {
            return Err(not_member);
        };
        if token.project_id != project_id {
            return Err(not_member);
        }
        let now = self.clock.now();
        if token.expires_at.is_some_and(|expires_at| expires_at <= now) {
            debug!(token_id = %token.id, %now, "service token has expired");
            return Err(not_member);
        }

        let rules = token
            .permissions
            .iter()
            .map(|permission| ServiceTokenPermission::from_storage(permission))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|permissions| service_token_rules(&token.scopes, &permissions));
        let rules = match rules {
            Ok(rules) => rules,
            Err(error) => {
                warn!(
                    token_id = %token.id,
                    error = %error,
                    "service token has malformed scopes and grants nothing"
                );
                Vec::new()
            }
        };

        let mut resolved = ResolvedRules::new(MembershipSummary {
            actor,
            scope,
            membership_id: token.id,
            org_id: token.org_id,
            org_auth_enforced: false,
        });
        resolved.push(
            RuleOrigin::ServiceToken { token_id: token.id },
            token.name,
            None,
            false,
            rules,
        );

        Ok(resolved)
    }
}
