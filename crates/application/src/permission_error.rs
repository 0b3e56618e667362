use thiserror::Error;
use vaultgate_core::{Actor, ActorAuthMethod, ActorType, AppError, OrgId};
use vaultgate_domain::{ForbiddenError, MissingPermission, ScopeKind};

use crate::PermissionScope;

/// Failure of a permission lookup or check.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The actor holds no membership in the scope.
    #[error("{actor} is not a member of {scope}")]
    NotMember {
        /// Requesting actor.
        actor: Actor,
        /// Requested scope.
        scope: PermissionScope,
    },

    /// The actor's session belongs to another organization.
    #[error("{actor} is bound to organization '{actor_org_id}' but {scope} belongs to '{scope_org_id}'")]
    OrganizationMismatch {
        /// Requesting actor.
        actor: Actor,
        /// Organization of the actor's session.
        actor_org_id: OrgId,
        /// Requested scope.
        scope: PermissionScope,
        /// Organization owning the scope.
        scope_org_id: OrgId,
    },

    /// The organization enforces single sign-on and the actor did not use it.
    #[error(
        "organization '{org_id}' requires single sign-on; login method '{}' is not allowed",
        .auth_method.as_str()
    )]
    AuthMethodNotAllowed {
        /// Enforcing organization.
        org_id: OrgId,
        /// Method the actor authenticated with.
        auth_method: ActorAuthMethod,
    },

    /// The compiled ability denied the action.
    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),

    /// Requested rules exceed what the granting actor holds.
    #[error("requested permissions exceed your own: {}", describe_missing(.missing))]
    PrivilegeEscalation {
        /// Grants the actor does not hold.
        missing: Vec<MissingPermission>,
    },

    /// The actor type cannot hold permissions in the scope.
    #[error("{} actors cannot hold {} permissions", .actor_type.as_str(), .scope.as_str())]
    UnsupportedActor {
        /// Requesting actor type.
        actor_type: ActorType,
        /// Requested scope kind.
        scope: ScopeKind,
    },

    /// Store failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

fn describe_missing(missing: &[MissingPermission]) -> String {
    missing
        .iter()
        .map(|permission| format!("{} on {}", permission.action, permission.subject))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<PermissionError> for AppError {
    fn from(value: PermissionError) -> Self {
        match value {
            PermissionError::NotMember { .. } | PermissionError::OrganizationMismatch { .. } => {
                Self::Unauthorized(value.to_string())
            }
            PermissionError::Forbidden(_)
            | PermissionError::AuthMethodNotAllowed { .. }
            | PermissionError::PrivilegeEscalation { .. } => Self::Forbidden(value.to_string()),
            PermissionError::UnsupportedActor { .. } => Self::Internal(value.to_string()),
            PermissionError::Store(error) => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use vaultgate_core::{Actor, ActorAuthMethod, ActorType, AppError, ProjectId};
    use vaultgate_domain::ScopeKind;

    use super::PermissionError;
    use crate::PermissionScope;

    #[test]
    fn not_member_is_an_authentication_failure() {
        let error = PermissionError::NotMember {
            actor: Actor::user(Uuid::new_v4()),
            scope: PermissionScope::Project(ProjectId::new()),
        };

        assert!(matches!(AppError::from(error), AppError::Unauthorized(_)));
    }

    #[test]
    fn unsupported_actor_is_an_internal_error() {
        let error = PermissionError::UnsupportedActor {
            actor_type: ActorType::Service,
            scope: ScopeKind::Organization,
        };

        assert_eq!(
            error.to_string(),
            "service actors cannot hold organization permissions"
        );
        assert!(matches!(AppError::from(error), AppError::Internal(_)));
    }

    #[test]
    fn auth_method_message_names_the_method() {
        let error = PermissionError::AuthMethodNotAllowed {
            org_id: vaultgate_core::OrgId::new(),
            auth_method: ActorAuthMethod::Github,
        };

        assert!(error.to_string().contains("'github'"));
        assert!(matches!(AppError::from(error), AppError::Forbidden(_)));
    }
}
