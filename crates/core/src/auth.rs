use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

/// Kind of principal performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// Human user authenticated through a login flow.
    User,
    /// Machine identity authenticated through a machine auth method.
    Identity,
    /// Legacy project-bound service token.
    Service,
}

impl ActorType {
    /// Returns a stable storage value for this actor type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Identity => "identity",
            Self::Service => "service",
        }
    }
}

impl FromStr for ActorType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "identity" => Ok(Self::Identity),
            "service" => Ok(Self::Service),
            _ => Err(AppError::Validation(format!(
                "unknown actor type '{value}'"
            ))),
        }
    }
}

/// Principal performing an action, passed explicitly into every permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    actor_type: ActorType,
    id: Uuid,
}

impl Actor {
    /// Creates an actor of the given type.
    #[must_use]
    pub fn new(actor_type: ActorType, id: Uuid) -> Self {
        Self { actor_type, id }
    }

    /// Creates a user actor.
    #[must_use]
    pub fn user(id: Uuid) -> Self {
        Self::new(ActorType::User, id)
    }

    /// Creates a machine identity actor.
    #[must_use]
    pub fn identity(id: Uuid) -> Self {
        Self::new(ActorType::Identity, id)
    }

    /// Creates a service token actor.
    #[must_use]
    pub fn service(id: Uuid) -> Self {
        Self::new(ActorType::Service, id)
    }

    /// Returns the actor type.
    #[must_use]
    pub fn actor_type(&self) -> ActorType {
        self.actor_type
    }

    /// Returns the actor id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Display for Actor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} '{}'", self.actor_type.as_str(), self.id)
    }
}

/// Authentication method used to establish the current session or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorAuthMethod {
    /// Email and password login.
    Email,
    /// Google OAuth login.
    Google,
    /// GitHub OAuth login.
    Github,
    /// GitLab OAuth login.
    Gitlab,
    /// SAML single sign-on.
    Saml,
    /// OpenID Connect single sign-on.
    Oidc,
    /// LDAP login.
    Ldap,
    /// Machine identity universal auth.
    UniversalAuth,
    /// Machine identity Kubernetes auth.
    KubernetesAuth,
    /// Machine identity token auth.
    TokenAuth,
    /// Service token.
    ServiceToken,
}

impl ActorAuthMethod {
    /// Returns a stable storage value for this method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Google => "google",
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Saml => "saml",
            Self::Oidc => "oidc",
            Self::Ldap => "ldap",
            Self::UniversalAuth => "universal-auth",
            Self::KubernetesAuth => "kubernetes-auth",
            Self::TokenAuth => "token-auth",
            Self::ServiceToken => "service-token",
        }
    }

    /// Returns whether the method is an organization-managed single sign-on.
    #[must_use]
    pub fn is_single_sign_on(&self) -> bool {
        matches!(self, Self::Saml | Self::Oidc | Self::Ldap)
    }
}

impl FromStr for ActorAuthMethod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Self::Email),
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "saml" => Ok(Self::Saml),
            "oidc" => Ok(Self::Oidc),
            "ldap" => Ok(Self::Ldap),
            "universal-auth" => Ok(Self::UniversalAuth),
            "kubernetes-auth" => Ok(Self::KubernetesAuth),
            "token-auth" => Ok(Self::TokenAuth),
            "service-token" => Ok(Self::ServiceToken),
            _ => Err(AppError::Validation(format!(
                "unknown auth method '{value}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ActorAuthMethod, ActorType};

    #[test]
    fn auth_method_roundtrip_storage_value() {
        let method = ActorAuthMethod::UniversalAuth;
        let restored = ActorAuthMethod::from_str(method.as_str());
        assert!(matches!(restored, Ok(ActorAuthMethod::UniversalAuth)));
    }

    #[test]
    fn only_org_managed_methods_count_as_single_sign_on() {
        assert!(ActorAuthMethod::Saml.is_single_sign_on());
        assert!(ActorAuthMethod::Ldap.is_single_sign_on());
        assert!(!ActorAuthMethod::Email.is_single_sign_on());
        assert!(!ActorAuthMethod::Google.is_single_sign_on());
    }

    #[test]
    fn unknown_actor_type_is_rejected() {
        assert!(ActorType::from_str("robot").is_err());
    }
}
