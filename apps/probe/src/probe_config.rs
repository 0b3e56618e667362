use std::env;
use std::str::FromStr;

use uuid::Uuid;
use vaultgate_application::PermissionScope;
use vaultgate_core::{Actor, ActorAuthMethod, ActorType, AppError, AppResult, OrgId, ProjectId};
use vaultgate_domain::ResourceAttributes;

/// One permission question read from the environment.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub actor: Actor,
    pub auth_method: ActorAuthMethod,
    pub actor_org_id: Option<OrgId>,
    pub scope: PermissionScope,
    pub action: String,
    pub subject: String,
    pub attributes: ResourceAttributes,
}

impl ProbeConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };

        let database_url = required("DATABASE_URL")?;
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.trim().parse::<u32>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid DATABASE_MAX_CONNECTIONS value '{value}': {error}"
                ))
            })?,
            None => 5,
        };
        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        let actor_type = ActorType::from_str(&required("PROBE_ACTOR_TYPE")?)
            .map_err(|error| AppError::Validation(format!("PROBE_ACTOR_TYPE: {error}")))?;
        let actor_id = parse_uuid("PROBE_ACTOR_ID", &required("PROBE_ACTOR_ID")?)?;
        let actor = Actor::new(actor_type, actor_id);

        let auth_method = match lookup("PROBE_AUTH_METHOD") {
            Some(value) => ActorAuthMethod::from_str(value.trim())
                .map_err(|error| AppError::Validation(format!("PROBE_AUTH_METHOD: {error}")))?,
            None => ActorAuthMethod::Email,
        };

        let actor_org_id = lookup("PROBE_ACTOR_ORG_ID")
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_uuid("PROBE_ACTOR_ORG_ID", &value).map(OrgId::from_uuid))
            .transpose()?;

        let scope_id = parse_uuid("PROBE_SCOPE_ID", &required("PROBE_SCOPE_ID")?)?;
        let scope = match required("PROBE_SCOPE")?.as_str() {
            "organization" => PermissionScope::Organization(OrgId::from_uuid(scope_id)),
            "project" => PermissionScope::Project(ProjectId::from_uuid(scope_id)),
            other => {
                return Err(AppError::Validation(format!(
                    "PROBE_SCOPE must be 'organization' or 'project', got '{other}'"
                )));
            }
        };

        let attributes = match lookup("PROBE_ATTRIBUTES") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<ResourceAttributes>(&raw)
                .map_err(|error| {
                    AppError::Validation(format!(
                        "PROBE_ATTRIBUTES must be a JSON object of strings or string arrays: {error}"
                    ))
                })?,
            _ => ResourceAttributes::new(),
        };

        Ok(Self {
            database_url,
            max_connections,
            actor,
            auth_method,
            actor_org_id,
            scope,
            action: required("PROBE_ACTION")?,
            subject: required("PROBE_SUBJECT")?,
            attributes,
        })
    }
}

fn parse_uuid(name: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}
