//! Vaultgate permission probe: resolves one actor in one scope and prints
//! the decision with the rules that produced it.

#![forbid(unsafe_code)]

mod probe_config;

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaultgate_application::{
    MembershipSummary, PermissionScope, PermissionService, RuleSource, ScopedPermission,
    SystemClock,
};
use vaultgate_core::{AppError, AppResult};
use vaultgate_domain::{Decision, PermissionVocabulary, RuleDocument, VocabularyTerm};
use vaultgate_infrastructure::PostgresPermissionRepository;

use crate::probe_config::ProbeConfig;

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    allowed: bool,
    reason: String,
    rules: Vec<RuleDocument>,
    sources: &'a [RuleSource],
    membership: &'a MembershipSummary,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ProbeConfig::load()?;
    let pool = connect_pool(config.database_url.as_str(), config.max_connections).await?;
    let service = PermissionService::new(
        Arc::new(PostgresPermissionRepository::new(pool)),
        Arc::new(SystemClock),
    );

    info!(
        actor = %config.actor,
        scope = %config.scope,
        action = %config.action,
        subject = %config.subject,
        "probing permission"
    );

    let output = match config.scope {
        PermissionScope::Organization(org_id) => {
            let scoped = service
                .get_org_permission(config.actor, org_id, config.auth_method, config.actor_org_id)
                .await?;
            render(&scoped, &config)?
        }
        PermissionScope::Project(project_id) => {
            let scoped = service
                .get_project_permission(
                    config.actor,
                    project_id,
                    config.auth_method,
                    config.actor_org_id,
                )
                .await?;
            render(&scoped, &config)?
        }
    };

    println!("{output}");
    Ok(())
}

fn render<V: PermissionVocabulary>(
    scoped: &ScopedPermission<V>,
    config: &ProbeConfig,
) -> AppResult<String> {
    let action = V::Action::from_storage(config.action.as_str()).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown {} action '{}'",
            V::SCOPE.as_str(),
            config.action
        ))
    })?;
    let subject = V::Subject::from_storage(config.subject.as_str()).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown {} subject '{}'",
            V::SCOPE.as_str(),
            config.subject
        ))
    })?;

    let decision = scoped.permission.decide(action, subject, &config.attributes);
    let reason = match (
        decision,
        scoped.throw_unless_can(action, subject, &config.attributes),
    ) {
        (Decision::Allowed { rule_index }, _) => describe_rule(scoped, rule_index, "allowed"),
        (Decision::Denied { rule_index }, _) => describe_rule(scoped, rule_index, "denied"),
        (Decision::NoMatch, Err(error)) => error.to_string(),
        (Decision::NoMatch, Ok(())) => "no rule matched".to_owned(),
    };

    let report = ProbeReport {
        allowed: decision.is_allowed(),
        reason,
        rules: scoped
            .permission
            .rules()
            .iter()
            .map(|rule| rule.to_document())
            .collect(),
        sources: &scoped.sources,
        membership: &scoped.membership,
    };

    serde_json::to_string_pretty(&report)
        .map_err(|error| AppError::Internal(format!("failed to encode probe report: {error}")))
}

fn describe_rule<V: PermissionVocabulary>(
    scoped: &ScopedPermission<V>,
    rule_index: usize,
    verdict: &str,
) -> String {
    match scoped.source_of(rule_index) {
        Some(source) => format!(
            "{verdict} by rule {rule_index} from role '{}'",
            source.role_slug
        ),
        None => format!("{verdict} by rule {rule_index}"),
    }
}

async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
