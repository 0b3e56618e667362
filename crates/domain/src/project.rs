use serde::{Deserialize, Serialize};

use crate::condition::{Conditions, FieldCondition};
use crate::rule::{PermissionRule, RuleSetBuilder};
use crate::vocabulary::{PermissionVocabulary, ScopeKind, VocabularyTerm};
use crate::RuleError;

/// Operations at project scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectAction {
    /// View metadata.
    Read,
    /// Create.
    Create,
    /// Update.
    Edit,
    /// Remove.
    Delete,
    /// See that a secret exists without its value.
    DescribeSecret,
    /// Read a secret value.
    ReadValue,
    /// Lease dynamic credentials.
    Lease,
    /// Push secrets to a sync destination.
    SyncSecrets,
    /// Hand out privileges the actor holds to others.
    GrantPrivileges,
    /// Evaluate the project as another member or identity.
    AssumePrivileges,
}

impl VocabularyTerm for ProjectAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::DescribeSecret => "describe-secret",
            Self::ReadValue => "read-value",
            Self::Lease => "lease",
            Self::SyncSecrets => "sync-secrets",
            Self::GrantPrivileges => "grant-privileges",
            Self::AssumePrivileges => "assume-privileges",
        }
    }

    fn all() -> &'static [Self] {
        const ALL: &[ProjectAction] = &[
            ProjectAction::Read,
            ProjectAction::Create,
            ProjectAction::Edit,
            ProjectAction::Delete,
            ProjectAction::DescribeSecret,
            ProjectAction::ReadValue,
            ProjectAction::Lease,
            ProjectAction::SyncSecrets,
            ProjectAction::GrantPrivileges,
            ProjectAction::AssumePrivileges,
        ];

        ALL
    }
}

/// Resource categories at project scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectSubject {
    /// The project itself.
    #[serde(rename = "workspace")]
    Project,
    /// Project roles.
    Role,
    /// Project members.
    Member,
    /// Groups added to the project.
    Groups,
    /// Machine identities added to the project.
    Identity,
    /// Project settings.
    Settings,
    /// Legacy integrations.
    Integrations,
    /// Webhooks.
    Webhooks,
    /// Legacy service tokens.
    ServiceTokens,
    /// Environments.
    Environments,
    /// Secret tags.
    Tags,
    /// Project audit logs.
    AuditLogs,
    /// IP allowlist.
    #[serde(rename = "ip-allowlist")]
    IpAllowList,
    /// Static secrets.
    Secrets,
    /// Secret folders.
    SecretFolders,
    /// Secret imports.
    SecretImports,
    /// Point-in-time rollback.
    SecretRollback,
    /// Change approval policies.
    SecretApproval,
    /// Secret rotation.
    SecretRotation,
    /// Secret syncs.
    SecretSyncs,
    /// Dynamic secrets.
    DynamicSecrets,
    /// Certificate authorities.
    CertificateAuthorities,
    /// Issued certificates.
    Certificates,
    /// Certificate templates.
    CertificateTemplates,
    /// Expiry alerts.
    PkiAlerts,
    /// Certificate collections.
    PkiCollections,
    /// Certificate syncs.
    PkiSyncs,
    /// Key management.
    Kms,
}

impl VocabularyTerm for ProjectSubject {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "workspace",
            Self::Role => "role",
            Self::Member => "member",
            Self::Groups => "groups",
            Self::Identity => "identity",
            Self::Settings => "settings",
            Self::Integrations => "integrations",
            Self::Webhooks => "webhooks",
            Self::ServiceTokens => "service-tokens",
            Self::Environments => "environments",
            Self::Tags => "tags",
            Self::AuditLogs => "audit-logs",
            Self::IpAllowList => "ip-allowlist",
            Self::Secrets => "secrets",
            Self::SecretFolders => "secret-folders",
            Self::SecretImports => "secret-imports",
            Self::SecretRollback => "secret-rollback",
            Self::SecretApproval => "secret-approval",
            Self::SecretRotation => "secret-rotation",
            Self::SecretSyncs => "secret-syncs",
            Self::DynamicSecrets => "dynamic-secrets",
            Self::CertificateAuthorities => "certificate-authorities",
            Self::Certificates => "certificates",
            Self::CertificateTemplates => "certificate-templates",
            Self::PkiAlerts => "pki-alerts",
            Self::PkiCollections => "pki-collections",
            Self::PkiSyncs => "pki-syncs",
            Self::Kms => "kms",
        }
    }

    fn all() -> &'static [Self] {
        const ALL: &[ProjectSubject] = &[
            ProjectSubject::Project,
            ProjectSubject::Role,
            ProjectSubject::Member,
            ProjectSubject::Groups,
            ProjectSubject::Identity,
            ProjectSubject::Settings,
            ProjectSubject::Integrations,
            ProjectSubject::Webhooks,
            ProjectSubject::ServiceTokens,
            ProjectSubject::Environments,
            ProjectSubject::Tags,
            ProjectSubject::AuditLogs,
            ProjectSubject::IpAllowList,
            ProjectSubject::Secrets,
            ProjectSubject::SecretFolders,
            ProjectSubject::SecretImports,
            ProjectSubject::SecretRollback,
            ProjectSubject::SecretApproval,
            ProjectSubject::SecretRotation,
            ProjectSubject::SecretSyncs,
            ProjectSubject::DynamicSecrets,
            ProjectSubject::CertificateAuthorities,
            ProjectSubject::Certificates,
            ProjectSubject::CertificateTemplates,
            ProjectSubject::PkiAlerts,
            ProjectSubject::PkiCollections,
            ProjectSubject::PkiSyncs,
            ProjectSubject::Kms,
        ];

        ALL
    }
}

const CRUD: &[ProjectAction] = &[
    ProjectAction::Read,
    ProjectAction::Create,
    ProjectAction::Edit,
    ProjectAction::Delete,
];

const SECRET_ACTIONS: &[ProjectAction] = &[
    ProjectAction::Read,
    ProjectAction::Create,
    ProjectAction::Edit,
    ProjectAction::Delete,
    ProjectAction::DescribeSecret,
    ProjectAction::ReadValue,
];

const SYNC_ACTIONS: &[ProjectAction] = &[
    ProjectAction::Read,
    ProjectAction::Create,
    ProjectAction::Edit,
    ProjectAction::Delete,
    ProjectAction::SyncSecrets,
];

const PRINCIPAL_ACTIONS: &[ProjectAction] = &[
    ProjectAction::Read,
    ProjectAction::Create,
    ProjectAction::Edit,
    ProjectAction::Delete,
    ProjectAction::GrantPrivileges,
    ProjectAction::AssumePrivileges,
];

/// Project-scope vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectPermissions;

/// Rule over the project vocabulary.
pub type ProjectRule = PermissionRule<ProjectPermissions>;

impl PermissionVocabulary for ProjectPermissions {
    type Action = ProjectAction;
    type Subject = ProjectSubject;

    const SCOPE: ScopeKind = ScopeKind::Project;

    fn supported_actions(subject: ProjectSubject) -> &'static [ProjectAction] {
        match subject {
            ProjectSubject::Secrets => SECRET_ACTIONS,
            ProjectSubject::DynamicSecrets => &[
                ProjectAction::Read,
                ProjectAction::Create,
                ProjectAction::Edit,
                ProjectAction::Delete,
                ProjectAction::Lease,
            ],
            ProjectSubject::SecretSyncs | ProjectSubject::PkiSyncs => SYNC_ACTIONS,
            ProjectSubject::Member | ProjectSubject::Identity => PRINCIPAL_ACTIONS,
            ProjectSubject::Groups => &[
                ProjectAction::Read,
                ProjectAction::Create,
                ProjectAction::Edit,
                ProjectAction::Delete,
                ProjectAction::GrantPrivileges,
            ],
            ProjectSubject::SecretRollback => &[ProjectAction::Read, ProjectAction::Create],
            ProjectSubject::Project => &[ProjectAction::Edit, ProjectAction::Delete],
            ProjectSubject::Kms => &[ProjectAction::Edit],
            ProjectSubject::Role
            | ProjectSubject::Settings
            | ProjectSubject::Integrations
            | ProjectSubject::Webhooks
            | ProjectSubject::ServiceTokens
            | ProjectSubject::Environments
            | ProjectSubject::Tags
            | ProjectSubject::AuditLogs
            | ProjectSubject::IpAllowList
            | ProjectSubject::SecretFolders
            | ProjectSubject::SecretImports
            | ProjectSubject::SecretApproval
            | ProjectSubject::SecretRotation
            | ProjectSubject::CertificateAuthorities
            | ProjectSubject::Certificates
            | ProjectSubject::CertificateTemplates
            | ProjectSubject::PkiAlerts
            | ProjectSubject::PkiCollections => CRUD,
        }
    }

    fn set_fields() -> &'static [&'static str] {
        &["secretTags"]
    }

    fn condition_fields(subject: ProjectSubject) -> &'static [&'static str] {
        match subject {
            ProjectSubject::Secrets => &["environment", "secretPath", "secretName", "secretTags"],
            ProjectSubject::SecretFolders
            | ProjectSubject::SecretImports
            | ProjectSubject::SecretRotation => &["environment", "secretPath"],
            ProjectSubject::DynamicSecrets => &["environment", "secretPath", "metadata"],
            ProjectSubject::SecretSyncs => &["environment", "secretPath", "connectionId"],
            ProjectSubject::PkiSyncs => &["name"],
            ProjectSubject::Member => &["userEmail", "role"],
            ProjectSubject::Identity => &["identityId", "role"],
            ProjectSubject::Groups => &["groupSlug", "role"],
            ProjectSubject::Certificates => &["commonName", "altNames"],
            _ => &[],
        }
    }

    fn predefined_role(slug: &str) -> Option<Vec<PermissionRule<Self>>> {
        match slug {
            "admin" => Some(vec![PermissionRule::manage_all()]),
            "member" => Some(project_member_rules()),
            "viewer" => Some(project_viewer_rules()),
            "no-access" => Some(Vec::new()),
            _ => None,
        }
    }
}

fn project_member_rules() -> Vec<ProjectRule> {
    use ProjectAction::{Create, Delete, Edit, Lease, Read, SyncSecrets};
    use ProjectSubject as S;

    RuleSetBuilder::<ProjectPermissions>::new()
        .can(SECRET_ACTIONS.iter().copied(), S::Secrets)
        .can(CRUD.iter().copied(), S::SecretFolders)
        .can(CRUD.iter().copied(), S::SecretImports)
        .can([Read, Create, Edit, Delete, Lease], S::DynamicSecrets)
        .can([Read, SyncSecrets], S::SecretSyncs)
        .can([Read], S::SecretApproval)
        .can([Read], S::SecretRotation)
        .can([Read, Create], S::SecretRollback)
        .can([Read, Create], S::Member)
        .can([Read], S::Groups)
        .can(CRUD.iter().copied(), S::Integrations)
        .can(CRUD.iter().copied(), S::Webhooks)
        .can([Read, Create, Edit, Delete], S::Identity)
        .can(CRUD.iter().copied(), S::ServiceTokens)
        .can(CRUD.iter().copied(), S::Settings)
        .can(CRUD.iter().copied(), S::Environments)
        .can(CRUD.iter().copied(), S::Tags)
        .can([Read], S::Role)
        .can([Read], S::AuditLogs)
        .can([Read], S::IpAllowList)
        .can([Read], S::CertificateAuthorities)
        .can(CRUD.iter().copied(), S::Certificates)
        .can([Read], S::CertificateTemplates)
        .can([Read], S::PkiAlerts)
        .can([Read], S::PkiCollections)
        .can([Read], S::PkiSyncs)
        .build()
}

fn project_viewer_rules() -> Vec<ProjectRule> {
    use ProjectAction::{DescribeSecret, Read, ReadValue};
    use ProjectSubject as S;

    let mut builder = RuleSetBuilder::<ProjectPermissions>::new()
        .can([Read, DescribeSecret, ReadValue], S::Secrets);
    for subject in [
        S::SecretFolders,
        S::SecretImports,
        S::DynamicSecrets,
        S::SecretApproval,
        S::SecretRollback,
        S::SecretRotation,
        S::SecretSyncs,
        S::Member,
        S::Groups,
        S::Role,
        S::Integrations,
        S::Webhooks,
        S::Identity,
        S::ServiceTokens,
        S::Settings,
        S::Environments,
        S::Tags,
        S::AuditLogs,
        S::IpAllowList,
        S::CertificateAuthorities,
        S::Certificates,
    ] {
        builder = builder.can([Read], subject);
    }

    builder.build()
}

/// Access level granted by a legacy service token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTokenPermission {
    /// Read secrets.
    Read,
    /// Create, edit and delete secrets.
    Write,
}

impl ServiceTokenPermission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Parses a storage value.
    pub fn from_storage(value: &str) -> Result<Self, RuleError> {
        match value {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            _ => Err(RuleError::MalformedRule(format!(
                "unknown service token permission '{value}'"
            ))),
        }
    }
}

/// Environment and path a service token is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTokenScope {
    /// Environment slug.
    pub environment: String,
    /// Secret path glob.
    pub secret_path: String,
}

/// Compiles a service token's scopes into secret rules.
pub fn service_token_rules(
    scopes: &[ServiceTokenScope],
    permissions: &[ServiceTokenPermission],
) -> Result<Vec<ProjectRule>, RuleError> {
    let can_write = permissions.contains(&ServiceTokenPermission::Write);
    let can_read = permissions.contains(&ServiceTokenPermission::Read);

    let mut builder = RuleSetBuilder::<ProjectPermissions>::new();
    for scope in scopes {
        let conditions = Conditions::new()
            .with("environment", FieldCondition::equals(scope.environment.clone()))
            .with("secretPath", FieldCondition::glob(scope.secret_path.clone())?);

        if can_write {
            builder = builder.can_where(
                [
                    ProjectAction::Create,
                    ProjectAction::Edit,
                    ProjectAction::Delete,
                ],
                ProjectSubject::Secrets,
                conditions.clone(),
            );
        }
        if can_read {
            builder = builder.can_where(
                [
                    ProjectAction::Read,
                    ProjectAction::DescribeSecret,
                    ProjectAction::ReadValue,
                ],
                ProjectSubject::Secrets,
                conditions,
            );
        }
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::{
        ProjectAction, ProjectPermissions, ProjectSubject, ServiceTokenPermission,
        ServiceTokenScope, service_token_rules,
    };
    use crate::{Ability, PermissionVocabulary, ResourceAttributes, VocabularyTerm};

    fn role(slug: &str) -> Ability<ProjectPermissions> {
        match ProjectPermissions::predefined_role(slug) {
            Some(rules) => Ability::build(rules),
            None => panic!("role '{slug}' should be predefined"),
        }
    }

    fn none() -> ResourceAttributes {
        ResourceAttributes::new()
    }

    #[test]
    fn viewer_reads_but_cannot_edit_secrets() {
        let viewer = role("viewer");

        assert!(viewer.can(ProjectAction::Read, ProjectSubject::Secrets, &none()));
        assert!(!viewer.can(ProjectAction::Edit, ProjectSubject::Secrets, &none()));

        let result = viewer.throw_unless_can(ProjectAction::Edit, ProjectSubject::Secrets, &none());
        assert!(matches!(
            result,
            Err(error) if error.action == "edit" && error.subject == "secrets"
        ));
    }

    #[test]
    fn member_manages_secrets_but_only_reads_roles() {
        let member = role("member");

        assert!(member.can(ProjectAction::Delete, ProjectSubject::Secrets, &none()));
        assert!(member.can(ProjectAction::Read, ProjectSubject::Role, &none()));
        assert!(!member.can(ProjectAction::Edit, ProjectSubject::Role, &none()));
        assert!(!member.can(ProjectAction::Delete, ProjectSubject::Project, &none()));
    }

    #[test]
    fn admin_covers_every_supported_pair() {
        let admin = role("admin");
        for subject in ProjectSubject::all() {
            for action in ProjectPermissions::supported_actions(*subject) {
                assert!(admin.can(*action, *subject, &none()));
            }
        }
    }

    #[test]
    fn predefined_rules_fit_the_vocabulary() {
        for slug in ["admin", "member", "viewer", "no-access"] {
            let rules = ProjectPermissions::predefined_role(slug).unwrap_or_default();
            assert!(rules.iter().all(|rule| rule.validate().is_ok()), "{slug}");
        }
    }

    #[test]
    fn storage_names_match_serde_names() {
        for subject in ProjectSubject::all() {
            let encoded = serde_json::to_value(subject).ok();
            assert_eq!(encoded, Some(serde_json::Value::from(subject.as_str())));
        }
        for action in ProjectAction::all() {
            let encoded = serde_json::to_value(action).ok();
            assert_eq!(encoded, Some(serde_json::Value::from(action.as_str())));
        }
    }

    #[test]
    fn service_token_rules_are_scoped_by_environment_and_path() {
        let scopes = vec![ServiceTokenScope {
            environment: "dev".to_owned(),
            secret_path: "/app/**".to_owned(),
        }];
        let rules = service_token_rules(&scopes, &[ServiceTokenPermission::Read]);
        let Ok(rules) = rules else {
            panic!("service token rules should build");
        };
        let ability = Ability::build(rules);

        let inside = ResourceAttributes::new()
            .with("environment", "dev")
            .with("secretPath", "/app/db");
        let other_env = ResourceAttributes::new()
            .with("environment", "prod")
            .with("secretPath", "/app/db");

        assert!(ability.can(ProjectAction::Read, ProjectSubject::Secrets, &inside));
        assert!(ability.can(ProjectAction::ReadValue, ProjectSubject::Secrets, &inside));
        assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &other_env));
        assert!(!ability.can(ProjectAction::Edit, ProjectSubject::Secrets, &inside));
    }

    #[test]
    fn write_only_token_cannot_read() {
        let scopes = vec![ServiceTokenScope {
            environment: "dev".to_owned(),
            secret_path: "/**".to_owned(),
        }];
        let Ok(rules) = service_token_rules(&scopes, &[ServiceTokenPermission::Write]) else {
            panic!("service token rules should build");
        };
        let ability = Ability::build(rules);
        let secret = ResourceAttributes::new()
            .with("environment", "dev")
            .with("secretPath", "/x");

        assert!(ability.can(ProjectAction::Edit, ProjectSubject::Secrets, &secret));
        assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &secret));
    }
}
