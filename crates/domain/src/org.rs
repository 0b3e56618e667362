use serde::{Deserialize, Serialize};

use crate::rule::{PermissionRule, RuleSetBuilder};
use crate::vocabulary::{PermissionVocabulary, ScopeKind, VocabularyTerm};

/// Operations at organization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrgAction {
    /// View.
    Read,
    /// Create.
    Create,
    /// Update.
    Edit,
    /// Remove.
    Delete,
    /// Hand out privileges the actor holds to others.
    GrantPrivileges,
    /// Use an app connection from a project.
    Connect,
    /// Enter any project of the organization from the admin console.
    AccessAllProjects,
}

impl VocabularyTerm for OrgAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::GrantPrivileges => "grant-privileges",
            Self::Connect => "connect",
            Self::AccessAllProjects => "access-all-projects",
        }
    }

    fn all() -> &'static [Self] {
        const ALL: &[OrgAction] = &[
            OrgAction::Read,
            OrgAction::Create,
            OrgAction::Edit,
            OrgAction::Delete,
            OrgAction::GrantPrivileges,
            OrgAction::Connect,
            OrgAction::AccessAllProjects,
        ];

        ALL
    }
}

/// Resource categories at organization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrgSubject {
    /// Projects of the organization.
    Workspace,
    /// Organization roles.
    Role,
    /// Organization members.
    Member,
    /// Organization settings.
    Settings,
    /// User groups.
    Groups,
    /// Machine identities.
    Identity,
    /// Key management.
    Kms,
    /// Audit log stream.
    AuditLogs,
    /// Reusable project templates.
    ProjectTemplates,
    /// Third-party connections.
    AppConnections,
    /// Secret scanning.
    SecretScanning,
    /// Billing.
    Billing,
    /// SAML/OIDC single sign-on configuration.
    Sso,
    /// LDAP configuration.
    Ldap,
    /// SCIM provisioning.
    Scim,
    /// Admin console.
    AdminConsole,
}

impl VocabularyTerm for OrgSubject {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Role => "role",
            Self::Member => "member",
            Self::Settings => "settings",
            Self::Groups => "groups",
            Self::Identity => "identity",
            Self::Kms => "kms",
            Self::AuditLogs => "audit-logs",
            Self::ProjectTemplates => "project-templates",
            Self::AppConnections => "app-connections",
            Self::SecretScanning => "secret-scanning",
            Self::Billing => "billing",
            Self::Sso => "sso",
            Self::Ldap => "ldap",
            Self::Scim => "scim",
            Self::AdminConsole => "admin-console",
        }
    }

    fn all() -> &'static [Self] {
        const ALL: &[OrgSubject] = &[
            OrgSubject::Workspace,
            OrgSubject::Role,
            OrgSubject::Member,
            OrgSubject::Settings,
            OrgSubject::Groups,
            OrgSubject::Identity,
            OrgSubject::Kms,
            OrgSubject::AuditLogs,
            OrgSubject::ProjectTemplates,
            OrgSubject::AppConnections,
            OrgSubject::SecretScanning,
            OrgSubject::Billing,
            OrgSubject::Sso,
            OrgSubject::Ldap,
            OrgSubject::Scim,
            OrgSubject::AdminConsole,
        ];

        ALL
    }
}

const CRUD: &[OrgAction] = &[
    OrgAction::Read,
    OrgAction::Create,
    OrgAction::Edit,
    OrgAction::Delete,
];

const CRUD_AND_GRANT: &[OrgAction] = &[
    OrgAction::Read,
    OrgAction::Create,
    OrgAction::Edit,
    OrgAction::Delete,
    OrgAction::GrantPrivileges,
];

/// Organization-scope vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgPermissions;

impl PermissionVocabulary for OrgPermissions {
    type Action = OrgAction;
    type Subject = OrgSubject;

    const SCOPE: ScopeKind = ScopeKind::Organization;

    fn supported_actions(subject: OrgSubject) -> &'static [OrgAction] {
        match subject {
            OrgSubject::Workspace => &[OrgAction::Read, OrgAction::Create],
            OrgSubject::AuditLogs => &[OrgAction::Read],
            OrgSubject::AdminConsole => &[OrgAction::AccessAllProjects],
            OrgSubject::Groups | OrgSubject::Identity => CRUD_AND_GRANT,
            OrgSubject::AppConnections => &[
                OrgAction::Read,
                OrgAction::Create,
                OrgAction::Edit,
                OrgAction::Delete,
                OrgAction::Connect,
            ],
            OrgSubject::Role
            | OrgSubject::Member
            | OrgSubject::Settings
            | OrgSubject::Kms
            | OrgSubject::ProjectTemplates
            | OrgSubject::SecretScanning
            | OrgSubject::Billing
            | OrgSubject::Sso
            | OrgSubject::Ldap
            | OrgSubject::Scim => CRUD,
        }
    }

    fn condition_fields(subject: OrgSubject) -> &'static [&'static str] {
        match subject {
            OrgSubject::AppConnections => &["connectionId"],
            OrgSubject::Identity => &["identityId"],
            _ => &[],
        }
    }

    fn predefined_role(slug: &str) -> Option<Vec<PermissionRule<Self>>> {
        match slug {
            "admin" => Some(vec![PermissionRule::manage_all()]),
            "member" => Some(org_member_rules()),
            "no-access" => Some(Vec::new()),
            _ => None,
        }
    }
}

fn org_member_rules() -> Vec<PermissionRule<OrgPermissions>> {
    RuleSetBuilder::<OrgPermissions>::new()
        .can([OrgAction::Read, OrgAction::Create], OrgSubject::Workspace)
        .can([OrgAction::Read], OrgSubject::Member)
        .can([OrgAction::Read], OrgSubject::Groups)
        .can([OrgAction::Read], OrgSubject::Role)
        .can([OrgAction::Read], OrgSubject::Settings)
        .can([OrgAction::Read], OrgSubject::Billing)
        .can(
            [
                OrgAction::Read,
                OrgAction::Create,
                OrgAction::Edit,
                OrgAction::Delete,
            ],
            OrgSubject::Identity,
        )
        .can([OrgAction::Read], OrgSubject::AuditLogs)
        .can([OrgAction::Read], OrgSubject::SecretScanning)
        .can([OrgAction::Read], OrgSubject::ProjectTemplates)
        .can([OrgAction::Read, OrgAction::Connect], OrgSubject::AppConnections)
        .build()
}

#[cfg(test)]
mod tests {
    use super::{OrgAction, OrgPermissions, OrgSubject};
    use crate::{Ability, PermissionVocabulary, ResourceAttributes, RuleSetBuilder, VocabularyTerm};

    fn role(slug: &str) -> Ability<OrgPermissions> {
        match OrgPermissions::predefined_role(slug) {
            Some(rules) => Ability::build(rules),
            None => panic!("role '{slug}' should be predefined"),
        }
    }

    #[test]
    fn admin_can_delete_members() {
        let admin = role("admin");
        assert!(admin.can(OrgAction::Delete, OrgSubject::Member, &ResourceAttributes::new()));
    }

    #[test]
    fn member_reads_but_does_not_manage_members() {
        let member = role("member");
        assert!(member.can(OrgAction::Read, OrgSubject::Member, &ResourceAttributes::new()));
        assert!(!member.can(OrgAction::Delete, OrgSubject::Member, &ResourceAttributes::new()));
    }

    #[test]
    fn no_access_role_is_empty_and_custom_is_not_predefined() {
        assert!(role("no-access").is_empty());
        assert!(!OrgPermissions::is_predefined_role("custom"));
        assert!(!OrgPermissions::is_predefined_role("viewer"));
    }

    #[test]
    fn predefined_rules_fit_the_vocabulary() {
        for slug in ["admin", "member", "no-access"] {
            let rules = OrgPermissions::predefined_role(slug).unwrap_or_default();
            assert!(rules.iter().all(|rule| rule.validate().is_ok()), "{slug}");
        }
    }

    #[test]
    fn storage_names_are_unique_and_parse_back() {
        for subject in OrgSubject::all() {
            assert_eq!(OrgSubject::from_storage(subject.as_str()), Some(*subject));
            assert!(!OrgPermissions::supported_actions(*subject).is_empty());
        }
        for action in OrgAction::all() {
            assert_eq!(OrgAction::from_storage(action.as_str()), Some(*action));
        }
    }

    #[test]
    fn app_connection_usage_can_be_narrowed_by_connection() {
        let rules = RuleSetBuilder::<OrgPermissions>::new()
            .can_where(
                [OrgAction::Connect],
                OrgSubject::AppConnections,
                crate::Conditions::new()
                    .with("connectionId", crate::FieldCondition::one_of(["conn-1"])),
            )
            .try_build();
        let Ok(rules) = rules else {
            panic!("connection rule should validate");
        };

        let ability = Ability::build(rules);
        let allowed = ResourceAttributes::new().with("connectionId", "conn-1");
        let other = ResourceAttributes::new().with("connectionId", "conn-2");
        assert!(ability.can(OrgAction::Connect, OrgSubject::AppConnections, &allowed));
        assert!(!ability.can(OrgAction::Connect, OrgSubject::AppConnections, &other));
    }
}
