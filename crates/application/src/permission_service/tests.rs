use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use vaultgate_core::{Actor, ActorAuthMethod, AppError, OrgId, ProjectId};
use vaultgate_domain::{
    Conditions, Decision, FieldCondition, OrgAction, OrgSubject, PermissionRule, ProjectAction,
    ProjectPermissions, ProjectSubject, ResourceAttributes, RuleSetBuilder,
};

use crate::test_support::{FakePermissionRepository, custom_role, membership, start_of_day};
use crate::{
    FixedClock, MembershipRoleRecord, PermissionError, PermissionScope, PermissionService,
    RuleOrigin,
};

fn service(repository: FakePermissionRepository) -> PermissionService {
    PermissionService::new(
        Arc::new(repository),
        Arc::new(FixedClock::new(start_of_day())),
    )
}

fn project_member(
    actor: Actor,
    project_id: ProjectId,
    org_id: OrgId,
    role: &str,
) -> FakePermissionRepository {
    FakePermissionRepository {
        project_memberships: [(
            (actor, project_id),
            membership(org_id, vec![MembershipRoleRecord::predefined(role)]),
        )]
        .into(),
        ..FakePermissionRepository::default()
    }
}

#[tokio::test]
async fn org_admin_may_delete_members() {
    let actor = Actor::user(Uuid::new_v4());
    let org_id = OrgId::new();
    let repository = FakePermissionRepository {
        org_memberships: [(
            (actor, org_id),
            membership(org_id, vec![MembershipRoleRecord::predefined("admin")]),
        )]
        .into(),
        ..FakePermissionRepository::default()
    };

    let Ok(scoped) = service(repository)
        .get_org_permission(actor, org_id, ActorAuthMethod::Email, Some(org_id))
        .await
    else {
        panic!("admin should resolve");
    };

    assert!(
        scoped
            .throw_unless_can(OrgAction::Delete, OrgSubject::Member, &ResourceAttributes::new())
            .is_ok()
    );
}

#[tokio::test]
async fn project_viewer_edit_is_forbidden_with_context() {
    let actor = Actor::user(Uuid::new_v4());
    let project_id = ProjectId::new();
    let org_id = OrgId::new();
    let repository = project_member(actor, project_id, org_id, "viewer");

    let Ok(scoped) = service(repository)
        .get_project_permission(actor, project_id, ActorAuthMethod::Email, None)
        .await
    else {
        panic!("viewer should resolve");
    };

    let result = scoped.throw_unless_can(
        ProjectAction::Edit,
        ProjectSubject::Secrets,
        &ResourceAttributes::new(),
    );
    let Err(PermissionError::Forbidden(error)) = result else {
        panic!("viewer edit should be forbidden");
    };
    assert_eq!(error.action, "edit");
    assert_eq!(error.subject, "secrets");

    let message = AppError::from(PermissionError::Forbidden(error)).to_string();
    assert!(message.contains("you lack permission to edit on secrets"));
}

#[tokio::test]
async fn session_bound_to_another_org_is_rejected() {
    let actor = Actor::user(Uuid::new_v4());
    let project_id = ProjectId::new();
    let org_id = OrgId::new();
    let repository = project_member(actor, project_id, org_id, "admin");

    let result = service(repository)
        .get_project_permission(actor, project_id, ActorAuthMethod::Email, Some(OrgId::new()))
        .await;

    assert!(matches!(
        result,
        Err(PermissionError::OrganizationMismatch { scope_org_id, .. }) if scope_org_id == org_id
    ));
}

#[tokio::test]
async fn enforced_sso_rejects_users_without_it_and_exempts_identities() {
    let user = Actor::user(Uuid::new_v4());
    let identity = Actor::identity(Uuid::new_v4());
    let org_id = OrgId::new();
    let mut record = membership(org_id, vec![MembershipRoleRecord::predefined("member")]);
    record.org_auth_enforced = true;
    let repository = FakePermissionRepository {
        org_memberships: [((user, org_id), record.clone()), ((identity, org_id), record)].into(),
        ..FakePermissionRepository::default()
    };
    let service = service(repository);

    assert!(matches!(
        service
            .get_org_permission(user, org_id, ActorAuthMethod::Google, Some(org_id))
            .await,
        Err(PermissionError::AuthMethodNotAllowed {
            auth_method: ActorAuthMethod::Google,
            ..
        })
    ));
    assert!(
        service
            .get_org_permission(user, org_id, ActorAuthMethod::Saml, Some(org_id))
            .await
            .is_ok()
    );
    assert!(
        service
            .get_org_permission(identity, org_id, ActorAuthMethod::UniversalAuth, Some(org_id))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn service_tokens_have_no_org_permission() {
    let result = service(FakePermissionRepository::default())
        .get_org_permission(
            Actor::service(Uuid::new_v4()),
            OrgId::new(),
            ActorAuthMethod::ServiceToken,
            None,
        )
        .await;

    assert!(matches!(
        result,
        Err(PermissionError::UnsupportedActor { .. })
    ));
    let Err(error) = result else {
        panic!("service token should be rejected");
    };
    assert!(matches!(AppError::from(error), AppError::Internal(_)));
}

#[tokio::test]
async fn decided_rule_maps_back_to_its_source() {
    let actor = Actor::user(Uuid::new_v4());
    let project_id = ProjectId::new();
    let repository = project_member(actor, project_id, OrgId::new(), "viewer");

    let Ok(scoped) = service(repository)
        .get_project_permission(actor, project_id, ActorAuthMethod::Email, None)
        .await
    else {
        panic!("viewer should resolve");
    };

    let Decision::Allowed { rule_index } = scoped.permission.decide(
        ProjectAction::Read,
        ProjectSubject::Secrets,
        &ResourceAttributes::new(),
    ) else {
        panic!("viewer should read secrets");
    };
    let Some(source) = scoped.source_of(rule_index) else {
        panic!("rule should have a source");
    };
    assert_eq!(source.origin, RuleOrigin::Direct);
    assert_eq!(source.role_slug, "viewer");
}

#[tokio::test]
async fn role_abilities_cover_predefined_and_custom_roles() {
    let project_id = ProjectId::new();
    let auditor = custom_role("auditor", json!([["read", "audit-logs"]]));
    let repository = FakePermissionRepository {
        custom_roles: vec![(PermissionScope::Project(project_id), auditor)],
        ..FakePermissionRepository::default()
    };
    let service = service(repository);

    let Ok(viewer) = service
        .get_project_permission_by_role("viewer", project_id)
        .await
    else {
        panic!("viewer is predefined");
    };
    assert!(!viewer.is_empty());

    let Ok(auditor) = service
        .get_project_permission_by_role("auditor", project_id)
        .await
    else {
        panic!("auditor is stored");
    };
    assert!(auditor.can(
        ProjectAction::Read,
        ProjectSubject::AuditLogs,
        &ResourceAttributes::new()
    ));

    assert!(matches!(
        service
            .get_project_permission_by_role("auditor", ProjectId::new())
            .await,
        Err(PermissionError::Store(AppError::NotFound(_)))
    ));
    assert!(matches!(
        service
            .get_org_permission_by_role("viewer", OrgId::new())
            .await,
        Err(PermissionError::Store(AppError::NotFound(_)))
    ));
}

#[tokio::test]
async fn granting_beyond_own_permission_is_escalation() {
    let actor = Actor::user(Uuid::new_v4());
    let project_id = ProjectId::new();
    let repository = project_member(actor, project_id, OrgId::new(), "member");

    let Ok(scoped) = service(repository)
        .get_project_permission(actor, project_id, ActorAuthMethod::Email, None)
        .await
    else {
        panic!("member should resolve");
    };

    let narrower = RuleSetBuilder::<ProjectPermissions>::new()
        .can_where(
            [ProjectAction::Read],
            ProjectSubject::Secrets,
            Conditions::new().with("environment", FieldCondition::equals("dev")),
        )
        .build();
    assert!(PermissionService::ensure_within_boundary(&scoped.permission, &narrower).is_ok());

    let everything = vec![PermissionRule::<ProjectPermissions>::manage_all()];
    let Err(PermissionError::PrivilegeEscalation { missing }) =
        PermissionService::ensure_within_boundary(&scoped.permission, &everything)
    else {
        panic!("manage-all should exceed a member");
    };
    assert!(!missing.is_empty());
}
