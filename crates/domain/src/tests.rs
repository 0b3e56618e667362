use crate::{
    Ability, Conditions, FieldCondition, OrgAction, OrgPermissions, OrgSubject,
    PermissionVocabulary, ProjectAction, ProjectPermissions, ProjectSubject, ResourceAttributes,
    RuleSetBuilder, VocabularyTerm,
};

fn glob(pattern: &str) -> FieldCondition {
    match FieldCondition::glob(pattern) {
        Ok(condition) => condition,
        Err(error) => panic!("pattern should compile: {error}"),
    }
}

#[test]
fn nothing_is_allowed_without_a_matching_rule() {
    let ability = Ability::build(
        RuleSetBuilder::<ProjectPermissions>::new()
            .can([ProjectAction::Read], ProjectSubject::Environments)
            .build(),
    );
    let attributes = ResourceAttributes::new().with("environment", "prod");

    for subject in ProjectSubject::all() {
        for action in ProjectAction::all() {
            if *subject == ProjectSubject::Environments && *action == ProjectAction::Read {
                continue;
            }
            assert!(ability.cannot(*action, *subject, &attributes));
        }
    }
}

#[test]
fn production_denial_overrides_general_read() {
    let ability = Ability::build(
        RuleSetBuilder::<ProjectPermissions>::new()
            .can([ProjectAction::Read], ProjectSubject::Secrets)
            .cannot_where(
                [ProjectAction::Read],
                ProjectSubject::Secrets,
                Conditions::new().with("environment", FieldCondition::equals("prod")),
            )
            .build(),
    );

    let prod = ResourceAttributes::new().with("environment", "prod");
    let staging = ResourceAttributes::new().with("environment", "staging");
    assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &prod));
    assert!(ability.can(ProjectAction::Read, ProjectSubject::Secrets, &staging));
}

#[test]
fn path_glob_stops_at_segment_boundary() {
    let ability = Ability::build(
        RuleSetBuilder::<ProjectPermissions>::new()
            .can_where(
                [ProjectAction::Read],
                ProjectSubject::Secrets,
                Conditions::new().with("secretPath", glob("/foo/*")),
            )
            .build(),
    );

    let at = |path: &str| ResourceAttributes::new().with("secretPath", path);
    assert!(ability.can(ProjectAction::Read, ProjectSubject::Secrets, &at("/foo/bar")));
    assert!(ability.can(ProjectAction::Read, ProjectSubject::Secrets, &at("/foo/bar/baz")));
    assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &at("/foobar")));
    assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &at("/fo")));
}

#[test]
fn not_in_holds_when_environment_is_absent() {
    let ability = Ability::build(
        RuleSetBuilder::<ProjectPermissions>::new()
            .can_where(
                [ProjectAction::Read],
                ProjectSubject::Secrets,
                Conditions::new().with("environment", FieldCondition::none_of(["prod"])),
            )
            .build(),
    );

    assert!(ability.can(
        ProjectAction::Read,
        ProjectSubject::Secrets,
        &ResourceAttributes::new().with("secretPath", "/")
    ));
    assert!(!ability.can(
        ProjectAction::Read,
        ProjectSubject::Secrets,
        &ResourceAttributes::new().with("environment", "prod")
    ));
}

#[test]
fn tag_conditions_evaluate_against_tag_sets() {
    let ability = Ability::build(
        RuleSetBuilder::<ProjectPermissions>::new()
            .can([ProjectAction::Read], ProjectSubject::Secrets)
            .cannot_where(
                [ProjectAction::Read],
                ProjectSubject::Secrets,
                Conditions::new().with(
                    "secretTags",
                    FieldCondition::contains(["pci"], crate::TagMatchMode::Any),
                ),
            )
            .build(),
    );

    let tagged = ResourceAttributes::new().with_set("secretTags", ["pci", "backend"]);
    let untagged = ResourceAttributes::new().with_set("secretTags", ["backend"]);
    assert!(!ability.can(ProjectAction::Read, ProjectSubject::Secrets, &tagged));
    assert!(ability.can(ProjectAction::Read, ProjectSubject::Secrets, &untagged));
}

#[test]
fn org_admin_can_delete_members() {
    let Some(rules) = OrgPermissions::predefined_role("admin") else {
        panic!("admin should be predefined");
    };
    let ability = Ability::build(rules);

    assert!(ability.can(OrgAction::Delete, OrgSubject::Member, &ResourceAttributes::new()));
}

#[test]
fn project_viewer_is_forbidden_to_edit_secrets() {
    let Some(rules) = ProjectPermissions::predefined_role("viewer") else {
        panic!("viewer should be predefined");
    };
    let ability = Ability::build(rules);
    let attributes = ResourceAttributes::new();

    assert!(!ability.can(ProjectAction::Edit, ProjectSubject::Secrets, &attributes));
    let Err(error) = ability.throw_unless_can(ProjectAction::Edit, ProjectSubject::Secrets, &attributes)
    else {
        panic!("viewer edit should be forbidden");
    };
    assert_eq!(error.subject, "secrets");
    assert_eq!(error.action, "edit");
    assert!(error.allowed_actions.contains(&"read"));
}
