use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use super::rows::{
    AdditionalPrivilegeRow, GroupMembershipRow, MembershipRoleRow, ScopeOwnerRow,
    ServiceTokenRow, assemble_membership,
};

fn owner() -> ScopeOwnerRow {
    ScopeOwnerRow {
        org_id: Uuid::new_v4(),
        auth_enforced: true,
    }
}

fn role_row(membership_id: Uuid, role: &str) -> MembershipRoleRow {
    MembershipRoleRow {
        id: Uuid::new_v4(),
        membership_id,
        role: role.to_owned(),
        custom_role_id: None,
        is_temporary: false,
        temporary_mode: None,
        temporary_range: None,
        temporary_access_start_time: None,
        temporary_access_end_time: None,
    }
}

#[test]
fn no_direct_or_group_membership_assembles_to_none() {
    assert!(assemble_membership(owner(), None, &[], Vec::new(), Vec::new()).is_none());
}

#[test]
fn role_rows_are_split_between_direct_and_group_memberships() {
    let direct_id = Uuid::new_v4();
    let groups = [
        GroupMembershipRow {
            membership_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
        },
        GroupMembershipRow {
            membership_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
        },
    ];
    let roles = vec![
        role_row(groups[1].membership_id, "viewer"),
        role_row(direct_id, "member"),
        role_row(groups[0].membership_id, "admin"),
        role_row(direct_id, "no-access"),
    ];

    let Some(record) = assemble_membership(owner(), Some(direct_id), &groups, roles, Vec::new())
    else {
        panic!("direct membership should assemble");
    };

    assert_eq!(record.membership_id, direct_id);
    assert!(record.org_auth_enforced);
    let direct: Vec<&str> = record.roles.iter().map(|role| role.role.as_str()).collect();
    assert_eq!(direct, vec!["member", "no-access"]);
    assert_eq!(record.group_roles[0].group_id, groups[0].group_id);
    assert_eq!(record.group_roles[0].roles[0].role, "admin");
    assert_eq!(record.group_roles[1].roles[0].role, "viewer");
}

#[test]
fn group_only_member_takes_first_group_membership_id() {
    let group = GroupMembershipRow {
        membership_id: Uuid::new_v4(),
        group_id: Uuid::new_v4(),
    };

    let Some(record) = assemble_membership(owner(), None, &[group], Vec::new(), Vec::new()) else {
        panic!("group membership should assemble");
    };
    assert_eq!(record.membership_id, group.membership_id);
    assert!(record.roles.is_empty());
}

#[test]
fn temporary_columns_carry_into_privileges() {
    let Some(start) = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single() else {
        panic!("valid timestamp");
    };
    let privilege = AdditionalPrivilegeRow {
        id: Uuid::new_v4(),
        slug: "hotfix".to_owned(),
        permissions: json!([["edit", "secrets"]]),
        is_temporary: true,
        temporary_mode: Some("relative".to_owned()),
        temporary_range: Some("1h".to_owned()),
        temporary_access_start_time: Some(start),
        temporary_access_end_time: None,
    };

    let Some(record) =
        assemble_membership(owner(), Some(Uuid::new_v4()), &[], Vec::new(), vec![privilege])
    else {
        panic!("direct membership should assemble");
    };
    let temporary_access = &record.additional_privileges[0].temporary_access;
    assert!(temporary_access.is_temporary);
    assert!(matches!(temporary_access.grant(), Ok(grant) if grant.is_temporary()));
}

#[test]
fn service_token_scopes_decode_from_json() {
    let row = ServiceTokenRow {
        id: Uuid::new_v4(),
        name: "ci".to_owned(),
        project_id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        scopes: json!([{ "environment": "dev", "secretPath": "/app" }]),
        permissions: vec!["read".to_owned()],
        expires_at: None,
    };

    let Ok(record) = row.into_record() else {
        panic!("scopes should decode");
    };
    assert_eq!(record.scopes[0].environment, "dev");
    assert_eq!(record.scopes[0].secret_path, "/app");
}

#[test]
fn service_token_with_malformed_scopes_is_an_internal_error() {
    let row = ServiceTokenRow {
        id: Uuid::new_v4(),
        name: "ci".to_owned(),
        project_id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        scopes: json!({ "environment": "dev" }),
        permissions: Vec::new(),
        expires_at: None,
    };

    assert!(matches!(
        row.into_record(),
        Err(vaultgate_core::AppError::Internal(_))
    ));
}
