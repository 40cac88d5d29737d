//! Access decision invariants over arbitrary users, files and grants

use chrono::Utc;
use proptest::prelude::*;

use stockroom::backend::access::authorize;
use stockroom::backend::access::RoleGate;
use stockroom::shared::{
    Capability, Decision, DenyReason, File, FilePermission, PermissionLevel, Role, User,
};

fn role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn level() -> impl Strategy<Value = PermissionLevel> {
    prop_oneof![
        Just(PermissionLevel::Read),
        Just(PermissionLevel::Write),
        Just(PermissionLevel::Admin),
    ]
}

fn subject(role: Role, department: Option<i64>) -> User {
    User {
        id: 100,
        username: "subject".to_string(),
        role,
        department_id: department,
        is_active: true,
    }
}

fn file(department: i64, created_by: i64) -> File {
    File {
        id: 1,
        name: "sheet".to_string(),
        department_id: department,
        created_by,
        created_at: Utc::now(),
    }
}

fn grant(level: PermissionLevel) -> FilePermission {
    FilePermission {
        file_id: 1,
        user_id: 100,
        level,
        granted_by: Some(1),
        granted_at: Utc::now(),
    }
}

proptest! {
    #[test]
    fn admin_is_always_allowed(
        department in prop::option::of(1i64..4),
        file_department in 1i64..4,
        granted in prop::option::of(level()),
        requested in level(),
    ) {
        let user = subject(Role::Admin, department);
        let grant = granted.map(grant);
        let decision = authorize(&user, &file(file_department, 7), grant.as_ref(), requested);
        prop_assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn creator_is_always_allowed(
        role in role(),
        department in prop::option::of(1i64..4),
        file_department in 1i64..4,
        requested in level(),
    ) {
        let user = subject(role, department);
        let decision = authorize(&user, &file(file_department, user.id), None, requested);
        prop_assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn other_departments_are_closed(
        role in role().prop_filter("non-admin", |role| *role != Role::Admin),
        granted in prop::option::of(level()),
        requested in level(),
    ) {
        let user = subject(role, Some(1));
        let grant = granted.map(grant);
        let decision = authorize(&user, &file(2, 7), grant.as_ref(), requested);
        prop_assert_eq!(decision, Decision::Deny(DenyReason::CrossDepartment));
    }

    #[test]
    fn department_members_can_read(
        role in role(),
        granted in prop::option::of(level()),
    ) {
        let user = subject(role, Some(3));
        let grant = granted.map(grant);
        let decision = authorize(&user, &file(3, 7), grant.as_ref(), PermissionLevel::Read);
        prop_assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn viewer_writes_need_a_grant(granted in prop::option::of(level())) {
        let user = subject(Role::Viewer, Some(3));
        let grant = granted.map(grant);
        let decision = authorize(&user, &file(3, 7), grant.as_ref(), PermissionLevel::Write);
        match granted {
            Some(level) if level >= PermissionLevel::Write => {
                prop_assert_eq!(decision, Decision::Allow)
            }
            _ => prop_assert_eq!(decision, Decision::Deny(DenyReason::ViewerReadOnly)),
        }
    }

    #[test]
    fn file_admin_needs_admin_grant(
        role in prop_oneof![Just(Role::Editor), Just(Role::User)],
        granted in prop::option::of(level()),
    ) {
        let user = subject(role, Some(3));
        let grant = granted.map(grant);
        let decision = authorize(&user, &file(3, 7), grant.as_ref(), PermissionLevel::Admin);
        if granted == Some(PermissionLevel::Admin) {
            prop_assert_eq!(decision, Decision::Allow);
        } else {
            prop_assert_eq!(decision, Decision::Deny(DenyReason::InsufficientPermission));
        }
    }

    #[test]
    fn role_gate_only_opens_admin_capabilities_to_admins(role in role()) {
        for capability in Capability::ALL {
            let decision = RoleGate::evaluate(role, capability);
            if capability.requires_admin() && role != Role::Admin {
                prop_assert_eq!(decision, Decision::Deny(DenyReason::AdminRequired));
            }
            if capability == Capability::ReadFiles {
                prop_assert_eq!(decision, Decision::Allow);
            }
        }
    }
}
