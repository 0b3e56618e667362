//! Application services and ports.

#![forbid(unsafe_code)]

mod clock;
mod permission_error;
mod permission_ports;
mod permission_service;
mod scope_resolver;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use permission_error::PermissionError;
pub use permission_ports::{
    AdditionalPrivilegeRecord, CustomRoleRecord, GroupRolesRecord, MembershipRecord,
    MembershipRoleRecord, PermissionRepository, PermissionScope, ServiceTokenRecord,
    TemporaryAccessRecord,
};
pub use permission_service::{PermissionService, ScopedPermission};
pub use scope_resolver::{MembershipSummary, ResolvedRules, RuleOrigin, RuleSource, ScopeResolver};
