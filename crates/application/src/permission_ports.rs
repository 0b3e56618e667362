mod records;
mod repository;

pub use records::{
    AdditionalPrivilegeRecord, CustomRoleRecord, GroupRolesRecord, MembershipRecord,
    MembershipRoleRecord, ServiceTokenRecord, TemporaryAccessRecord,
};
pub use repository::{PermissionRepository, PermissionScope};
