//! Roles, permission levels and access decisions.
//!
//! Roles form a closed set with a capability table; adding a role means adding
//! one variant and one row in [`Role::capabilities`]. Permission levels are
//! ordered `read < write < admin` and compare numerically.
use crate::shared::error::SharedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    User,
    Viewer,
}

/// Row of the role capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCapabilities {
    /// Ordering tier: admin 3, editor and user 2, viewer 1.
    pub tier: u8,
    /// Skips ownership, department and grant checks on files.
    pub bypasses_file_checks: bool,
    /// May write rows of files in the user's own department without a grant.
    pub writes_department_files: bool,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Editor, Role::User, Role::Viewer];

    pub const fn capabilities(self) -> RoleCapabilities {
        match self {
            Role::Admin => RoleCapabilities {
                tier: 3,
                bypasses_file_checks: true,
                writes_department_files: true,
            },
            Role::Editor | Role::User => RoleCapabilities {
                tier: 2,
                bypasses_file_checks: false,
                writes_department_files: true,
            },
            Role::Viewer => RoleCapabilities {
                tier: 1,
                bypasses_file_checks: false,
                writes_department_files: false,
            },
        }
    }

    pub fn tier(self) -> u8 {
        self.capabilities().tier
    }

    pub fn is_admin(self) -> bool {
        self.capabilities().bypasses_file_checks
    }

    /// Viewers can read everything they can see and write nothing by default.
    pub fn is_read_only(self) -> bool {
        !self.capabilities().writes_department_files
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| SharedError::unknown("role", s))
    }
}

/// Level of access on a single file, ordered `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read = 1,
    Write = 2,
    Admin = 3,
}

impl PermissionLevel {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Result<Self, SharedError> {
        match value {
            1 => Ok(PermissionLevel::Read),
            2 => Ok(PermissionLevel::Write),
            3 => Ok(PermissionLevel::Admin),
            other => Err(SharedError::unknown("permission level", other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
            PermissionLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(PermissionLevel::Read),
            "write" => Ok(PermissionLevel::Write),
            "admin" => Ok(PermissionLevel::Admin),
            _ => Err(SharedError::unknown("permission level", s)),
        }
    }
}

/// Why an access check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    CrossDepartment,
    ViewerReadOnly,
    InsufficientPermission,
    AdminRequired,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::CrossDepartment => "cross-department",
            DenyReason::ViewerReadOnly => "viewer-read-only",
            DenyReason::InsufficientPermission => "insufficient-permission",
            DenyReason::AdminRequired => "admin-required",
        }
    }

    /// Message shown to the caller in the error envelope.
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::CrossDepartment => "File belongs to another department",
            DenyReason::ViewerReadOnly => "Viewers have read-only access",
            DenyReason::InsufficientPermission => "Insufficient permission for this file",
            DenyReason::AdminRequired => "Administrator role required",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny_reason(self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason),
        }
    }

    /// `Ok(())` on allow, the deny reason otherwise.
    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Route-level capability checked by the role gate before any file lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadFiles,
    CreateFiles,
    WriteRows,
    ManageGrants,
    ViewAudit,
    ForceUnlock,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ReadFiles,
        Capability::CreateFiles,
        Capability::WriteRows,
        Capability::ManageGrants,
        Capability::ViewAudit,
        Capability::ForceUnlock,
    ];

    /// Mutating capabilities are closed to read-only roles.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Capability::ReadFiles | Capability::ViewAudit)
    }

    pub fn requires_admin(self) -> bool {
        matches!(self, Capability::ViewAudit | Capability::ForceUnlock)
    }
}
