/**
 * Permission Resolution Engine
 *
 * Decides whether a user may read or write one file. The decision itself is
 * a pure function over an ordered rule list; the first rule that returns a
 * decision wins. `PermissionEngine` wraps it with the file and grant lookups.
 *
 * # Rule Order
 *
 * 1. admin role allows everything
 * 2. the file's creator is allowed
 * 3. a file outside the user's department is denied (`cross-department`)
 * 4. an explicit grant at or above the requested level allows
 * 5. same department, read allows
 * 6. same department, write allows for editor and user roles
 * 7. anything else is denied
 *
 * A grant below the requested level decides nothing and evaluation continues,
 * so grants only widen access.
 */
use std::sync::Arc;

use thiserror::Error;

use crate::backend::store::{FileStore, StoreError};
use crate::shared::{
    Decision, DenyReason, File, FileId, FilePermission, PermissionLevel, Role, User,
};

/// Inputs of a single access decision.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    pub user: &'a User,
    pub file: &'a File,
    pub grant: Option<&'a FilePermission>,
    pub requested: PermissionLevel,
}

pub type Rule = fn(&AccessContext<'_>) -> Option<Decision>;

/// Ordered rule list, evaluated top to bottom.
pub const RULES: &[(&str, Rule)] = &[
    ("admin-bypass", admin_bypass),
    ("creator-owns", creator_owns),
    ("department-boundary", department_boundary),
    ("explicit-grant", explicit_grant),
    ("department-read", department_read),
    ("department-write", department_write),
    ("deny-remaining", deny_remaining),
];

fn admin_bypass(ctx: &AccessContext<'_>) -> Option<Decision> {
    ctx.user
        .role
        .capabilities()
        .bypasses_file_checks
        .then_some(Decision::Allow)
}

fn creator_owns(ctx: &AccessContext<'_>) -> Option<Decision> {
    (ctx.file.created_by == ctx.user.id).then_some(Decision::Allow)
}

fn department_boundary(ctx: &AccessContext<'_>) -> Option<Decision> {
    (!ctx.user.in_department(ctx.file.department_id))
        .then_some(Decision::Deny(DenyReason::CrossDepartment))
}

fn explicit_grant(ctx: &AccessContext<'_>) -> Option<Decision> {
    ctx.grant
        .filter(|grant| grant.level >= ctx.requested)
        .map(|_| Decision::Allow)
}

fn department_read(ctx: &AccessContext<'_>) -> Option<Decision> {
    (ctx.requested == PermissionLevel::Read).then_some(Decision::Allow)
}

fn department_write(ctx: &AccessContext<'_>) -> Option<Decision> {
    (ctx.requested == PermissionLevel::Write
        && ctx.user.role.capabilities().writes_department_files)
        .then_some(Decision::Allow)
}

fn deny_remaining(ctx: &AccessContext<'_>) -> Option<Decision> {
    let reason = if ctx.user.role == Role::Viewer && ctx.requested != PermissionLevel::Read {
        DenyReason::ViewerReadOnly
    } else {
        DenyReason::InsufficientPermission
    };
    Some(Decision::Deny(reason))
}

/// Name of the rule that decided, with its decision.
pub fn evaluate(ctx: &AccessContext<'_>) -> (&'static str, Decision) {
    RULES
        .iter()
        .find_map(|(name, rule)| rule(ctx).map(|decision| (*name, decision)))
        .unwrap_or(("deny-remaining", Decision::Deny(DenyReason::InsufficientPermission)))
}

/// Pure access decision for `user` on `file` at `requested`.
pub fn authorize(
    user: &User,
    file: &File,
    grant: Option<&FilePermission>,
    requested: PermissionLevel,
) -> Decision {
    evaluate(&AccessContext {
        user,
        file,
        grant,
        requested,
    })
    .1
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("file {0} not found")]
    NotFound(FileId),
    #[error("access denied: {0}")]
    Denied(DenyReason),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves access against stored files and grants.
#[derive(Clone)]
pub struct PermissionEngine {
    files: Arc<dyn FileStore>,
}

impl PermissionEngine {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self { files }
    }

    /// Load `file_id` and authorize `user` on it; returns the file on allow.
    pub async fn resolve(
        &self,
        user: &User,
        file_id: FileId,
        requested: PermissionLevel,
    ) -> Result<File, AccessError> {
        let file = self
            .files
            .get_file(file_id)
            .await?
            .ok_or(AccessError::NotFound(file_id))?;
        self.check(user, &file, requested).await?;
        Ok(file)
    }

    /// Authorize against an already loaded file.
    pub async fn check(
        &self,
        user: &User,
        file: &File,
        requested: PermissionLevel,
    ) -> Result<(), AccessError> {
        // Admins and creators are decided before the grant rule.
        let grant = if user.role.is_admin() || file.created_by == user.id {
            None
        } else {
            self.files.get_grant(file.id, user.id).await?
        };

        let (rule, decision) = evaluate(&AccessContext {
            user,
            file,
            grant: grant.as_ref(),
            requested,
        });
        match decision {
            Decision::Allow => {
                tracing::debug!(
                    "[Access] user {} allowed {} on file {} by {}",
                    user.id,
                    requested,
                    file.id,
                    rule
                );
                Ok(())
            }
            Decision::Deny(reason) => {
                tracing::warn!(
                    "[Access] user {} denied {} on file {}: {} ({})",
                    user.id,
                    requested,
                    file.id,
                    reason,
                    rule
                );
                Err(AccessError::Denied(reason))
            }
        }
    }

    /// Files the user can read, in store order.
    pub async fn readable_files(&self, user: &User) -> Result<Vec<File>, AccessError> {
        let files = self.files.list_files_for(user.id).await?;
        Ok(files
            .into_iter()
            .filter(|(file, grant)| {
                authorize(user, file, grant.as_ref(), PermissionLevel::Read).is_allowed()
            })
            .map(|(file, _)| file)
            .collect())
    }
}
