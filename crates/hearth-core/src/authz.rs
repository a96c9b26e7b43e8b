//! Caller identity and the injected permission capability.
//!
//! Permission keys are a closed enumeration per capability domain (plans,
//! tasks, authorizations) rather than ad hoc strings, so the permission
//! surface stays statically checkable. The actual decision -- role
//! lookup, delegation, whatever the host system does -- lives behind
//! [`PolicyProvider`].

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;

/// A capability the core consults before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    PlanRead,
    PlanWrite,
    PlanActivate,
    PlanDelete,
    /// Amend a plan that is already completed or discontinued.
    PlanAmendClosed,
    TaskRead,
    TaskWrite,
    TaskComplete,
    AuthorizationRead,
    AuthorizationDeduct,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlanRead => "plan.read",
            Self::PlanWrite => "plan.write",
            Self::PlanActivate => "plan.activate",
            Self::PlanDelete => "plan.delete",
            Self::PlanAmendClosed => "plan.amend_closed",
            Self::TaskRead => "task.read",
            Self::TaskWrite => "task.write",
            Self::TaskComplete => "task.complete",
            Self::AuthorizationRead => "authorization.read",
            Self::AuthorizationDeduct => "authorization.deduct",
        };
        f.write_str(s)
    }
}

/// Identity and organization of the caller, attached to every operation
/// for audit stamping and organization scoping.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
}

impl CallerContext {
    pub fn new(user_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            user_id,
            organization_id,
        }
    }
}

/// Injected permission-decision capability.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Whether the caller holds the given permission.
    async fn allows(&self, ctx: &CallerContext, permission: Permission) -> bool;
}

/// Check a permission, failing with [`CoreError::PermissionDenied`] on
/// denial.
pub async fn require(
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    permission: Permission,
) -> Result<(), CoreError> {
    if policy.allows(ctx, permission).await {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied { permission })
    }
}

/// Policy that grants everything. For tests and single-operator CLI use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PolicyProvider for AllowAll {
    async fn allows(&self, _ctx: &CallerContext, _permission: Permission) -> bool {
        true
    }
}

/// Policy backed by a fixed grant set.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    granted: HashSet<Permission>,
}

impl StaticPolicy {
    /// Build a policy granting exactly the given permissions.
    pub fn granting(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            granted: permissions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicy {
    async fn allows(&self, _ctx: &CallerContext, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CallerContext {
        CallerContext::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn allow_all_grants_everything() {
        assert!(AllowAll.allows(&ctx(), Permission::PlanDelete).await);
    }

    #[tokio::test]
    async fn static_policy_grants_only_listed() {
        let policy = StaticPolicy::granting([Permission::PlanRead, Permission::TaskRead]);
        let ctx = ctx();
        assert!(policy.allows(&ctx, Permission::PlanRead).await);
        assert!(!policy.allows(&ctx, Permission::PlanWrite).await);
    }

    #[tokio::test]
    async fn require_surfaces_permission_denied() {
        let policy = StaticPolicy::default();
        let err = require(&policy, &ctx(), Permission::PlanActivate)
            .await
            .expect_err("should be denied");
        match err {
            CoreError::PermissionDenied { permission } => {
                assert_eq!(permission, Permission::PlanActivate);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn permission_display_is_dotted() {
        assert_eq!(Permission::PlanAmendClosed.to_string(), "plan.amend_closed");
        assert_eq!(Permission::TaskComplete.to_string(), "task.complete");
    }
}
