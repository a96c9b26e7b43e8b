//! Error types shared across the domain core.

use thiserror::Error;
use uuid::Uuid;

use crate::authz::Permission;

/// Errors surfaced by core operations.
///
/// Three kinds recur: validation failures (caller-correctable, carrying
/// every violated rule), permission failures (never retried), and
/// missing entities (includes soft-deleted and cross-organization rows).
/// Stale writes and ledger failures get their own variants so callers
/// can react without string matching.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input or state violates a business rule. Lists every violated
    /// rule, not just the first.
    #[error("validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    /// The policy provider denied the capability.
    #[error("permission denied: {permission}")]
    PermissionDenied { permission: Permission },

    /// The referenced entity does not exist, is soft-deleted, or belongs
    /// to a different organization.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// A conditional write found the row changed since it was read.
    #[error("stale write: {entity} {id} changed since version {expected_version}")]
    StaleWrite {
        entity: &'static str,
        id: Uuid,
        expected_version: i32,
    },

    /// No authorization covers the requested service for this client.
    #[error("no authorization covers service code {service_code} for client {client_id}")]
    NoAuthorization {
        client_id: Uuid,
        service_code: String,
    },

    /// The authorization exists but its remaining balance is too small.
    #[error(
        "authorization {authorization_id} exhausted: requested {requested} units, {remaining} remaining"
    )]
    UnitsExhausted {
        authorization_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    /// Underlying persistence failure.
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

impl CoreError {
    /// A validation error with a single violated rule.
    pub fn invalid(rule: impl Into<String>) -> Self {
        Self::Validation {
            violations: vec![rule.into()],
        }
    }

    /// A validation error listing several violated rules.
    pub fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }
}
