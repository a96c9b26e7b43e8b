//! Service authorization ledger: maps billable task categories to service
//! codes and guards unit consumption against payer-authorized ceilings.
//!
//! Deduction is a single conditional UPDATE; it lands in full or not at
//! all, and a zero-row result is disambiguated into [`CoreError::NotFound`]
//! or [`CoreError::UnitsExhausted`] with a follow-up read.

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use hearth_db::models::{ServiceAuthorization, TaskCategory};
use hearth_db::queries::authorizations;

use crate::authz::{CallerContext, Permission, PolicyProvider, require};
use crate::error::CoreError;

/// Days before the end date at which an authorization is flagged
/// `expiring_soon`.
pub const EXPIRING_SOON_DAYS: i32 = 30;

/// Billing code for a task category. `None` means the category is not
/// billable and consumes no authorization units.
pub fn service_code_for(category: TaskCategory) -> Option<&'static str> {
    match category {
        TaskCategory::PersonalCare => Some("T1019"),
        TaskCategory::Homemaking => Some("S5130"),
        TaskCategory::MedicationAdministration => Some("T1502"),
        TaskCategory::WoundCare => Some("G0299"),
        TaskCategory::VitalSignsMonitoring => Some("G0300"),
        TaskCategory::SkilledNursing => Some("T1030"),
        TaskCategory::Mobility | TaskCategory::Nutrition | TaskCategory::Companionship => None,
    }
}

/// Find the authorization covering a service for a client on a date.
///
/// Prefers the soonest-expiring candidate so balances drain in expiry
/// order. No usable authorization is a hard failure, never a silent
/// zero-valued success.
pub async fn applicable_authorization(
    pool: &PgPool,
    client_id: Uuid,
    service_code: &str,
    on_date: NaiveDate,
) -> Result<ServiceAuthorization, CoreError> {
    authorizations::find_applicable(pool, client_id, service_code, on_date)
        .await?
        .ok_or_else(|| CoreError::NoAuthorization {
            client_id,
            service_code: service_code.to_owned(),
        })
}

/// Atomically deduct units from an authorization.
pub async fn deduct_units(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    authorization_id: Uuid,
    amount: i32,
) -> Result<ServiceAuthorization, CoreError> {
    require(policy, ctx, Permission::AuthorizationDeduct).await?;

    if amount <= 0 {
        return Err(CoreError::invalid("deduction amount must be positive"));
    }

    let affected = authorizations::deduct_units(pool, authorization_id, amount).await?;
    if affected == 0 {
        // The guarded UPDATE missed: either the row is gone or the
        // balance was too small at commit time.
        let current = authorizations::get_authorization(pool, authorization_id).await?;
        return match current {
            Some(auth) if auth.organization_id == ctx.organization_id => {
                Err(CoreError::UnitsExhausted {
                    authorization_id,
                    requested: amount,
                    remaining: auth.units_remaining,
                })
            }
            _ => Err(CoreError::NotFound {
                entity: "service authorization",
                id: authorization_id,
            }),
        };
    }

    tracing::info!(
        authorization_id = %authorization_id,
        amount = amount,
        "deducted authorization units"
    );

    let auth = authorizations::get_authorization(pool, authorization_id)
        .await?
        .context("authorization vanished after deduction")?;
    Ok(auth)
}

/// Recompute window-derived statuses for all authorizations.
pub async fn refresh_statuses(pool: &PgPool, today: NaiveDate) -> Result<u64, CoreError> {
    let updated =
        authorizations::refresh_window_statuses(pool, today, EXPIRING_SOON_DAYS).await?;
    if updated > 0 {
        tracing::info!(updated = updated, "refreshed authorization statuses");
    }
    Ok(updated)
}

/// Create a new authorization with the full balance remaining.
pub async fn create_authorization(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    new: authorizations::NewAuthorization,
) -> Result<ServiceAuthorization, CoreError> {
    require(policy, ctx, Permission::AuthorizationDeduct).await?;

    let mut violations = Vec::new();
    if new.authorized_units <= 0 {
        violations.push("authorized units must be positive".to_owned());
    }
    if new.ends_on < new.starts_on {
        violations.push("authorization end date precedes its start date".to_owned());
    }
    if !violations.is_empty() {
        return Err(CoreError::validation(violations));
    }

    let auth = authorizations::insert_authorization(pool, &new).await?;
    Ok(auth)
}

/// Fetch an authorization, scoped to the caller's organization.
pub async fn get_authorization(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<ServiceAuthorization, CoreError> {
    require(policy, ctx, Permission::AuthorizationRead).await?;

    authorizations::get_authorization(pool, id)
        .await?
        .filter(|a| a.organization_id == ctx.organization_id)
        .ok_or(CoreError::NotFound {
            entity: "service authorization",
            id,
        })
}

/// List a client's authorizations, soonest-expiring first.
pub async fn list_for_client(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    client_id: Uuid,
) -> Result<Vec<ServiceAuthorization>, CoreError> {
    require(policy, ctx, Permission::AuthorizationRead).await?;

    let auths = authorizations::list_authorizations_for_client(pool, client_id)
        .await?
        .into_iter()
        .filter(|a| a.organization_id == ctx.organization_id)
        .collect();
    Ok(auths)
}
