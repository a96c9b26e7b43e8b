//! Database query functions for the `service_authorizations` table.
//!
//! The deduction is the canonical conditional write of this codebase:
//! the UPDATE only lands when `units_remaining >= amount` at commit time,
//! regardless of what any earlier read observed.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ServiceAuthorization;

/// Input for inserting a new service authorization.
#[derive(Debug, Clone)]
pub struct NewAuthorization {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub payer: String,
    pub service_code: String,
    pub authorized_units: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

/// Insert a new authorization in `active` status with the full balance
/// remaining.
pub async fn insert_authorization(
    pool: &PgPool,
    new: &NewAuthorization,
) -> Result<ServiceAuthorization> {
    let auth = sqlx::query_as::<_, ServiceAuthorization>(
        "INSERT INTO service_authorizations \
           (organization_id, client_id, payer, service_code, authorized_units, \
            units_remaining, starts_on, ends_on, status) \
         VALUES ($1, $2, $3, $4, $5, $5, $6, $7, 'active') \
         RETURNING *",
    )
    .bind(new.organization_id)
    .bind(new.client_id)
    .bind(&new.payer)
    .bind(&new.service_code)
    .bind(new.authorized_units)
    .bind(new.starts_on)
    .bind(new.ends_on)
    .fetch_one(pool)
    .await
    .context("failed to insert service authorization")?;

    Ok(auth)
}

/// Fetch a single authorization by ID.
pub async fn get_authorization(pool: &PgPool, id: Uuid) -> Result<Option<ServiceAuthorization>> {
    let auth = sqlx::query_as::<_, ServiceAuthorization>(
        "SELECT * FROM service_authorizations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch service authorization")?;

    Ok(auth)
}

/// List all authorizations for a client, soonest-expiring first.
pub async fn list_authorizations_for_client(
    pool: &PgPool,
    client_id: Uuid,
) -> Result<Vec<ServiceAuthorization>> {
    let auths = sqlx::query_as::<_, ServiceAuthorization>(
        "SELECT * FROM service_authorizations \
         WHERE client_id = $1 \
         ORDER BY ends_on ASC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("failed to list authorizations for client")?;

    Ok(auths)
}

/// Find the authorization applicable to a service on a given date: same
/// client and service code, usable status, validity window covering the
/// date, non-zero remaining balance. Among candidates, the one expiring
/// soonest wins.
pub async fn find_applicable(
    pool: &PgPool,
    client_id: Uuid,
    service_code: &str,
    on_date: NaiveDate,
) -> Result<Option<ServiceAuthorization>> {
    let auth = sqlx::query_as::<_, ServiceAuthorization>(
        "SELECT * FROM service_authorizations \
         WHERE client_id = $1 AND service_code = $2 \
           AND status IN ('active', 'expiring_soon') \
           AND starts_on <= $3 AND ends_on >= $3 \
           AND units_remaining > 0 \
         ORDER BY ends_on ASC \
         LIMIT 1",
    )
    .bind(client_id)
    .bind(service_code)
    .bind(on_date)
    .fetch_optional(pool)
    .await
    .context("failed to find applicable authorization")?;

    Ok(auth)
}

/// Atomically deduct units from an authorization.
///
/// The WHERE clause guards `units_remaining >= amount`, so the deduction
/// either lands in full or not at all; the balance can never go
/// negative. Returns the affected-row count (zero means missing or
/// insufficient balance -- the caller disambiguates with a follow-up
/// read).
pub async fn deduct_units(pool: &PgPool, id: Uuid, amount: i32) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE service_authorizations \
         SET units_used = units_used + $1, units_remaining = units_remaining - $1, \
             version = version + 1, updated_at = now() \
         WHERE id = $2 AND units_remaining >= $1",
    )
    .bind(amount)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to deduct authorization units")?;

    Ok(result.rows_affected())
}

/// Recompute window-derived statuses: authorizations past their end date
/// become `expired`, those ending within `soon_days` become
/// `expiring_soon`. Suspended/terminated rows are left alone.
pub async fn refresh_window_statuses(
    pool: &PgPool,
    today: NaiveDate,
    soon_days: i32,
) -> Result<u64> {
    let expired = sqlx::query(
        "UPDATE service_authorizations \
         SET status = 'expired', version = version + 1, updated_at = now() \
         WHERE ends_on < $1 AND status IN ('pending', 'active', 'expiring_soon')",
    )
    .bind(today)
    .execute(pool)
    .await
    .context("failed to expire authorizations")?;

    let expiring = sqlx::query(
        "UPDATE service_authorizations \
         SET status = 'expiring_soon', version = version + 1, updated_at = now() \
         WHERE ends_on >= $1 AND ends_on <= $1 + $2 \
           AND status = 'active'",
    )
    .bind(today)
    .bind(soon_days)
    .execute(pool)
    .await
    .context("failed to mark authorizations expiring soon")?;

    Ok(expired.rows_affected() + expiring.rows_affected())
}
