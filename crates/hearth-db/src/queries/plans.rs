//! Database query functions for the `care_plans` table.
//!
//! Status transitions and content updates are conditional UPDATEs guarded
//! by the expected current status and `version`; a zero affected-row
//! count means the row is missing, deleted, or stale.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{CarePlan, PlanStatus, Priority};
use crate::values::{Goal, Intervention, RegulatoryInfo, TaskTemplate};

/// Input for inserting a new care plan.
#[derive(Debug, Clone)]
pub struct NewCarePlan {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub jurisdiction: String,
    pub coordinator_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub goals: Vec<Goal>,
    pub interventions: Vec<Intervention>,
    pub task_templates: Vec<TaskTemplate>,
    pub regulatory: RegulatoryInfo,
    pub created_by: Uuid,
}

/// Replacement content for an existing plan. The embedded lists are
/// replaced wholesale (see the aggregate note on [`CarePlan`]).
#[derive(Debug, Clone)]
pub struct PlanContent {
    pub title: String,
    pub priority: Priority,
    pub coordinator_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub goals: Vec<Goal>,
    pub interventions: Vec<Intervention>,
    pub task_templates: Vec<TaskTemplate>,
    pub regulatory: RegulatoryInfo,
}

/// Insert a new care plan row in `draft` status. Returns the inserted
/// plan with server-generated defaults (id, status, version, timestamps).
pub async fn insert_plan(pool: &PgPool, new: &NewCarePlan) -> Result<CarePlan> {
    let plan = sqlx::query_as::<_, CarePlan>(
        "INSERT INTO care_plans \
           (organization_id, client_id, title, priority, jurisdiction, coordinator_id, \
            effective_date, expiration_date, goals, interventions, task_templates, \
            regulatory, created_by, updated_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13) \
         RETURNING *",
    )
    .bind(new.organization_id)
    .bind(new.client_id)
    .bind(&new.title)
    .bind(new.priority)
    .bind(&new.jurisdiction)
    .bind(new.coordinator_id)
    .bind(new.effective_date)
    .bind(new.expiration_date)
    .bind(Json(&new.goals))
    .bind(Json(&new.interventions))
    .bind(Json(&new.task_templates))
    .bind(Json(&new.regulatory))
    .bind(new.created_by)
    .fetch_one(pool)
    .await
    .context("failed to insert care plan")?;

    Ok(plan)
}

/// Fetch a plan by ID. Soft-deleted plans are treated as absent.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<CarePlan>> {
    let plan = sqlx::query_as::<_, CarePlan>(
        "SELECT * FROM care_plans WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch care plan")?;

    Ok(plan)
}

/// List all plans for a client, newest first.
pub async fn list_plans_for_client(pool: &PgPool, client_id: Uuid) -> Result<Vec<CarePlan>> {
    let plans = sqlx::query_as::<_, CarePlan>(
        "SELECT * FROM care_plans \
         WHERE client_id = $1 AND deleted_at IS NULL \
         ORDER BY created_at DESC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans for client")?;

    Ok(plans)
}

/// List all plans for an organization, newest first.
pub async fn list_plans_for_organization(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<CarePlan>> {
    let plans = sqlx::query_as::<_, CarePlan>(
        "SELECT * FROM care_plans \
         WHERE organization_id = $1 AND deleted_at IS NULL \
         ORDER BY created_at DESC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans for organization")?;

    Ok(plans)
}

/// Fetch the client's currently active plan, if any.
pub async fn get_active_plan_for_client(
    pool: &PgPool,
    client_id: Uuid,
) -> Result<Option<CarePlan>> {
    let plan = sqlx::query_as::<_, CarePlan>(
        "SELECT * FROM care_plans \
         WHERE client_id = $1 AND status = 'active' AND deleted_at IS NULL",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch active plan for client")?;

    Ok(plan)
}

/// Replace a plan's content, conditioned on the expected `version`.
///
/// Bumps `version` and audit columns. Returns the affected-row count:
/// zero means the plan is missing, deleted, or the version is stale.
pub async fn update_plan_content(
    pool: &PgPool,
    id: Uuid,
    expected_version: i32,
    content: &PlanContent,
    updated_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans \
         SET title = $1, priority = $2, coordinator_id = $3, effective_date = $4, \
             expiration_date = $5, goals = $6, interventions = $7, task_templates = $8, \
             regulatory = $9, updated_by = $10, version = version + 1, updated_at = now() \
         WHERE id = $11 AND version = $12 AND deleted_at IS NULL",
    )
    .bind(&content.title)
    .bind(content.priority)
    .bind(content.coordinator_id)
    .bind(content.effective_date)
    .bind(content.expiration_date)
    .bind(Json(&content.goals))
    .bind(Json(&content.interventions))
    .bind(Json(&content.task_templates))
    .bind(Json(&content.regulatory))
    .bind(updated_by)
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to update care plan content")?;

    Ok(result.rows_affected())
}

/// Atomically transition a plan from one status to another, conditioned
/// on the expected current status and `version`.
pub async fn transition_plan_status(
    pool: &PgPool,
    id: Uuid,
    from: PlanStatus,
    to: PlanStatus,
    expected_version: i32,
    updated_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans \
         SET status = $1, updated_by = $2, version = version + 1, updated_at = now() \
         WHERE id = $3 AND status = $4 AND version = $5 AND deleted_at IS NULL",
    )
    .bind(to)
    .bind(updated_by)
    .bind(id)
    .bind(from)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to transition plan status")?;

    Ok(result.rows_affected())
}

/// Expire every *other* active plan of the same client, in preparation
/// for activating `new_plan_id`. Returns how many plans were expired.
pub async fn expire_active_plans_for_client(
    pool: &PgPool,
    client_id: Uuid,
    new_plan_id: Uuid,
    updated_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans \
         SET status = 'expired', updated_by = $1, version = version + 1, updated_at = now() \
         WHERE client_id = $2 AND id != $3 AND status = 'active' AND deleted_at IS NULL",
    )
    .bind(updated_by)
    .bind(client_id)
    .bind(new_plan_id)
    .execute(pool)
    .await
    .context("failed to expire active plans for client")?;

    Ok(result.rows_affected())
}

/// Activate a plan: single conditional write guarding the expected
/// version, an activatable current status, and the absence of any other
/// active plan for the client. The partial unique index
/// `one_active_plan_per_client` backs this up under concurrency.
pub async fn activate_plan(
    pool: &PgPool,
    id: Uuid,
    expected_version: i32,
    updated_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans p \
         SET status = 'active', compliance_status = 'compliant', \
             updated_by = $1, version = version + 1, updated_at = now() \
         WHERE p.id = $2 AND p.version = $3 AND p.deleted_at IS NULL \
           AND p.status IN ('draft', 'pending_approval', 'on_hold') \
           AND NOT EXISTS ( \
               SELECT 1 FROM care_plans o \
               WHERE o.client_id = p.client_id AND o.id != p.id \
                 AND o.status = 'active' AND o.deleted_at IS NULL \
           )",
    )
    .bind(updated_by)
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to activate plan")?;

    Ok(result.rows_affected())
}

/// Record the result of the most recent compliance evaluation.
pub async fn set_compliance_status(pool: &PgPool, id: Uuid, compliance: &str) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans SET compliance_status = $1, updated_at = now() \
         WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(compliance)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to set compliance status")?;

    Ok(result.rows_affected())
}

/// Soft-delete a plan. Active plans cannot be deleted; the WHERE clause
/// excludes them so the caller can disambiguate via the returned count.
pub async fn soft_delete_plan(
    pool: &PgPool,
    id: Uuid,
    expected_version: i32,
    updated_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE care_plans \
         SET deleted_at = now(), updated_by = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND version = $3 AND status != 'active' AND deleted_at IS NULL",
    )
    .bind(updated_by)
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to soft-delete plan")?;

    Ok(result.rows_affected())
}
