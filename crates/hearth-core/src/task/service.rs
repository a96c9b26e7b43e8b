//! Task transition operations: guarded conditional writes over
//! `task_instances`, with unit deduction folded into the completion
//! transaction.

use anyhow::Context;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use hearth_db::models::{ServiceAuthorization, TaskInstance, TaskStatus};
use hearth_db::queries::tasks;
use hearth_db::values::{
    CompletionRecord, GeoPoint, IssueRecord, Signature, SkipRecord, VerificationData, VitalSigns,
};

use crate::authz::{CallerContext, Permission, PolicyProvider, require};
use crate::error::CoreError;
use crate::ledger;
use crate::task::vitals::vital_warnings;
use crate::task::{TaskStateMachine, completion_violations};

/// Signature captured by the caller; the timestamp is stamped server-side
/// at completion.
#[derive(Debug, Clone)]
pub struct SignatureInput {
    pub signer_name: String,
    pub image_ref: Option<String>,
}

/// Geolocation captured by the caller; the timestamp is stamped
/// server-side at completion.
#[derive(Debug, Clone)]
pub struct GeoInput {
    pub latitude: f64,
    pub longitude: f64,
}

/// Evidence submitted with a completion request.
#[derive(Debug, Clone, Default)]
pub struct CompleteTask {
    pub note: Option<String>,
    pub signature: Option<SignatureInput>,
    pub vitals: Option<VitalSigns>,
    pub location: Option<GeoInput>,
    pub photo_refs: Vec<String>,
}

/// Evidence submitted with a skip request.
#[derive(Debug, Clone)]
pub struct SkipTask {
    pub reason: String,
    pub note: Option<String>,
}

/// Fetch a task instance, scoped to the caller's organization.
pub async fn get_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskRead).await?;
    fetch_task_scoped(pool, ctx, id).await
}

/// List a plan's task instances, oldest first.
pub async fn list_for_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    plan_id: Uuid,
) -> Result<Vec<TaskInstance>, CoreError> {
    require(policy, ctx, Permission::TaskRead).await?;
    let instances = tasks::list_tasks_for_plan(pool, plan_id)
        .await?
        .into_iter()
        .filter(|t| t.organization_id == ctx.organization_id)
        .collect();
    Ok(instances)
}

/// List the task instances attached to a visit, in schedule order.
pub async fn list_for_visit(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    visit_id: Uuid,
) -> Result<Vec<TaskInstance>, CoreError> {
    require(policy, ctx, Permission::TaskRead).await?;
    let instances = tasks::list_tasks_for_visit(pool, visit_id)
        .await?
        .into_iter()
        .filter(|t| t.organization_id == ctx.organization_id)
        .collect();
    Ok(instances)
}

/// Begin work on a scheduled task.
pub async fn start_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_start(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot start a task in status {}",
            task.status
        )));
    }

    let affected = tasks::transition_task_status(
        pool,
        id,
        task.status,
        TaskStatus::InProgress,
        task.version,
    )
    .await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }
    fetch_task_scoped(pool, ctx, id).await
}

/// Complete a task, recording evidence and deducting authorization units
/// in the same transaction when the task is billable.
///
/// Requirement checks collect every unmet requirement before failing.
/// Out-of-range vitals only log warnings.
pub async fn complete_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
    input: CompleteTask,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskComplete).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_complete(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot complete a task in status {}",
            task.status
        )));
    }

    let violations = completion_violations(
        task.require_signature,
        task.require_note,
        input.signature.is_some(),
        input.note.as_deref(),
    );
    if !violations.is_empty() {
        return Err(CoreError::validation(violations));
    }

    if let Some(ref vitals) = input.vitals {
        for warning in vital_warnings(vitals) {
            tracing::warn!(task_id = %id, %warning, "vital signs out of range");
        }
    }

    // Signature and geolocation timestamps carry the completion instant,
    // not whatever the client device reported.
    let now = Utc::now();
    let verification = if input.vitals.is_some()
        || input.location.is_some()
        || !input.photo_refs.is_empty()
    {
        Some(VerificationData {
            vitals: input.vitals,
            location: input.location.map(|g| GeoPoint {
                latitude: g.latitude,
                longitude: g.longitude,
                recorded_at: now,
            }),
            photo_refs: input.photo_refs,
        })
    } else {
        None
    };
    let record = CompletionRecord {
        completed_at: now,
        completed_by: ctx.user_id,
        note: input.note,
        signature: input.signature.map(|s| Signature {
            signer_name: s.signer_name,
            image_ref: s.image_ref,
            signed_at: now,
        }),
        verification,
    };

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin completion transaction")?;

    let result = sqlx::query(
        "UPDATE task_instances \
         SET status = 'completed', completion = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND status = $3 AND version = $4",
    )
    .bind(Json(&record))
    .bind(id)
    .bind(task.status)
    .bind(task.version)
    .execute(&mut *tx)
    .await
    .context("failed to record task completion")?;
    if result.rows_affected() == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }

    // Billable tasks consume authorization units atomically with the
    // status flip: either both land or neither does.
    if task.service_units > 0 {
        if let Some(service_code) = ledger::service_code_for(task.category) {
            let auth = sqlx::query_as::<_, ServiceAuthorization>(
                "SELECT * FROM service_authorizations \
                 WHERE client_id = $1 AND service_code = $2 \
                   AND status IN ('active', 'expiring_soon') \
                   AND starts_on <= $3 AND ends_on >= $3 \
                   AND units_remaining > 0 \
                 ORDER BY ends_on ASC \
                 LIMIT 1",
            )
            .bind(task.client_id)
            .bind(service_code)
            .bind(task.scheduled_date)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to find applicable authorization")?
            .ok_or_else(|| CoreError::NoAuthorization {
                client_id: task.client_id,
                service_code: service_code.to_owned(),
            })?;

            let result = sqlx::query(
                "UPDATE service_authorizations \
                 SET units_used = units_used + $1, units_remaining = units_remaining - $1, \
                     version = version + 1, updated_at = now() \
                 WHERE id = $2 AND units_remaining >= $1",
            )
            .bind(task.service_units)
            .bind(auth.id)
            .execute(&mut *tx)
            .await
            .context("failed to deduct authorization units")?;
            if result.rows_affected() == 0 {
                return Err(CoreError::UnitsExhausted {
                    authorization_id: auth.id,
                    requested: task.service_units,
                    remaining: auth.units_remaining,
                });
            }

            tracing::info!(
                task_id = %id,
                authorization_id = %auth.id,
                service_code = service_code,
                units = task.service_units,
                "deducted authorization units for completed task"
            );
        }
    }

    tx.commit()
        .await
        .context("failed to commit completion transaction")?;

    tracing::info!(task_id = %id, "task completed");
    fetch_task_scoped(pool, ctx, id).await
}

/// Skip an open task with a free-text reason.
pub async fn skip_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
    input: SkipTask,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_skip(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot skip a task in status {}",
            task.status
        )));
    }
    if input.reason.trim().is_empty() {
        return Err(CoreError::invalid("a skip reason is required"));
    }

    let record = SkipRecord {
        skipped_at: Utc::now(),
        skipped_by: ctx.user_id,
        reason: input.reason,
        note: input.note,
    };
    let affected = tasks::record_skip(pool, id, task.status, task.version, &record).await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }
    fetch_task_scoped(pool, ctx, id).await
}

/// Report an issue on a task, moving it to `issue_reported`.
pub async fn report_issue(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
    description: String,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_report_issue(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot report an issue on a task in status {}",
            task.status
        )));
    }
    if description.trim().is_empty() {
        return Err(CoreError::invalid("an issue description is required"));
    }

    let record = IssueRecord {
        reported_at: Utc::now(),
        reported_by: ctx.user_id,
        description,
    };
    let affected = tasks::record_issue(pool, id, task.status, task.version, &record).await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }
    fetch_task_scoped(pool, ctx, id).await
}

/// Cancel an open task.
pub async fn cancel_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_cancel(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot cancel a task in status {}",
            task.status
        )));
    }

    let affected = tasks::transition_task_status(
        pool,
        id,
        task.status,
        TaskStatus::Cancelled,
        task.version,
    )
    .await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }
    fetch_task_scoped(pool, ctx, id).await
}

/// Mark a still-scheduled task missed. Intended for the end-of-day sweep
/// over past visit dates.
pub async fn mark_missed(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let task = fetch_task_scoped(pool, ctx, id).await?;

    if !TaskStateMachine::can_mark_missed(task.status) {
        return Err(CoreError::invalid(format!(
            "cannot mark a task in status {} as missed",
            task.status
        )));
    }

    let affected =
        tasks::transition_task_status(pool, id, task.status, TaskStatus::Missed, task.version)
            .await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, task.version).await);
    }
    fetch_task_scoped(pool, ctx, id).await
}

/// Fetch a task and hide rows outside the caller's organization behind
/// NotFound.
async fn fetch_task_scoped(
    pool: &PgPool,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<TaskInstance, CoreError> {
    tasks::get_task(pool, id)
        .await?
        .filter(|t| t.organization_id == ctx.organization_id)
        .ok_or(CoreError::NotFound {
            entity: "task instance",
            id,
        })
}

/// Disambiguate a zero-row conditional write: the row is either gone or
/// was changed concurrently.
async fn stale_or_missing(pool: &PgPool, id: Uuid, expected_version: i32) -> CoreError {
    match tasks::get_task(pool, id).await {
        Ok(Some(_)) => CoreError::StaleWrite {
            entity: "task instance",
            id,
            expected_version,
        },
        Ok(None) => CoreError::NotFound {
            entity: "task instance",
            id,
        },
        Err(e) => CoreError::Db(e),
    }
}
