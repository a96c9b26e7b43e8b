//! Database query functions for the `task_instances` table.
//!
//! Evidence-recording writes (complete/skip/issue) are conditional on the
//! observed status and `version`; the task service decides which source
//! states are legal before issuing them.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{TaskCategory, TaskInstance, TaskStatus};
use crate::values::{IssueRecord, SkipRecord};

/// Input for inserting a new task instance. Template flags arrive here as
/// an already-taken snapshot.
#[derive(Debug, Clone)]
pub struct NewTaskInstance {
    pub plan_id: Uuid,
    pub template_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub client_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub category: TaskCategory,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub require_signature: bool,
    pub require_note: bool,
    pub require_photo: bool,
    pub allow_skip: bool,
    pub service_units: i32,
    pub created_by: Uuid,
}

/// Insert a new task instance in `scheduled` status. Returns the inserted
/// row with server-generated defaults.
pub async fn insert_task(pool: &PgPool, new: &NewTaskInstance) -> Result<TaskInstance> {
    let task = sqlx::query_as::<_, TaskInstance>(
        "INSERT INTO task_instances \
           (plan_id, template_id, visit_id, client_id, organization_id, name, category, \
            scheduled_date, scheduled_time, require_signature, require_note, require_photo, \
            allow_skip, service_units, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING *",
    )
    .bind(new.plan_id)
    .bind(new.template_id)
    .bind(new.visit_id)
    .bind(new.client_id)
    .bind(new.organization_id)
    .bind(&new.name)
    .bind(new.category)
    .bind(new.scheduled_date)
    .bind(new.scheduled_time)
    .bind(new.require_signature)
    .bind(new.require_note)
    .bind(new.require_photo)
    .bind(new.allow_skip)
    .bind(new.service_units)
    .bind(new.created_by)
    .fetch_one(pool)
    .await
    .context("failed to insert task instance")?;

    Ok(task)
}

/// Fetch a single task instance by ID.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<TaskInstance>> {
    let task = sqlx::query_as::<_, TaskInstance>("SELECT * FROM task_instances WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task instance")?;

    Ok(task)
}

/// List all task instances for a plan, oldest first.
pub async fn list_tasks_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Vec<TaskInstance>> {
    let tasks = sqlx::query_as::<_, TaskInstance>(
        "SELECT * FROM task_instances WHERE plan_id = $1 ORDER BY created_at ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for plan")?;

    Ok(tasks)
}

/// List all task instances attached to a visit.
pub async fn list_tasks_for_visit(pool: &PgPool, visit_id: Uuid) -> Result<Vec<TaskInstance>> {
    let tasks = sqlx::query_as::<_, TaskInstance>(
        "SELECT * FROM task_instances \
         WHERE visit_id = $1 \
         ORDER BY scheduled_time ASC NULLS LAST, created_at ASC",
    )
    .bind(visit_id)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for visit")?;

    Ok(tasks)
}

/// Count instances generated for a given template on a given visit.
/// Used to keep visit generation idempotent.
pub async fn count_instances_for_template_on_visit(
    pool: &PgPool,
    visit_id: Uuid,
    template_id: Uuid,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM task_instances WHERE visit_id = $1 AND template_id = $2",
    )
    .bind(visit_id)
    .bind(template_id)
    .fetch_one(pool)
    .await
    .context("failed to count instances for template on visit")?;

    Ok(row.0)
}

/// Atomically transition a task instance from one status to another,
/// conditioned on the expected current status and `version`. Used for
/// the evidence-free transitions (start, cancel, missed).
pub async fn transition_task_status(
    pool: &PgPool,
    id: Uuid,
    from: TaskStatus,
    to: TaskStatus,
    expected_version: i32,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE task_instances \
         SET status = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND status = $3 AND version = $4",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to transition task status")?;

    Ok(result.rows_affected())
}

/// Record a skip: status flips to `skipped` and the evidence record is
/// stored, conditioned on the observed status and `version`.
pub async fn record_skip(
    pool: &PgPool,
    id: Uuid,
    from: TaskStatus,
    expected_version: i32,
    record: &SkipRecord,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE task_instances \
         SET status = 'skipped', skip = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND status = $3 AND version = $4",
    )
    .bind(Json(record))
    .bind(id)
    .bind(from)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to record task skip")?;

    Ok(result.rows_affected())
}

/// Record an issue report: status flips to `issue_reported` and the
/// evidence record is stored, conditioned on status and `version`.
pub async fn record_issue(
    pool: &PgPool,
    id: Uuid,
    from: TaskStatus,
    expected_version: i32,
    record: &IssueRecord,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE task_instances \
         SET status = 'issue_reported', issue = $1, version = version + 1, updated_at = now() \
         WHERE id = $2 AND status = $3 AND version = $4",
    )
    .bind(Json(record))
    .bind(id)
    .bind(from)
    .bind(expected_version)
    .execute(pool)
    .await
    .context("failed to record task issue")?;

    Ok(result.rows_affected())
}
