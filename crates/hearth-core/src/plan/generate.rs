//! Per-visit task generation: projects a plan's active templates onto a
//! visit date.
//!
//! Generation is idempotent per (visit, template): re-running it for the
//! same visit never duplicates instances. Template flags are snapshotted
//! onto each instance so later template edits leave history untouched.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use hearth_db::models::{PlanStatus, TaskInstance};
use hearth_db::queries::tasks::{self, NewTaskInstance};
use hearth_db::values::{FrequencyPattern, ItemStatus, TaskTemplate};

use crate::authz::{CallerContext, Permission, PolicyProvider, require};
use crate::error::CoreError;
use crate::plan::service::fetch_plan_scoped;
use crate::recurrence::fires_on;

/// Generate scheduled task instances for a visit.
///
/// Every active template whose frequency fires on the visit date yields
/// one instance per listed time of day (or a single untimed instance).
/// Templates that already have instances on this visit are left alone.
pub async fn generate_visit_tasks(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    plan_id: Uuid,
    visit_id: Uuid,
    visit_date: NaiveDate,
) -> Result<Vec<TaskInstance>, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, plan_id).await?;

    if plan.status != PlanStatus::Active {
        return Err(CoreError::invalid(format!(
            "tasks can only be generated for an active plan (status is {})",
            plan.status
        )));
    }

    let mut created = Vec::new();
    for template in plan
        .task_templates
        .0
        .iter()
        .filter(|t| t.status == ItemStatus::Active)
    {
        if !fires_on(&template.frequency, visit_date) {
            continue;
        }
        let existing =
            tasks::count_instances_for_template_on_visit(pool, visit_id, template.id).await?;
        if existing > 0 {
            continue;
        }

        if template.frequency.times_of_day.is_empty() {
            let new =
                new_instance(&plan, template, Some(visit_id), visit_date, None, ctx.user_id);
            created.push(tasks::insert_task(pool, &new).await?);
        } else {
            for time in &template.frequency.times_of_day {
                let new = new_instance(
                    &plan,
                    template,
                    Some(visit_id),
                    visit_date,
                    Some(*time),
                    ctx.user_id,
                );
                created.push(tasks::insert_task(pool, &new).await?);
            }
        }
    }

    tracing::info!(
        plan_id = %plan_id,
        visit_id = %visit_id,
        visit_date = %visit_date,
        created = created.len(),
        "generated visit tasks"
    );
    Ok(created)
}

/// Create a single task instance from a template on demand. This is the
/// creation path for `as_needed` templates, which never auto-generate.
pub async fn create_manual_task(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    plan_id: Uuid,
    template_id: Uuid,
    visit_id: Option<Uuid>,
    scheduled_date: NaiveDate,
    scheduled_time: Option<chrono::NaiveTime>,
) -> Result<TaskInstance, CoreError> {
    require(policy, ctx, Permission::TaskWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, plan_id).await?;

    if plan.status != PlanStatus::Active {
        return Err(CoreError::invalid(format!(
            "tasks can only be created on an active plan (status is {})",
            plan.status
        )));
    }

    let template = plan
        .task_templates
        .0
        .iter()
        .find(|t| t.id == template_id)
        .ok_or(CoreError::NotFound {
            entity: "task template",
            id: template_id,
        })?;
    if template.status != ItemStatus::Active {
        return Err(CoreError::invalid(format!(
            "template {:?} is not active",
            template.name
        )));
    }

    let new = new_instance(
        &plan,
        template,
        visit_id,
        scheduled_date,
        scheduled_time,
        ctx.user_id,
    );
    let task = tasks::insert_task(pool, &new).await?;
    tracing::info!(task_id = %task.id, plan_id = %plan_id, "created manual task");
    Ok(task)
}

fn new_instance(
    plan: &hearth_db::models::CarePlan,
    template: &TaskTemplate,
    visit_id: Option<Uuid>,
    scheduled_date: NaiveDate,
    scheduled_time: Option<chrono::NaiveTime>,
    created_by: Uuid,
) -> NewTaskInstance {
    NewTaskInstance {
        plan_id: plan.id,
        template_id: Some(template.id),
        visit_id,
        client_id: plan.client_id,
        organization_id: plan.organization_id,
        name: template.name.clone(),
        category: template.category,
        scheduled_date,
        scheduled_time,
        require_signature: template.require_signature,
        require_note: template.require_note,
        require_photo: template.require_photo,
        allow_skip: template.allow_skip,
        service_units: template.service_units,
        created_by,
    }
}

/// Whether a template could ever be auto-generated. Used by callers that
/// want to warn about `as_needed` templates in generation contexts.
pub fn is_auto_generated(template: &TaskTemplate) -> bool {
    template.frequency.pattern != FrequencyPattern::AsNeeded
}
