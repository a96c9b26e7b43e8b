//! Care plan lifecycle operations.
//!
//! Every mutation loads the plan, checks the caller's permission and the
//! legal transitions, then issues a conditional write guarded by the
//! observed status and `version`. Activation is the heavy gate: readiness
//! and compliance failures are collected into a single validation error
//! listing every violation.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use hearth_db::models::{CarePlan, PlanStatus};
use hearth_db::queries::plans::{self, NewCarePlan, PlanContent};

use crate::authz::{CallerContext, Permission, PolicyProvider, require};
use crate::compliance::{self, ComplianceReport};
use crate::error::CoreError;
use crate::plan::parser::{self, PlanParseError};

/// Create a plan in `draft` status from typed input. The organization and
/// author are taken from the caller, not the input.
pub async fn create_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    mut new: NewCarePlan,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;

    let mut violations = Vec::new();
    if new.title.trim().is_empty() {
        violations.push("plan title must not be empty".to_owned());
    }
    if let Some(expiration) = new.expiration_date {
        if expiration <= new.effective_date {
            violations.push("expiration date must follow the effective date".to_owned());
        }
    }
    if !violations.is_empty() {
        return Err(CoreError::validation(violations));
    }

    new.organization_id = ctx.organization_id;
    new.created_by = ctx.user_id;
    let plan = plans::insert_plan(pool, &new).await?;
    tracing::info!(plan_id = %plan.id, client_id = %plan.client_id, "created care plan");
    Ok(plan)
}

/// Create a plan from a validated `plan.toml` definition.
pub async fn create_plan_from_toml(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    content: &str,
) -> Result<CarePlan, CoreError> {
    let parsed = parser::parse_plan_toml(content).map_err(parse_to_validation)?;
    let new = parser::to_new_plan(&parsed, ctx.organization_id, ctx.user_id)
        .map_err(parse_to_validation)?;
    create_plan(pool, policy, ctx, new).await
}

/// Fetch a plan, scoped to the caller's organization.
pub async fn get_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanRead).await?;
    fetch_plan_scoped(pool, ctx, id).await
}

/// List a client's plans, newest first.
pub async fn list_for_client(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    client_id: Uuid,
) -> Result<Vec<CarePlan>, CoreError> {
    require(policy, ctx, Permission::PlanRead).await?;
    let plans = plans::list_plans_for_client(pool, client_id)
        .await?
        .into_iter()
        .filter(|p| p.organization_id == ctx.organization_id)
        .collect();
    Ok(plans)
}

/// List every plan in the caller's organization, newest first.
pub async fn list_for_organization(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
) -> Result<Vec<CarePlan>, CoreError> {
    require(policy, ctx, Permission::PlanRead).await?;
    Ok(plans::list_plans_for_organization(pool, ctx.organization_id).await?)
}

/// Submit a draft plan for approval.
pub async fn submit_for_approval(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if plan.status != PlanStatus::Draft {
        return Err(CoreError::invalid(format!(
            "only draft plans can be submitted for approval (status is {})",
            plan.status
        )));
    }

    transition(
        pool,
        ctx,
        &plan,
        PlanStatus::Draft,
        PlanStatus::PendingApproval,
    )
    .await
}

/// Activate a plan.
///
/// Runs the readiness check and the jurisdiction compliance gate,
/// collecting every failure into one validation error. On success the
/// client's other active plan (if any) is expired first and the
/// activation itself is a single conditional write; the partial unique
/// index on active plans makes concurrent double-activation impossible.
pub async fn activate_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanActivate).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if !matches!(
        plan.status,
        PlanStatus::Draft | PlanStatus::PendingApproval | PlanStatus::OnHold
    ) {
        return Err(CoreError::invalid(format!(
            "a plan in status {} cannot be activated",
            plan.status
        )));
    }

    let today = Utc::now().date_naive();
    let mut violations = Vec::new();
    if plan.goals.0.is_empty() {
        violations.push("plan must have at least one goal".to_owned());
    }
    if plan.interventions.0.is_empty() {
        violations.push("plan must have at least one intervention".to_owned());
    }
    if plan.coordinator_id.is_none() {
        violations.push("plan must have an assigned coordinator".to_owned());
    }
    if plan.effective_date > today {
        violations.push("plan effective date is in the future".to_owned());
    }
    if let Some(expiration) = plan.expiration_date {
        if expiration <= today {
            violations.push("plan expiration date has already passed".to_owned());
        }
    }

    let report = compliance::evaluate_for_activation(&plan, today);
    for finding in report.with_severity(crate::compliance::Severity::Blocking) {
        violations.push(format!("{}: {}", finding.code, finding.message));
    }

    if !violations.is_empty() {
        plans::set_compliance_status(pool, id, "non_compliant").await?;
        return Err(CoreError::validation(violations));
    }

    let expired = plans::expire_active_plans_for_client(pool, plan.client_id, id, ctx.user_id)
        .await?;
    if expired > 0 {
        tracing::info!(
            client_id = %plan.client_id,
            expired = expired,
            "expired previously active plan"
        );
    }

    let affected = plans::activate_plan(pool, id, plan.version, ctx.user_id).await?;
    if affected == 0 {
        return Err(activation_failure(pool, id, plan.version).await);
    }

    tracing::info!(plan_id = %id, "activated care plan");
    fetch_plan_scoped(pool, ctx, id).await
}

/// Place an active plan on hold. Resuming goes back through
/// [`activate_plan`] and re-runs the full gate.
pub async fn place_on_hold(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if plan.status != PlanStatus::Active {
        return Err(CoreError::invalid(format!(
            "only active plans can be placed on hold (status is {})",
            plan.status
        )));
    }
    transition(pool, ctx, &plan, PlanStatus::Active, PlanStatus::OnHold).await
}

/// Discontinue a plan that is active or on hold.
pub async fn discontinue_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if !matches!(plan.status, PlanStatus::Active | PlanStatus::OnHold) {
        return Err(CoreError::invalid(format!(
            "a plan in status {} cannot be discontinued",
            plan.status
        )));
    }
    transition(pool, ctx, &plan, plan.status, PlanStatus::Discontinued).await
}

/// Complete an active plan (goals met, services concluded).
pub async fn complete_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if plan.status != PlanStatus::Active {
        return Err(CoreError::invalid(format!(
            "only active plans can be completed (status is {})",
            plan.status
        )));
    }
    transition(pool, ctx, &plan, PlanStatus::Active, PlanStatus::Completed).await
}

/// Replace a plan's content. Closed plans require the amendment
/// permission.
pub async fn update_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
    content: PlanContent,
) -> Result<CarePlan, CoreError> {
    require(policy, ctx, Permission::PlanWrite).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if plan.status.is_closed() {
        require(policy, ctx, Permission::PlanAmendClosed).await?;
    }

    let affected =
        plans::update_plan_content(pool, id, plan.version, &content, ctx.user_id).await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, plan.version).await);
    }
    fetch_plan_scoped(pool, ctx, id).await
}

/// Soft-delete a plan. Active plans must be discontinued or completed
/// first.
pub async fn delete_plan(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<(), CoreError> {
    require(policy, ctx, Permission::PlanDelete).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    if plan.status == PlanStatus::Active {
        return Err(CoreError::invalid("an active plan cannot be deleted"));
    }

    let affected = plans::soft_delete_plan(pool, id, plan.version, ctx.user_id).await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, id, plan.version).await);
    }
    tracing::info!(plan_id = %id, "soft-deleted care plan");
    Ok(())
}

/// Evaluate a plan's compliance and persist the summary status.
pub async fn check_compliance(
    pool: &PgPool,
    policy: &dyn PolicyProvider,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<ComplianceReport, CoreError> {
    require(policy, ctx, Permission::PlanRead).await?;
    let plan = fetch_plan_scoped(pool, ctx, id).await?;

    let report = compliance::evaluate(&plan, Utc::now().date_naive());
    let summary = if report.is_compliant {
        "compliant"
    } else {
        "non_compliant"
    };
    plans::set_compliance_status(pool, id, summary).await?;
    Ok(report)
}

/// Fetch a plan and hide rows outside the caller's organization behind
/// NotFound.
pub(crate) async fn fetch_plan_scoped(
    pool: &PgPool,
    ctx: &CallerContext,
    id: Uuid,
) -> Result<CarePlan, CoreError> {
    plans::get_plan(pool, id)
        .await?
        .filter(|p| p.organization_id == ctx.organization_id)
        .ok_or(CoreError::NotFound {
            entity: "care plan",
            id,
        })
}

async fn transition(
    pool: &PgPool,
    ctx: &CallerContext,
    plan: &CarePlan,
    from: PlanStatus,
    to: PlanStatus,
) -> Result<CarePlan, CoreError> {
    let affected =
        plans::transition_plan_status(pool, plan.id, from, to, plan.version, ctx.user_id).await?;
    if affected == 0 {
        return Err(stale_or_missing(pool, plan.id, plan.version).await);
    }
    tracing::info!(plan_id = %plan.id, from = %from, to = %to, "plan status changed");

    plans::get_plan(pool, plan.id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "care plan",
            id: plan.id,
        })
}

/// Disambiguate a zero-row conditional write on the plan row.
async fn stale_or_missing(pool: &PgPool, id: Uuid, expected_version: i32) -> CoreError {
    match plans::get_plan(pool, id).await {
        Ok(Some(_)) => CoreError::StaleWrite {
            entity: "care plan",
            id,
            expected_version,
        },
        Ok(None) => CoreError::NotFound {
            entity: "care plan",
            id,
        },
        Err(e) => CoreError::Db(e),
    }
}

/// Disambiguate a zero-row activation: missing row, stale version, or
/// another plan won the single-active race.
async fn activation_failure(pool: &PgPool, id: Uuid, expected_version: i32) -> CoreError {
    match plans::get_plan(pool, id).await {
        Ok(Some(current)) if current.version != expected_version => CoreError::StaleWrite {
            entity: "care plan",
            id,
            expected_version,
        },
        Ok(Some(current)) => {
            match plans::get_active_plan_for_client(pool, current.client_id).await {
                Ok(Some(other)) if other.id != id => CoreError::invalid(format!(
                    "client already has an active plan ({})",
                    other.id
                )),
                Ok(_) => CoreError::StaleWrite {
                    entity: "care plan",
                    id,
                    expected_version,
                },
                Err(e) => CoreError::Db(e),
            }
        }
        Ok(None) => CoreError::NotFound {
            entity: "care plan",
            id,
        },
        Err(e) => CoreError::Db(e),
    }
}

fn parse_to_validation(err: PlanParseError) -> CoreError {
    CoreError::invalid(err.to_string())
}
