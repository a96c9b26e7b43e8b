//! Integration tests for the care plan lifecycle: creation from TOML,
//! approval and activation gates, hold/resume, closure, and deletion.

use chrono::NaiveDate;
use uuid::Uuid;

use hearth_db::models::{PlanStatus, Priority, TaskCategory};
use hearth_db::queries::plans::NewCarePlan;
use hearth_db::values::{
    Frequency, FrequencyPattern, Goal, GoalStatus, Intervention, ItemStatus, RegulatoryInfo,
};

use hearth_core::authz::{AllowAll, CallerContext, Permission, StaticPolicy};
use hearth_core::error::CoreError;
use hearth_core::plan::service as plans;

use hearth_test_utils::{create_test_db, drop_test_db};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn ctx() -> CallerContext {
    CallerContext::new(Uuid::new_v4(), Uuid::new_v4())
}

fn sample_goal() -> Goal {
    Goal {
        id: Uuid::new_v4(),
        category: "mobility".to_owned(),
        description: "Walk unassisted".to_owned(),
        status: GoalStatus::NotStarted,
        target_value: None,
        current_value: None,
        intervention_ids: Vec::new(),
        task_ids: Vec::new(),
    }
}

fn sample_intervention() -> Intervention {
    Intervention {
        id: Uuid::new_v4(),
        category: TaskCategory::PersonalCare,
        description: "Assist with bathing".to_owned(),
        frequency: Frequency::of(FrequencyPattern::Daily),
        performer_roles: vec!["caregiver".to_owned()],
        requires_documentation: false,
        status: ItemStatus::Active,
    }
}

/// A plan in a permissive jurisdiction that passes the activation gate.
fn ready_plan(client_id: Uuid) -> NewCarePlan {
    NewCarePlan {
        organization_id: Uuid::new_v4(), // overridden by the service
        client_id,
        title: "Home care plan".to_owned(),
        priority: Priority::Medium,
        jurisdiction: "MT".to_owned(),
        coordinator_id: Some(Uuid::new_v4()),
        effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        expiration_date: None,
        goals: vec![sample_goal()],
        interventions: vec![sample_intervention()],
        task_templates: Vec::new(),
        regulatory: RegulatoryInfo::default(),
        created_by: Uuid::new_v4(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_plan_from_toml_returns_draft() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let toml = r#"
[plan]
title = "Post-surgery home care"
client_id = "a4c8a9e2-64b7-4c2e-9f3d-2b1f0a9d8c7e"
jurisdiction = "TX"
effective_date = "2025-01-01"

[[goals]]
category = "mobility"
description = "Walk unassisted"

[[interventions]]
category = "personal_care"
description = "Assist with bathing"
frequency = { pattern = "daily" }

[[templates]]
name = "morning-bath"
category = "personal_care"
frequency = { pattern = "daily" }
"#;
    let plan = plans::create_plan_from_toml(&pool, &AllowAll, &ctx, toml)
        .await
        .expect("creation should succeed");

    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.organization_id, ctx.organization_id);
    assert_eq!(plan.created_by, ctx.user_id);
    assert_eq!(plan.task_templates.0.len(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn invalid_toml_surfaces_as_validation_error() {
    let (pool, db_name) = create_test_db().await;

    let err = plans::create_plan_from_toml(&pool, &AllowAll, &ctx(), "not toml {{{")
        .await
        .expect_err("should fail");
    assert!(matches!(err, CoreError::Validation { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn submit_then_activate_flow() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();

    let pending = plans::submit_for_approval(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("submission should succeed");
    assert_eq!(pending.status, PlanStatus::PendingApproval);

    let active = plans::activate_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("activation should succeed");
    assert_eq!(active.status, PlanStatus::Active);
    assert_eq!(active.compliance_status.as_deref(), Some("compliant"));

    // Only drafts can be submitted.
    let err = plans::submit_for_approval(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect_err("re-submission should fail");
    assert!(matches!(err, CoreError::Validation { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn activation_collects_every_violation() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    // Texas jurisdiction, no coordinator, no goals, no interventions, no
    // physician order: one error listing all of it.
    let mut new = ready_plan(Uuid::new_v4());
    new.jurisdiction = "TX".to_owned();
    new.coordinator_id = None;
    new.goals.clear();
    new.interventions.clear();
    let plan = plans::create_plan(&pool, &AllowAll, &ctx, new).await.unwrap();

    let err = plans::activate_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect_err("activation should fail");
    match err {
        CoreError::Validation { violations } => {
            assert!(violations.len() >= 4, "violations: {violations:?}");
            assert!(violations.iter().any(|v| v.contains("coordinator")));
            assert!(violations.iter().any(|v| v.contains("goal")));
            assert!(violations.iter().any(|v| v.contains("TX_MISSING_PHYSICIAN_ORDER")));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failed gate records non-compliance.
    let current = plans::get_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();
    assert_eq!(current.status, PlanStatus::Draft);
    assert_eq!(current.compliance_status.as_deref(), Some("non_compliant"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn activating_a_newer_plan_expires_the_current_one() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();
    let client_id = Uuid::new_v4();

    let first = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(client_id))
        .await
        .unwrap();
    plans::activate_plan(&pool, &AllowAll, &ctx, first.id).await.unwrap();

    let second = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(client_id))
        .await
        .unwrap();
    let active = plans::activate_plan(&pool, &AllowAll, &ctx, second.id)
        .await
        .expect("second activation should succeed");
    assert_eq!(active.status, PlanStatus::Active);

    let first = plans::get_plan(&pool, &AllowAll, &ctx, first.id).await.unwrap();
    assert_eq!(first.status, PlanStatus::Expired);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn hold_resume_and_discontinue() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();
    plans::activate_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();

    let held = plans::place_on_hold(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("hold should succeed");
    assert_eq!(held.status, PlanStatus::OnHold);

    // Resuming goes back through the activation gate.
    let resumed = plans::activate_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("resume should succeed");
    assert_eq!(resumed.status, PlanStatus::Active);

    let done = plans::discontinue_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("discontinue should succeed");
    assert_eq!(done.status, PlanStatus::Discontinued);

    // Closed plans cannot be reactivated.
    let err = plans::activate_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect_err("reactivation should fail");
    assert!(matches!(err, CoreError::Validation { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn closed_plan_update_requires_amendment_permission() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();
    plans::activate_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();
    plans::complete_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();

    let current = plans::get_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();
    let content = hearth_db::queries::plans::PlanContent {
        title: "Amended".to_owned(),
        priority: current.priority,
        coordinator_id: current.coordinator_id,
        effective_date: current.effective_date,
        expiration_date: current.expiration_date,
        goals: current.goals.0.clone(),
        interventions: current.interventions.0.clone(),
        task_templates: current.task_templates.0.clone(),
        regulatory: current.regulatory.0.clone(),
    };

    // PlanWrite alone is not enough once the plan is closed.
    let writer = StaticPolicy::granting([Permission::PlanWrite, Permission::PlanRead]);
    let err = plans::update_plan(&pool, &writer, &ctx, plan.id, content.clone())
        .await
        .expect_err("should be denied");
    assert!(matches!(
        err,
        CoreError::PermissionDenied {
            permission: Permission::PlanAmendClosed
        }
    ));

    let amended = plans::update_plan(&pool, &AllowAll, &ctx, plan.id, content)
        .await
        .expect("amendment should succeed with the closed-plan permission");
    assert_eq!(amended.title, "Amended");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_rejects_active_plans() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();
    plans::activate_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();

    let err = plans::delete_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect_err("deleting an active plan should fail");
    assert!(matches!(err, CoreError::Validation { .. }));

    plans::discontinue_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();
    plans::delete_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("deletion should succeed once closed");

    let err = plans::get_plan(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect_err("deleted plan should be gone");
    assert!(matches!(err, CoreError::NotFound { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn cross_organization_reads_surface_not_found() {
    let (pool, db_name) = create_test_db().await;
    let ctx_a = ctx();
    let ctx_b = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx_a, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();

    let err = plans::get_plan(&pool, &AllowAll, &ctx_b, plan.id)
        .await
        .expect_err("foreign organization should not see the plan");
    assert!(matches!(err, CoreError::NotFound { .. }));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn operations_require_their_permission() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let plan = plans::create_plan(&pool, &AllowAll, &ctx, ready_plan(Uuid::new_v4()))
        .await
        .unwrap();

    let no_activate = StaticPolicy::granting([Permission::PlanRead, Permission::PlanWrite]);
    let err = plans::activate_plan(&pool, &no_activate, &ctx, plan.id)
        .await
        .expect_err("activation should be denied");
    assert!(matches!(
        err,
        CoreError::PermissionDenied {
            permission: Permission::PlanActivate
        }
    ));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn compliance_check_persists_summary() {
    let (pool, db_name) = create_test_db().await;
    let ctx = ctx();

    let mut new = ready_plan(Uuid::new_v4());
    new.jurisdiction = "TX".to_owned();
    let plan = plans::create_plan(&pool, &AllowAll, &ctx, new).await.unwrap();

    let report = plans::check_compliance(&pool, &AllowAll, &ctx, plan.id)
        .await
        .expect("check should run");
    assert!(!report.is_compliant);
    assert!(report.contains("TX_MISSING_PHYSICIAN_ORDER"));

    let current = plans::get_plan(&pool, &AllowAll, &ctx, plan.id).await.unwrap();
    assert_eq!(current.compliance_status.as_deref(), Some("non_compliant"));

    pool.close().await;
    drop_test_db(&db_name).await;
}
