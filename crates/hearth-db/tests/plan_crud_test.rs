//! Integration tests for care plan persistence: CRUD, conditional status
//! transitions, the activation guard, and soft deletion.
//!
//! Each test creates a unique temporary database, runs migrations, and
//! drops it on completion so tests are fully isolated and idempotent.

use chrono::NaiveDate;
use uuid::Uuid;

use hearth_db::models::{PlanStatus, Priority};
use hearth_db::queries::plans::{self, NewCarePlan, PlanContent};
use hearth_db::values::{Goal, GoalStatus, RegulatoryInfo};

use hearth_test_utils::{create_test_db, drop_test_db};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

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

fn new_plan(client_id: Uuid) -> NewCarePlan {
    NewCarePlan {
        organization_id: Uuid::new_v4(),
        client_id,
        title: "Post-surgery home care".to_owned(),
        priority: Priority::Medium,
        jurisdiction: "TX".to_owned(),
        coordinator_id: Some(Uuid::new_v4()),
        effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        expiration_date: None,
        goals: vec![sample_goal()],
        interventions: Vec::new(),
        task_templates: Vec::new(),
        regulatory: RegulatoryInfo::default(),
        created_by: Uuid::new_v4(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insert_and_get_plan() {
    let (pool, db_name) = create_test_db().await;

    let client_id = Uuid::new_v4();
    let plan = plans::insert_plan(&pool, &new_plan(client_id))
        .await
        .expect("insert_plan should succeed");

    assert_eq!(plan.title, "Post-surgery home care");
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.version, 1);
    assert_eq!(plan.goals.0.len(), 1);
    assert!(plan.compliance_status.is_none());
    assert!(plan.deleted_at.is_none());

    let fetched = plans::get_plan(&pool, plan.id)
        .await
        .expect("get_plan should succeed")
        .expect("plan should exist");
    assert_eq!(fetched.id, plan.id);
    assert_eq!(fetched.client_id, client_id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_plan_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = plans::get_plan(&pool, Uuid::new_v4())
        .await
        .expect("get_plan should not error");
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn transition_bumps_version_and_guards_source_status() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, &new_plan(Uuid::new_v4()))
        .await
        .unwrap();
    let updated_by = Uuid::new_v4();

    let affected = plans::transition_plan_status(
        &pool,
        plan.id,
        PlanStatus::Draft,
        PlanStatus::PendingApproval,
        plan.version,
        updated_by,
    )
    .await
    .expect("transition should succeed");
    assert_eq!(affected, 1);

    let updated = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(updated.status, PlanStatus::PendingApproval);
    assert_eq!(updated.version, plan.version + 1);
    assert_eq!(updated.updated_by, updated_by);

    // Replaying the same transition misses: wrong source status and
    // stale version.
    let affected = plans::transition_plan_status(
        &pool,
        plan.id,
        PlanStatus::Draft,
        PlanStatus::PendingApproval,
        plan.version,
        updated_by,
    )
    .await
    .unwrap();
    assert_eq!(affected, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_plan_content_is_version_conditional() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, &new_plan(Uuid::new_v4()))
        .await
        .unwrap();

    let content = PlanContent {
        title: "Revised plan".to_owned(),
        priority: Priority::High,
        coordinator_id: plan.coordinator_id,
        effective_date: plan.effective_date,
        expiration_date: plan.expiration_date,
        goals: plan.goals.0.clone(),
        interventions: Vec::new(),
        task_templates: Vec::new(),
        regulatory: RegulatoryInfo::default(),
    };

    let affected = plans::update_plan_content(&pool, plan.id, plan.version, &content, plan.created_by)
        .await
        .expect("update should succeed");
    assert_eq!(affected, 1);

    // The same expected version no longer matches.
    let affected = plans::update_plan_content(&pool, plan.id, plan.version, &content, plan.created_by)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    let updated = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "Revised plan");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.version, plan.version + 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn activation_is_blocked_while_another_plan_is_active() {
    let (pool, db_name) = create_test_db().await;

    let client_id = Uuid::new_v4();
    let updated_by = Uuid::new_v4();
    let first = plans::insert_plan(&pool, &new_plan(client_id)).await.unwrap();
    let second = plans::insert_plan(&pool, &new_plan(client_id)).await.unwrap();

    let affected = plans::activate_plan(&pool, first.id, first.version, updated_by)
        .await
        .expect("first activation should succeed");
    assert_eq!(affected, 1);

    // The guarded UPDATE refuses while the first plan is still active.
    let affected = plans::activate_plan(&pool, second.id, second.version, updated_by)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    // After expiring the first plan, the second activates.
    let expired =
        plans::expire_active_plans_for_client(&pool, client_id, second.id, updated_by)
            .await
            .unwrap();
    assert_eq!(expired, 1);
    let affected = plans::activate_plan(&pool, second.id, second.version, updated_by)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let active = plans::get_active_plan_for_client(&pool, client_id)
        .await
        .unwrap()
        .expect("one plan should be active");
    assert_eq!(active.id, second.id);
    assert_eq!(active.compliance_status.as_deref(), Some("compliant"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn activation_rejects_closed_plans() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, &new_plan(Uuid::new_v4()))
        .await
        .unwrap();
    let updated_by = Uuid::new_v4();

    plans::transition_plan_status(
        &pool,
        plan.id,
        PlanStatus::Draft,
        PlanStatus::Discontinued,
        plan.version,
        updated_by,
    )
    .await
    .unwrap();

    let affected = plans::activate_plan(&pool, plan.id, plan.version + 1, updated_by)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn soft_delete_hides_plan_and_spares_active_ones() {
    let (pool, db_name) = create_test_db().await;

    let client_id = Uuid::new_v4();
    let updated_by = Uuid::new_v4();
    let active = plans::insert_plan(&pool, &new_plan(client_id)).await.unwrap();
    plans::activate_plan(&pool, active.id, active.version, updated_by)
        .await
        .unwrap();

    // Active plans cannot be deleted.
    let affected = plans::soft_delete_plan(&pool, active.id, active.version + 1, updated_by)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    let draft = plans::insert_plan(&pool, &new_plan(Uuid::new_v4()))
        .await
        .unwrap();
    let affected = plans::soft_delete_plan(&pool, draft.id, draft.version, updated_by)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    // The soft-deleted plan is invisible to reads.
    assert!(plans::get_plan(&pool, draft.id).await.unwrap().is_none());
    let listed = plans::list_plans_for_client(&pool, draft.client_id)
        .await
        .unwrap();
    assert!(listed.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn partial_unique_index_rejects_second_active_row() {
    let (pool, db_name) = create_test_db().await;

    let client_id = Uuid::new_v4();
    let first = plans::insert_plan(&pool, &new_plan(client_id)).await.unwrap();
    let second = plans::insert_plan(&pool, &new_plan(client_id)).await.unwrap();

    plans::activate_plan(&pool, first.id, first.version, Uuid::new_v4())
        .await
        .unwrap();

    // Bypass the guarded UPDATE; the index itself must refuse.
    let result = sqlx::query("UPDATE care_plans SET status = 'active' WHERE id = $1")
        .bind(second.id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "unique index should reject a second active plan");

    pool.close().await;
    drop_test_db(&db_name).await;
}
