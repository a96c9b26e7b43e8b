//! Operator-mode CLI handlers for `hearth task` subcommands: per-visit
//! generation, manual creation, and the caregiver-facing transitions.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hearth_core::authz::{AllowAll, CallerContext};
use hearth_core::plan::{generate, service as plans};
use hearth_core::task::service::{self as tasks, CompleteTask, GeoInput, SignatureInput, SkipTask};
use hearth_db::models::TaskInstance;

use crate::TaskCommands;
use crate::resolve;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `TaskCommands` variant to the appropriate handler.
pub async fn run_task_command(
    command: TaskCommands,
    pool: &PgPool,
    ctx: &CallerContext,
) -> Result<()> {
    match command {
        TaskCommands::Generate { plan, visit, date } => {
            cmd_generate(pool, ctx, &plan, visit.as_deref(), date.as_deref()).await
        }
        TaskCommands::Add {
            plan,
            template,
            date,
            time,
            visit,
        } => {
            cmd_add(
                pool,
                ctx,
                &plan,
                &template,
                date.as_deref(),
                time.as_deref(),
                visit.as_deref(),
            )
            .await
        }
        TaskCommands::List { plan, visit } => {
            cmd_list(pool, ctx, plan.as_deref(), visit.as_deref()).await
        }
        TaskCommands::Show { task_id } => cmd_show(pool, ctx, &task_id).await,
        TaskCommands::Start { task_id } => {
            let id = parse_task_id(&task_id)?;
            let task = tasks::start_task(pool, &AllowAll, ctx, id).await?;
            println!("Task {} is now {}.", task.id, task.status);
            Ok(())
        }
        TaskCommands::Complete {
            task_id,
            note,
            signer,
            signature_ref,
            photo,
            latitude,
            longitude,
            systolic,
            diastolic,
            heart_rate,
            spo2,
            temperature,
        } => {
            let id = parse_task_id(&task_id)?;
            let signature = signer.map(|signer_name| SignatureInput {
                signer_name,
                image_ref: signature_ref,
            });
            let location = match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(GeoInput {
                    latitude,
                    longitude,
                }),
                (None, None) => None,
                _ => bail!("--latitude and --longitude must be given together"),
            };
            let vitals = if systolic.is_some()
                || diastolic.is_some()
                || heart_rate.is_some()
                || spo2.is_some()
                || temperature.is_some()
            {
                Some(hearth_db::values::VitalSigns {
                    systolic_bp: systolic,
                    diastolic_bp: diastolic,
                    heart_rate,
                    spo2_percent: spo2,
                    temperature_f: temperature,
                })
            } else {
                None
            };

            let input = CompleteTask {
                note,
                signature,
                vitals,
                location,
                photo_refs: photo,
            };
            let task = tasks::complete_task(pool, &AllowAll, ctx, id, input).await?;
            println!("Task {} completed.", task.id);
            Ok(())
        }
        TaskCommands::Skip {
            task_id,
            reason,
            note,
        } => {
            let id = parse_task_id(&task_id)?;
            let task = tasks::skip_task(pool, &AllowAll, ctx, id, SkipTask { reason, note }).await?;
            println!("Task {} skipped.", task.id);
            Ok(())
        }
        TaskCommands::Issue {
            task_id,
            description,
        } => {
            let id = parse_task_id(&task_id)?;
            let task = tasks::report_issue(pool, &AllowAll, ctx, id, description).await?;
            println!("Issue reported on task {}.", task.id);
            Ok(())
        }
        TaskCommands::Cancel { task_id } => {
            let id = parse_task_id(&task_id)?;
            let task = tasks::cancel_task(pool, &AllowAll, ctx, id).await?;
            println!("Task {} cancelled.", task.id);
            Ok(())
        }
        TaskCommands::Missed { task_id } => {
            let id = parse_task_id(&task_id)?;
            let task = tasks::mark_missed(pool, &AllowAll, ctx, id).await?;
            println!("Task {} marked missed.", task.id);
            Ok(())
        }
    }
}

fn parse_task_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("invalid task ID: {input:?}"))
}

fn parse_date(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD")),
        None => Ok(Utc::now().date_naive()),
    }
}

// -----------------------------------------------------------------------
// hearth task generate
// -----------------------------------------------------------------------

/// Project an active plan's templates into task instances for one visit.
async fn cmd_generate(
    pool: &PgPool,
    ctx: &CallerContext,
    plan_input: &str,
    visit: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let plan_id = resolve::resolve_plan_id(plan_input)?;
    let visit_id = match visit {
        Some(s) => Uuid::parse_str(s).with_context(|| format!("invalid visit ID: {s:?}"))?,
        None => Uuid::new_v4(),
    };
    let visit_date = parse_date(date)?;

    let created = generate::generate_visit_tasks(pool, &AllowAll, ctx, plan_id, visit_id, visit_date)
        .await?;

    let plan = plans::get_plan(pool, &AllowAll, ctx, plan_id).await?;
    let manual_only = plan
        .task_templates
        .0
        .iter()
        .filter(|t| !generate::is_auto_generated(t))
        .count();

    if created.is_empty() {
        println!("No tasks generated for {visit_date} (nothing fires, or already generated).");
    } else {
        println!(
            "Generated {} task(s) for visit {visit_id} on {visit_date}:",
            created.len()
        );
        println!();
        for task in &created {
            match task.scheduled_time {
                Some(time) => println!("  {}  {} at {}", task.id, task.name, time.format("%H:%M")),
                None => println!("  {}  {}", task.id, task.name),
            }
        }
    }

    if manual_only > 0 {
        println!();
        println!(
            "Note: {manual_only} as-needed template(s) never auto-generate; use `hearth task add`."
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// hearth task add
// -----------------------------------------------------------------------

/// Manually create one occurrence from a named template. This is the
/// only way as-needed templates produce instances.
async fn cmd_add(
    pool: &PgPool,
    ctx: &CallerContext,
    plan_input: &str,
    template_name: &str,
    date: Option<&str>,
    time: Option<&str>,
    visit: Option<&str>,
) -> Result<()> {
    let plan_id = resolve::resolve_plan_id(plan_input)?;
    let plan = plans::get_plan(pool, &AllowAll, ctx, plan_id).await?;

    let template = plan
        .task_templates
        .0
        .iter()
        .find(|t| t.name == template_name)
        .with_context(|| {
            format!("plan has no template named {template_name:?}")
        })?;

    let scheduled_date = parse_date(date)?;
    let scheduled_time = match time {
        Some(s) => Some(
            NaiveTime::parse_from_str(s, "%H:%M")
                .with_context(|| format!("invalid time {s:?}, expected HH:MM"))?,
        ),
        None => None,
    };
    let visit_id = match visit {
        Some(s) => Some(Uuid::parse_str(s).with_context(|| format!("invalid visit ID: {s:?}"))?),
        None => None,
    };

    let task = generate::create_manual_task(
        pool,
        &AllowAll,
        ctx,
        plan_id,
        template.id,
        visit_id,
        scheduled_date,
        scheduled_time,
    )
    .await?;

    println!("Task created.");
    println!();
    println!("  Task ID:   {}", task.id);
    println!("  Name:      {}", task.name);
    println!("  Scheduled: {}", task.scheduled_date);

    Ok(())
}

// -----------------------------------------------------------------------
// hearth task list
// -----------------------------------------------------------------------

/// List tasks for a plan or a visit.
async fn cmd_list(
    pool: &PgPool,
    ctx: &CallerContext,
    plan: Option<&str>,
    visit: Option<&str>,
) -> Result<()> {
    let listed = match (plan, visit) {
        (Some(plan_input), None) => {
            let plan_id = resolve::resolve_plan_id(plan_input)?;
            tasks::list_for_plan(pool, &AllowAll, ctx, plan_id).await?
        }
        (None, Some(visit_input)) => {
            let visit_id = Uuid::parse_str(visit_input)
                .with_context(|| format!("invalid visit ID: {visit_input:?}"))?;
            tasks::list_for_visit(pool, &AllowAll, ctx, visit_id).await?
        }
        _ => bail!("exactly one of --plan or --visit is required"),
    };

    if listed.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let id_w = 36;
    let name_w = listed.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    let status_w = 14;

    println!(
        "{:<id_w$}  {:<name_w$}  {:<status_w$}  SCHEDULED",
        "ID", "NAME", "STATUS",
    );
    for task in &listed {
        let when = match task.scheduled_time {
            Some(time) => format!("{} {}", task.scheduled_date, time.format("%H:%M")),
            None => task.scheduled_date.to_string(),
        };
        println!(
            "{:<id_w$}  {:<name_w$}  {:<status_w$}  {}",
            task.id, task.name, task.status, when,
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// hearth task show <task-id>
// -----------------------------------------------------------------------

/// Show one task instance with its recorded evidence.
async fn cmd_show(pool: &PgPool, ctx: &CallerContext, task_id: &str) -> Result<()> {
    let id = parse_task_id(task_id)?;
    let task = tasks::get_task(pool, &AllowAll, ctx, id).await?;

    print_task(&task);
    Ok(())
}

fn print_task(task: &TaskInstance) {
    println!("Task: {}", task.name);
    println!("  ID:        {}", task.id);
    println!("  Plan:      {}", task.plan_id);
    if let Some(visit_id) = task.visit_id {
        println!("  Visit:     {visit_id}");
    }
    println!("  Category:  {}", task.category);
    println!("  Status:    {}", task.status);
    match task.scheduled_time {
        Some(time) => println!("  Scheduled: {} {}", task.scheduled_date, time.format("%H:%M")),
        None => println!("  Scheduled: {}", task.scheduled_date),
    }
    if task.service_units > 0 {
        println!("  Units:     {}", task.service_units);
    }

    let mut requires = Vec::new();
    if task.require_signature {
        requires.push("signature");
    }
    if task.require_note {
        requires.push("note");
    }
    if task.require_photo {
        requires.push("photo");
    }
    if !requires.is_empty() {
        println!("  Requires:  {}", requires.join(", "));
    }

    if let Some(ref completion) = task.completion {
        println!();
        println!("Completed {} by {}", completion.0.completed_at, completion.0.completed_by);
        if let Some(ref note) = completion.0.note {
            println!("  Note: {note}");
        }
        if let Some(ref signature) = completion.0.signature {
            println!("  Signed by: {}", signature.signer_name);
        }
    }
    if let Some(ref skip) = task.skip {
        println!();
        println!("Skipped {} by {}", skip.0.skipped_at, skip.0.skipped_by);
        println!("  Reason: {}", skip.0.reason);
    }
    if let Some(ref issue) = task.issue {
        println!();
        println!("Issue reported {} by {}", issue.0.reported_at, issue.0.reported_by);
        println!("  {}", issue.0.description);
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_and_defaults_to_today() {
        let parsed = parse_date(Some("2025-06-03")).unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
        assert!(parse_date(Some("06/03/2025")).is_err());
        assert_eq!(parse_date(None).unwrap(), Utc::now().date_naive());
    }

    #[test]
    fn parse_task_id_rejects_garbage() {
        assert!(parse_task_id("not-a-uuid").is_err());
        assert!(parse_task_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }
}
