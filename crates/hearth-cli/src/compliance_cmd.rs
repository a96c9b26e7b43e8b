//! `hearth compliance <plan>`: evaluate the jurisdiction rule set
//! against a plan and print the findings.

use anyhow::{Context, Result};
use sqlx::PgPool;

use hearth_core::authz::{AllowAll, CallerContext};
use hearth_core::compliance::Severity;
use hearth_core::plan::service as plans;

use crate::resolve;

/// Run the compliance evaluation and print a report.
///
/// A non-compliant plan is a normal outcome, not an error; the process
/// still exits 0 so scripted checks read the output or use `--json`.
pub async fn run_compliance(
    pool: &PgPool,
    ctx: &CallerContext,
    plan_input: &str,
    json: bool,
) -> Result<()> {
    let plan_id = resolve::resolve_plan_id(plan_input)?;
    let report = plans::check_compliance(pool, &AllowAll, ctx, plan_id).await?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .context("failed to serialize compliance report")?;
        println!("{out}");
        return Ok(());
    }

    if report.findings.is_empty() {
        println!("Plan {plan_id} is compliant; no findings.");
        return Ok(());
    }

    println!(
        "Plan {plan_id}: {} ({} finding(s))",
        if report.is_compliant {
            "compliant"
        } else {
            "NON-COMPLIANT"
        },
        report.findings.len(),
    );
    println!();

    // Worst first.
    let mut findings: Vec<_> = report.findings.iter().collect();
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));

    for finding in findings {
        println!(
            "  [{}] {}: {}",
            severity_str(finding.severity),
            finding.code,
            finding.message,
        );
        println!("           cite: {}", finding.requirement);
    }

    Ok(())
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
        Severity::Blocking => "BLOCKING",
    }
}
