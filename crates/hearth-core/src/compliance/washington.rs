//! Washington rule set: RN-supervision oriented, derived from the
//! in-home services agency rules (WAC 246-335) and the nurse delegation
//! rules (WAC 246-840-910 through -970).

use chrono::NaiveDate;

use hearth_db::models::{CarePlan, PlanStatus, TaskCategory};
use hearth_db::values::ItemStatus;

use super::{Finding, Severity};

const MAX_REVIEW_INTERVAL_DAYS: i32 = 60;

/// Minimum character length for the client assessment summary.
const MIN_ASSESSMENT_LEN: usize = 80;

/// Intervention categories a caregiver may only perform under a nurse
/// delegation record.
fn is_delegable(category: TaskCategory) -> bool {
    matches!(
        category,
        TaskCategory::MedicationAdministration
            | TaskCategory::WoundCare
            | TaskCategory::VitalSignsMonitoring
    )
}

pub(super) fn evaluate(plan: &CarePlan, today: NaiveDate) -> Vec<Finding> {
    let mut findings = Vec::new();
    let reg = &plan.regulatory.0;

    if reg.ordering_provider_name.is_none() {
        findings.push(Finding::new(
            "WA_MISSING_PHYSICIAN_ORDER",
            "regulatory.ordering_provider_name",
            Severity::Blocking,
            "plan of care requires an ordering practitioner",
            "WAC 246-335-545",
        ));
    }

    // RN supervision.
    if reg.requires_skilled_care && reg.rn_supervisor_id.is_none() {
        findings.push(Finding::new(
            "WA_MISSING_RN_SUPERVISOR",
            "regulatory.rn_supervisor_id",
            Severity::Blocking,
            "skilled-care plans require an assigned RN supervisor",
            "WAC 246-335-545(4)",
        ));
    }
    if plan.status == PlanStatus::Active && reg.rn_supervisor_id.is_some() {
        if reg.last_supervisory_visit.is_none() {
            findings.push(Finding::new(
                "WA_NO_SUPERVISORY_VISIT_RECORDED",
                "regulatory.last_supervisory_visit",
                Severity::Warning,
                "no supervisory visit has been recorded for this plan",
                "WAC 246-335-545(4)",
            ));
        }
        match reg.next_supervisory_visit {
            None => findings.push(Finding::new(
                "WA_SUPERVISORY_VISIT_UNSCHEDULED",
                "regulatory.next_supervisory_visit",
                Severity::Warning,
                "no supervisory visit is scheduled",
                "WAC 246-335-545(4)",
            )),
            Some(next) if next < today => findings.push(Finding::new(
                "WA_SUPERVISORY_VISIT_OVERDUE",
                "regulatory.next_supervisory_visit",
                Severity::Critical,
                format!("supervisory visit was due {next} and has not been rescheduled"),
                "WAC 246-335-545(4)",
            )),
            Some(_) => {}
        }
    }

    // Nurse delegation for delegable intervention categories.
    for intervention in plan
        .interventions
        .0
        .iter()
        .filter(|i| i.status == ItemStatus::Active && is_delegable(i.category))
    {
        let delegated = reg
            .rn_delegations
            .iter()
            .any(|d| d.intervention_id == intervention.id);
        if !delegated {
            findings.push(Finding::new(
                "WA_MISSING_DELEGATION",
                "regulatory.rn_delegations",
                Severity::Blocking,
                format!(
                    "{} intervention {:?} requires a nurse delegation record",
                    intervention.category, intervention.id
                ),
                "WAC 246-840-910",
            ));
        }
    }

    if let Some(interval) = reg.review_interval_days {
        if interval > MAX_REVIEW_INTERVAL_DAYS {
            findings.push(Finding::new(
                "WA_REVIEW_INTERVAL_TOO_LONG",
                "regulatory.review_interval_days",
                Severity::Warning,
                format!(
                    "review interval of {interval} days exceeds the {MAX_REVIEW_INTERVAL_DAYS}-day maximum"
                ),
                "WAC 246-335-545(5)",
            ));
        }
    }

    // Assessment and plan content.
    let assessment_len = reg
        .assessment_summary
        .as_deref()
        .map(|s| s.trim().chars().count())
        .unwrap_or(0);
    if assessment_len < MIN_ASSESSMENT_LEN {
        findings.push(Finding::new(
            "WA_ASSESSMENT_TOO_SHORT",
            "regulatory.assessment_summary",
            Severity::Blocking,
            format!(
                "client assessment summary must be at least {MIN_ASSESSMENT_LEN} characters \
                 (currently {assessment_len})"
            ),
            "WAC 246-335-540",
        ));
    }
    if plan.goals.0.is_empty() {
        findings.push(Finding::new(
            "WA_MISSING_GOALS",
            "goals",
            Severity::Blocking,
            "plan of care must state at least one goal",
            "WAC 246-335-545",
        ));
    }
    if plan.interventions.0.is_empty() {
        findings.push(Finding::new(
            "WA_MISSING_INTERVENTIONS",
            "interventions",
            Severity::Blocking,
            "plan of care must state at least one intervention or service",
            "WAC 246-335-545",
        ));
    }
    if reg.plan_of_care_form.is_none() {
        findings.push(Finding::new(
            "WA_MISSING_POC_FORM",
            "regulatory.plan_of_care_form",
            Severity::Warning,
            "no plan-of-care form reference is on file",
            "WAC 246-335-545",
        ));
    }
    if !reg.infection_control_reviewed {
        findings.push(Finding::new(
            "WA_INFECTION_CONTROL_NOT_REVIEWED",
            "regulatory.infection_control_reviewed",
            Severity::Info,
            "infection control precautions have not been reviewed with the client",
            "WAC 246-335-560",
        ));
    }

    findings
}
