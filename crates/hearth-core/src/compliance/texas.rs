//! Texas rule set: physician-order oriented, derived from the licensing
//! requirements for home and community support services agencies
//! (26 TAC Chapter 558).

use hearth_db::models::CarePlan;
use hearth_db::values::FundingSource;

use super::{Finding, Severity};

/// Plans reviewed less often than this draw a warning.
const MAX_REVIEW_INTERVAL_DAYS: i32 = 60;

pub(super) fn evaluate(plan: &CarePlan) -> Vec<Finding> {
    let mut findings = Vec::new();
    let reg = &plan.regulatory.0;

    // Physician orders.
    match &reg.ordering_provider_name {
        None => findings.push(Finding::new(
            "TX_MISSING_PHYSICIAN_ORDER",
            "regulatory.ordering_provider_name",
            Severity::Blocking,
            "plan of care requires an ordering physician or practitioner",
            "26 TAC 558.283",
        )),
        Some(_) => {
            if reg.ordering_provider_npi.is_none() {
                findings.push(Finding::new(
                    "TX_MISSING_PROVIDER_NPI",
                    "regulatory.ordering_provider_npi",
                    Severity::Blocking,
                    "ordering provider must carry a license or NPI number",
                    "26 TAC 558.283",
                ));
            }
        }
    }
    if reg.order_date.is_none() {
        findings.push(Finding::new(
            "TX_MISSING_ORDER_DATE",
            "regulatory.order_date",
            Severity::Blocking,
            "physician order must be dated",
            "26 TAC 558.283",
        ));
    }
    if reg.verbal_order && reg.verbal_order_authenticated_at.is_none() {
        findings.push(Finding::new(
            "TX_VERBAL_ORDER_UNAUTHENTICATED",
            "regulatory.verbal_order_authenticated_at",
            Severity::Critical,
            "verbal order has not been authenticated by the ordering practitioner",
            "26 TAC 558.283(d)",
        ));
    }

    // Payer requirements.
    if reg.funding_source == Some(FundingSource::Medicaid)
        && reg.service_authorization_form.is_none()
    {
        findings.push(Finding::new(
            "TX_MISSING_AUTHORIZATION_FORM",
            "regulatory.service_authorization_form",
            Severity::Blocking,
            "Medicaid-funded plans require a service authorization form reference",
            "26 TAC 558.287",
        ));
    }

    // Review cadence.
    if let Some(interval) = reg.review_interval_days {
        if interval > MAX_REVIEW_INTERVAL_DAYS {
            findings.push(Finding::new(
                "TX_REVIEW_INTERVAL_TOO_LONG",
                "regulatory.review_interval_days",
                Severity::Warning,
                format!(
                    "review interval of {interval} days exceeds the {MAX_REVIEW_INTERVAL_DAYS}-day maximum"
                ),
                "26 TAC 558.284",
            ));
        }
    }
    if reg.next_review_date.is_none() {
        findings.push(Finding::new(
            "TX_MISSING_NEXT_REVIEW",
            "regulatory.next_review_date",
            Severity::Warning,
            "no next review date is scheduled",
            "26 TAC 558.284",
        ));
    }

    if !reg.disaster_plan_on_file {
        findings.push(Finding::new(
            "TX_MISSING_DISASTER_PLAN",
            "regulatory.disaster_plan_on_file",
            Severity::Warning,
            "no emergency preparedness and response plan is on file for the client",
            "26 TAC 558.256",
        ));
    }

    // Consumer-directed services option.
    if reg.consumer_directed {
        if reg.designated_employer.is_none() {
            findings.push(Finding::new(
                "TX_CDS_MISSING_EMPLOYER",
                "regulatory.designated_employer",
                Severity::Blocking,
                "consumer-directed plans require a designated employer",
                "40 TAC 41.213",
            ));
        }
        if reg.fms_provider.is_none() {
            findings.push(Finding::new(
                "TX_CDS_MISSING_FMS",
                "regulatory.fms_provider",
                Severity::Blocking,
                "consumer-directed plans require a financial management services provider",
                "40 TAC 41.303",
            ));
        }
    }

    // Plan content.
    if plan.goals.0.is_empty() {
        findings.push(Finding::new(
            "TX_MISSING_GOALS",
            "goals",
            Severity::Blocking,
            "plan of care must state at least one goal",
            "26 TAC 558.283",
        ));
    }
    if plan.interventions.0.is_empty() {
        findings.push(Finding::new(
            "TX_MISSING_INTERVENTIONS",
            "interventions",
            Severity::Blocking,
            "plan of care must state at least one intervention or service",
            "26 TAC 558.283",
        ));
    }

    findings
}
