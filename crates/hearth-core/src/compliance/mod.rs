//! Compliance rule engine: evaluates a care plan against the regulatory
//! rule set of its jurisdiction, producing typed findings with
//! severities.
//!
//! Findings are a non-exceptional return value -- a plan can be valid but
//! non-compliant, and the lifecycle controller decides what blocks
//! activation. The engine is a pure function of (plan, today); rule sets
//! are selected per jurisdiction so adding one is additive.

mod texas;
mod washington;

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use hearth_db::models::CarePlan;

/// Severity of a compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// Must be corrected promptly but does not block activation.
    Critical,
    /// Blocks plan activation.
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Blocking => "blocking",
        };
        f.write_str(s)
    }
}

/// One statement that a plan does or does not satisfy a named regulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Stable machine-readable code (e.g. `TX_MISSING_GOALS`).
    pub code: &'static str,
    /// The plan field the finding refers to.
    pub field: &'static str,
    pub message: String,
    /// Citation of the regulation behind the rule.
    pub requirement: &'static str,
    pub severity: Severity,
}

impl Finding {
    fn new(
        code: &'static str,
        field: &'static str,
        severity: Severity,
        message: impl Into<String>,
        requirement: &'static str,
    ) -> Self {
        Self {
            code,
            field,
            message: message.into(),
            requirement,
            severity,
        }
    }
}

/// Result of evaluating a plan. Findings are a flat list; callers filter
/// by severity themselves.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    /// True iff no finding has [`Severity::Blocking`].
    pub is_compliant: bool,
    pub findings: Vec<Finding>,
}

impl ComplianceReport {
    fn from_findings(findings: Vec<Finding>) -> Self {
        let is_compliant = !findings.iter().any(|f| f.severity == Severity::Blocking);
        Self {
            is_compliant,
            findings,
        }
    }

    /// Findings with the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Whether a finding with the given code is present.
    pub fn contains(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }
}

/// Regulatory regime a plan is evaluated against. Jurisdictions without a
/// modeled rule set evaluate permissively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jurisdiction {
    Texas,
    Washington,
    Other,
}

impl Jurisdiction {
    /// Map a state code (or full name) to a rule set.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "tx" | "texas" => Self::Texas,
            "wa" | "washington" => Self::Washington,
            _ => Self::Other,
        }
    }
}

/// Evaluate a plan against its jurisdiction's rule set.
pub fn evaluate(plan: &CarePlan, today: NaiveDate) -> ComplianceReport {
    let findings = match Jurisdiction::from_code(&plan.jurisdiction) {
        Jurisdiction::Texas => texas::evaluate(plan),
        Jurisdiction::Washington => washington::evaluate(plan, today),
        Jurisdiction::Other => Vec::new(),
    };
    ComplianceReport::from_findings(findings)
}

/// Evaluate a plan for activation: the jurisdiction rule set plus two
/// always-on checks that apply everywhere.
pub fn evaluate_for_activation(plan: &CarePlan, today: NaiveDate) -> ComplianceReport {
    let mut findings = evaluate(plan, today).findings;

    if plan.coordinator_id.is_none() {
        findings.push(Finding::new(
            "PLAN_MISSING_COORDINATOR",
            "coordinator_id",
            Severity::Blocking,
            "an assigned care coordinator is required before activation",
            "agency policy",
        ));
    }
    if plan.effective_date > today {
        findings.push(Finding::new(
            "PLAN_EFFECTIVE_DATE_FUTURE",
            "effective_date",
            Severity::Blocking,
            format!(
                "effective date {} is in the future; a plan cannot activate before it takes effect",
                plan.effective_date
            ),
            "agency policy",
        ));
    }

    ComplianceReport::from_findings(findings)
}

// ---------------------------------------------------------------------------
// Test helpers shared by the rule-set modules
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testing::{base_plan, today};
    use super::*;

    #[test]
    fn unknown_jurisdiction_is_permissive() {
        let plan = base_plan("MT");
        let report = evaluate(&plan, today());
        assert!(report.is_compliant);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn activation_check_requires_coordinator() {
        let mut plan = base_plan("MT");
        plan.coordinator_id = None;
        let report = evaluate_for_activation(&plan, today());
        assert!(!report.is_compliant);
        assert!(report.contains("PLAN_MISSING_COORDINATOR"));
    }

    #[test]
    fn activation_check_rejects_future_effective_date() {
        let mut plan = base_plan("MT");
        plan.effective_date = today() + chrono::Days::new(1);
        let report = evaluate_for_activation(&plan, today());
        assert!(!report.is_compliant);
        assert!(report.contains("PLAN_EFFECTIVE_DATE_FUTURE"));
    }

    #[test]
    fn activation_check_passes_on_ready_plan() {
        let report = evaluate_for_activation(&base_plan("MT"), today());
        assert!(report.is_compliant, "findings: {:?}", report.findings);
    }

    #[test]
    fn jurisdiction_from_code() {
        assert_eq!(Jurisdiction::from_code("TX"), Jurisdiction::Texas);
        assert_eq!(Jurisdiction::from_code("texas"), Jurisdiction::Texas);
        assert_eq!(Jurisdiction::from_code("wa"), Jurisdiction::Washington);
        assert_eq!(Jurisdiction::from_code("OR"), Jurisdiction::Other);
    }

    #[test]
    fn is_compliant_ignores_non_blocking_findings() {
        let findings = vec![
            Finding::new("X_WARN", "field", Severity::Warning, "warn", "cite"),
            Finding::new("X_CRIT", "field", Severity::Critical, "crit", "cite"),
        ];
        let report = ComplianceReport::from_findings(findings);
        assert!(report.is_compliant);
    }
}
