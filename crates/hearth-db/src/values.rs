//! Embedded value objects stored inside care plan and task instance rows.
//!
//! Goals, interventions, and task templates are owned by the plan
//! aggregate and stored as JSONB lists; evidence records are stored as
//! JSONB on the task instance. None of these are independently persisted
//! or versioned -- the owning row's `version` counter covers them.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TaskCategory;

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

/// Recurrence pattern of an intervention or task template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyPattern {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    /// Never auto-generated; occurrences require explicit manual creation.
    AsNeeded,
    Custom,
}

/// Day of the week, Monday-based and locale-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Weekday of a calendar date (Monday-based numeric mapping, no
    /// locale-sensitive names involved).
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday().num_days_from_monday() {
            0 => Self::Monday,
            1 => Self::Tuesday,
            2 => Self::Wednesday,
            3 => Self::Thursday,
            4 => Self::Friday,
            5 => Self::Saturday,
            _ => Self::Sunday,
        }
    }
}

/// How often a template should produce task instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub pattern: FrequencyPattern,
    /// Specific weekdays for weekly patterns. Empty means unconstrained.
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    /// Specific times of day an occurrence should be scheduled at.
    #[serde(default)]
    pub times_of_day: Vec<NaiveTime>,
}

impl Frequency {
    /// A frequency with just a pattern and no day/time constraints.
    pub fn of(pattern: FrequencyPattern) -> Self {
        Self {
            pattern,
            days_of_week: Vec::new(),
            times_of_day: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Plan items
// ---------------------------------------------------------------------------

/// Status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Achieved,
    Discontinued,
}

/// Lifecycle status shared by interventions and task templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Suspended,
    Discontinued,
}

/// A care goal. Linked intervention/task ids are informational; no
/// referential integrity is enforced on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub category: String,
    pub description: String,
    pub status: GoalStatus,
    #[serde(default)]
    pub target_value: Option<String>,
    #[serde(default)]
    pub current_value: Option<String>,
    #[serde(default)]
    pub intervention_ids: Vec<Uuid>,
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
}

/// A clinical intervention on the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: Uuid,
    pub category: TaskCategory,
    pub description: String,
    pub frequency: Frequency,
    /// Roles eligible to perform this intervention (e.g. "caregiver",
    /// "lpn", "rn").
    #[serde(default)]
    pub performer_roles: Vec<String>,
    #[serde(default)]
    pub requires_documentation: bool,
    pub status: ItemStatus,
}

/// Reusable task definition embedded in the plan. Generator input only;
/// generated instances carry their own snapshot of these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: TaskCategory,
    pub frequency: Frequency,
    #[serde(default)]
    pub require_signature: bool,
    #[serde(default)]
    pub require_note: bool,
    #[serde(default)]
    pub require_photo: bool,
    #[serde(default = "default_allow_skip")]
    pub allow_skip: bool,
    /// Suggested skip reasons, surfaced to UIs. Skips accept any
    /// non-empty free-text reason.
    #[serde(default)]
    pub skip_reasons: Vec<String>,
    /// Quality-check questions answered at completion.
    #[serde(default)]
    pub quality_checks: Vec<String>,
    /// Billable units one occurrence consumes. Zero means non-billable.
    #[serde(default)]
    pub service_units: i32,
    pub status: ItemStatus,
}

fn default_allow_skip() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Jurisdiction-specific regulatory attributes
// ---------------------------------------------------------------------------

/// How the plan's services are paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    Medicaid,
    Medicare,
    PrivatePay,
    LongTermCareInsurance,
}

/// An RN delegation record linking a nurse to a delegable intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnDelegation {
    pub intervention_id: Uuid,
    pub delegating_rn: String,
    pub delegated_on: NaiveDate,
}

/// Jurisdiction-specific plan attributes consumed by the compliance rule
/// engine. All fields are optional-with-defaults so plans in permissive
/// jurisdictions carry an empty block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatoryInfo {
    pub ordering_provider_name: Option<String>,
    pub ordering_provider_npi: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub verbal_order: bool,
    pub verbal_order_authenticated_at: Option<DateTime<Utc>>,
    pub funding_source: Option<FundingSource>,
    /// Reference to the payer's service authorization form.
    pub service_authorization_form: Option<String>,
    pub review_interval_days: Option<i32>,
    pub next_review_date: Option<NaiveDate>,
    pub disaster_plan_on_file: bool,
    /// Consumer-directed services option (client acts as employer).
    pub consumer_directed: bool,
    pub designated_employer: Option<String>,
    /// Financial management service provider reference.
    pub fms_provider: Option<String>,
    pub requires_skilled_care: bool,
    pub rn_supervisor_id: Option<Uuid>,
    pub last_supervisory_visit: Option<NaiveDate>,
    pub next_supervisory_visit: Option<NaiveDate>,
    pub rn_delegations: Vec<RnDelegation>,
    pub assessment_summary: Option<String>,
    pub plan_of_care_form: Option<String>,
    pub infection_control_reviewed: bool,
}

// ---------------------------------------------------------------------------
// Task evidence
// ---------------------------------------------------------------------------

/// A captured signature. `signed_at` is stamped with the completion
/// instant by the task service, not by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_name: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub signed_at: DateTime<Utc>,
}

/// A geolocation capture. `recorded_at` is stamped with the completion
/// instant by the task service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Vital signs captured during a visit. All fields optional; out-of-range
/// values produce advisory warnings and never block completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalSigns {
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub heart_rate: Option<i32>,
    pub spo2_percent: Option<f32>,
    pub temperature_f: Option<f32>,
}

/// Structured verification data attached to a completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationData {
    pub vitals: Option<VitalSigns>,
    pub location: Option<GeoPoint>,
    pub photo_refs: Vec<String>,
}

/// Evidence recorded when a task is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_at: DateTime<Utc>,
    pub completed_by: Uuid,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub verification: Option<VerificationData>,
}

/// Evidence recorded when a task is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub skipped_at: DateTime<Utc>,
    pub skipped_by: Uuid,
    pub reason: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Evidence recorded when a caregiver reports an issue on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub reported_at: DateTime<Utc>,
    pub reported_by: Uuid,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_of_week_from_date() {
        // 2025-06-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(DayOfWeek::from_date(monday), DayOfWeek::Monday);
        assert_eq!(
            DayOfWeek::from_date(monday + chrono::Days::new(5)),
            DayOfWeek::Saturday
        );
        assert_eq!(
            DayOfWeek::from_date(monday + chrono::Days::new(6)),
            DayOfWeek::Sunday
        );
    }

    #[test]
    fn frequency_serde_roundtrip() {
        let freq = Frequency {
            pattern: FrequencyPattern::Weekly,
            days_of_week: vec![DayOfWeek::Monday, DayOfWeek::Thursday],
            times_of_day: vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()],
        };
        let json = serde_json::to_string(&freq).expect("should serialize");
        let back: Frequency = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(freq, back);
    }

    #[test]
    fn frequency_pattern_snake_case() {
        let json = serde_json::to_string(&FrequencyPattern::AsNeeded).unwrap();
        assert_eq!(json, "\"as_needed\"");
        let json = serde_json::to_string(&FrequencyPattern::BiWeekly).unwrap();
        assert_eq!(json, "\"bi_weekly\"");
    }

    #[test]
    fn regulatory_info_defaults_from_empty_object() {
        let info: RegulatoryInfo = serde_json::from_str("{}").expect("should deserialize");
        assert_eq!(info, RegulatoryInfo::default());
        assert!(!info.consumer_directed);
        assert!(info.rn_delegations.is_empty());
    }

    #[test]
    fn template_defaults() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Morning bath",
            "category": "personal_care",
            "frequency": {"pattern": "daily"},
            "status": "active"
        });
        let tpl: TaskTemplate = serde_json::from_value(json).expect("should deserialize");
        assert!(tpl.allow_skip);
        assert!(!tpl.require_signature);
        assert_eq!(tpl.service_units, 0);
        assert!(tpl.skip_reasons.is_empty());
    }
}
