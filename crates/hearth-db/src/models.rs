use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::values::{
    CompletionRecord, Goal, Intervention, IssueRecord, RegulatoryInfo, SkipRecord, TaskTemplate,
};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a care plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    PendingApproval,
    Active,
    OnHold,
    Expired,
    Discontinued,
    Completed,
}

impl PlanStatus {
    /// Whether the plan is closed to ordinary edits.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Discontinued)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Expired => "expired",
            Self::Discontinued => "discontinued",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending_approval" => Ok(Self::PendingApproval),
            "active" => Ok(Self::Active),
            "on_hold" => Ok(Self::OnHold),
            "expired" => Ok(Self::Expired),
            "discontinued" => Ok(Self::Discontinued),
            "completed" => Ok(Self::Completed),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------

/// Status of a task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Completed,
    Skipped,
    Missed,
    Cancelled,
    IssueReported,
}

impl TaskStatus {
    /// Terminal states: no further caregiver action is expected.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped | Self::Missed | Self::Cancelled | Self::IssueReported
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Missed => "missed",
            Self::Cancelled => "cancelled",
            Self::IssueReported => "issue_reported",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "missed" => Ok(Self::Missed),
            "cancelled" => Ok(Self::Cancelled),
            "issue_reported" => Ok(Self::IssueReported),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Priority of a care plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(PriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone)]
pub struct PriorityParseError(pub String);

impl fmt::Display for PriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid priority: {:?}", self.0)
    }
}

impl std::error::Error for PriorityParseError {}

// ---------------------------------------------------------------------------

/// Category of an intervention or task -- determines the billable service
/// code and, in delegation jurisdictions, whether RN delegation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    PersonalCare,
    MedicationAdministration,
    WoundCare,
    VitalSignsMonitoring,
    Mobility,
    Nutrition,
    Homemaking,
    Companionship,
    SkilledNursing,
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PersonalCare => "personal_care",
            Self::MedicationAdministration => "medication_administration",
            Self::WoundCare => "wound_care",
            Self::VitalSignsMonitoring => "vital_signs_monitoring",
            Self::Mobility => "mobility",
            Self::Nutrition => "nutrition",
            Self::Homemaking => "homemaking",
            Self::Companionship => "companionship",
            Self::SkilledNursing => "skilled_nursing",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskCategory {
    type Err = TaskCategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal_care" => Ok(Self::PersonalCare),
            "medication_administration" => Ok(Self::MedicationAdministration),
            "wound_care" => Ok(Self::WoundCare),
            "vital_signs_monitoring" => Ok(Self::VitalSignsMonitoring),
            "mobility" => Ok(Self::Mobility),
            "nutrition" => Ok(Self::Nutrition),
            "homemaking" => Ok(Self::Homemaking),
            "companionship" => Ok(Self::Companionship),
            "skilled_nursing" => Ok(Self::SkilledNursing),
            other => Err(TaskCategoryParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskCategory`] string.
#[derive(Debug, Clone)]
pub struct TaskCategoryParseError(pub String);

impl fmt::Display for TaskCategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task category: {:?}", self.0)
    }
}

impl std::error::Error for TaskCategoryParseError {}

// ---------------------------------------------------------------------------

/// Status of a payer service authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Pending,
    Active,
    ExpiringSoon,
    Expired,
    Suspended,
    Terminated,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

impl FromStr for AuthorizationStatus {
    type Err = AuthorizationStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expiring_soon" => Ok(Self::ExpiringSoon),
            "expired" => Ok(Self::Expired),
            "suspended" => Ok(Self::Suspended),
            "terminated" => Ok(Self::Terminated),
            other => Err(AuthorizationStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AuthorizationStatus`] string.
#[derive(Debug, Clone)]
pub struct AuthorizationStatusParseError(pub String);

impl fmt::Display for AuthorizationStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid authorization status: {:?}", self.0)
    }
}

impl std::error::Error for AuthorizationStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A care plan -- the aggregate document governing a client's care.
///
/// Goals, interventions, and task templates are embedded value-object
/// lists (JSONB columns), replaced wholesale on update together with a
/// version bump. They are not separately persisted entities.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CarePlan {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub status: PlanStatus,
    pub priority: Priority,
    /// Two-letter state code selecting the regulatory rule set.
    pub jurisdiction: String,
    pub coordinator_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub goals: Json<Vec<Goal>>,
    pub interventions: Json<Vec<Intervention>>,
    pub task_templates: Json<Vec<TaskTemplate>>,
    pub regulatory: Json<RegulatoryInfo>,
    /// Result of the most recent compliance evaluation ("compliant",
    /// "non_compliant"), informational only.
    pub compliance_status: Option<String>,
    pub version: i32,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One concrete, dated occurrence of a task template.
///
/// Template flags are copied at generation time so later template edits
/// never retroactively change an already-generated instance. Instances
/// are never deleted; history is retained.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskInstance {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub template_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub client_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub category: TaskCategory,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub status: TaskStatus,
    pub require_signature: bool,
    pub require_note: bool,
    pub require_photo: bool,
    pub allow_skip: bool,
    /// Billable units this occurrence consumes when completed. Zero means
    /// non-billable.
    pub service_units: i32,
    pub completion: Option<Json<CompletionRecord>>,
    pub skip: Option<Json<SkipRecord>>,
    pub issue: Option<Json<IssueRecord>>,
    pub version: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payer-issued ceiling on billable units for one service code.
///
/// `units_used + units_remaining == authorized_units` at all times
/// (modulo explicit historical adjustments). Mutated only through the
/// atomic conditional deduction in `queries::authorizations`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceAuthorization {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub payer: String,
    pub service_code: String,
    pub authorized_units: i32,
    pub units_used: i32,
    pub units_remaining: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: AuthorizationStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
