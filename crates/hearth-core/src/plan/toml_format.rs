//! TOML format types for care plan definition files.
//!
//! These types map directly to the `plan.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate. Enum-like fields stay
//! strings here and are validated by the parser; dates are quoted
//! strings (`"2025-01-01"`) so they deserialize through chrono rather
//! than TOML's native datetime.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_db::values::RegulatoryInfo;

/// Top-level structure of a `plan.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanToml {
    /// Plan metadata.
    pub plan: PlanMeta,
    /// Care goals.
    #[serde(default)]
    pub goals: Vec<GoalToml>,
    /// Clinical interventions.
    #[serde(default)]
    pub interventions: Vec<InterventionToml>,
    /// Task templates the generator draws from.
    #[serde(default)]
    pub templates: Vec<TemplateToml>,
    /// Jurisdiction-specific regulatory attributes.
    #[serde(default)]
    pub regulatory: RegulatoryInfo,
}

/// Plan-level metadata in `[plan]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMeta {
    /// Plan UUID, set after `hearth plan create` writes the plan to the
    /// database. Absent in authored plan files, present once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Human-readable plan title.
    pub title: String,
    /// Client the plan covers.
    pub client_id: Uuid,
    /// Priority: "low", "medium", "high", or "urgent".
    #[serde(default = "default_priority")]
    pub priority: String,
    /// Two-letter state code selecting the regulatory rule set.
    pub jurisdiction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator_id: Option<Uuid>,
    /// Quoted date string, e.g. "2025-01-01".
    pub effective_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

/// A `[[goals]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalToml {
    /// Free-text goal category, e.g. "mobility".
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<String>,
}

/// A `[[interventions]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterventionToml {
    /// Task category: "personal_care", "wound_care", etc.
    pub category: String,
    pub description: String,
    pub frequency: FrequencyToml,
    #[serde(default)]
    pub performer_roles: Vec<String>,
    #[serde(default)]
    pub requires_documentation: bool,
}

/// A `[[templates]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateToml {
    /// Unique template name within the plan.
    pub name: String,
    /// Task category: "personal_care", "wound_care", etc.
    pub category: String,
    pub frequency: FrequencyToml,
    #[serde(default)]
    pub require_signature: bool,
    #[serde(default)]
    pub require_note: bool,
    #[serde(default)]
    pub require_photo: bool,
    #[serde(default = "default_allow_skip")]
    pub allow_skip: bool,
    #[serde(default)]
    pub skip_reasons: Vec<String>,
    #[serde(default)]
    pub quality_checks: Vec<String>,
    /// Billable units one occurrence consumes. Zero means non-billable.
    #[serde(default)]
    pub service_units: i32,
}

/// Recurrence description shared by interventions and templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyToml {
    /// "daily", "weekly", "bi_weekly", "monthly", "as_needed", "custom".
    pub pattern: String,
    /// Weekday names for weekly patterns: "monday" .. "sunday".
    #[serde(default)]
    pub days_of_week: Vec<String>,
    /// Times of day, "HH:MM" or "HH:MM:SS".
    #[serde(default)]
    pub times_of_day: Vec<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_allow_skip() -> bool {
    true
}
