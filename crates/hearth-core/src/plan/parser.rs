//! Plan TOML parser with validation.
//!
//! Parses a `plan.toml` string into a [`PlanToml`] and validates:
//! - Priority, category, pattern, weekday, and time values parse.
//! - Template names are unique.
//! - `as_needed` frequencies carry no weekday constraints.
//! - Service units are non-negative.
//! - The expiration date, if set, follows the effective date.
//!
//! The same conversion path backs [`to_new_plan`], so anything the parser
//! accepts can be inserted.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use hearth_db::models::{Priority, TaskCategory};
use hearth_db::queries::plans::NewCarePlan;
use hearth_db::values::{
    DayOfWeek, Frequency, FrequencyPattern, Goal, GoalStatus, Intervention, ItemStatus,
    TaskTemplate,
};

use super::toml_format::{FrequencyToml, PlanToml};

/// Errors that can occur during plan parsing and validation.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("plan title must not be empty")]
    EmptyTitle,

    #[error("duplicate template name: {0:?}")]
    DuplicateTemplateName(String),

    #[error("invalid priority {0:?} (expected low, medium, high, or urgent)")]
    InvalidPriority(String),

    #[error("invalid category {value:?} on {item:?}")]
    InvalidCategory { item: String, value: String },

    #[error(
        "invalid frequency pattern {value:?} on {item:?} \
         (expected daily, weekly, bi_weekly, monthly, as_needed, or custom)"
    )]
    InvalidPattern { item: String, value: String },

    #[error("invalid weekday {value:?} on {item:?}")]
    InvalidDay { item: String, value: String },

    #[error("invalid time of day {value:?} on {item:?} (expected HH:MM)")]
    InvalidTime { item: String, value: String },

    #[error("invalid date {value:?} for {field} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("template {0:?} uses as_needed frequency with weekday constraints")]
    AsNeededWithDays(String),

    #[error("template {0:?} has negative service units")]
    NegativeServiceUnits(String),

    #[error("expiration date {expiration} does not follow effective date {effective}")]
    ExpirationBeforeEffective {
        effective: NaiveDate,
        expiration: NaiveDate,
    },
}

/// Parse and validate a `plan.toml` string.
pub fn parse_plan_toml(content: &str) -> Result<PlanToml, PlanParseError> {
    let plan: PlanToml = toml::from_str(content)?;
    validate(&plan)?;
    Ok(plan)
}

/// Convert a validated plan definition into an insertable [`NewCarePlan`],
/// minting ids for the embedded goals, interventions, and templates.
pub fn to_new_plan(
    plan: &PlanToml,
    organization_id: Uuid,
    created_by: Uuid,
) -> Result<NewCarePlan, PlanParseError> {
    let (effective_date, expiration_date) = parse_dates(plan)?;
    let goals = build_goals(plan);
    let interventions = build_interventions(plan)?;
    let task_templates = build_templates(plan)?;

    Ok(NewCarePlan {
        organization_id,
        client_id: plan.plan.client_id,
        title: plan.plan.title.clone(),
        priority: parse_priority(&plan.plan.priority)?,
        jurisdiction: plan.plan.jurisdiction.clone(),
        coordinator_id: plan.plan.coordinator_id,
        effective_date,
        expiration_date,
        goals,
        interventions,
        task_templates,
        regulatory: plan.regulatory.clone(),
        created_by,
    })
}

/// Validate the parsed plan structure by driving the conversion path.
fn validate(plan: &PlanToml) -> Result<(), PlanParseError> {
    if plan.plan.title.trim().is_empty() {
        return Err(PlanParseError::EmptyTitle);
    }

    let mut seen = HashSet::new();
    for template in &plan.templates {
        if !seen.insert(&template.name) {
            return Err(PlanParseError::DuplicateTemplateName(template.name.clone()));
        }
    }

    parse_priority(&plan.plan.priority)?;
    parse_dates(plan)?;
    build_interventions(plan)?;
    build_templates(plan)?;

    Ok(())
}

fn parse_priority(value: &str) -> Result<Priority, PlanParseError> {
    Priority::from_str(value).map_err(|_| PlanParseError::InvalidPriority(value.to_owned()))
}

fn parse_dates(plan: &PlanToml) -> Result<(NaiveDate, Option<NaiveDate>), PlanParseError> {
    let effective = parse_date("effective_date", &plan.plan.effective_date)?;
    let expiration = plan
        .plan
        .expiration_date
        .as_deref()
        .map(|s| parse_date("expiration_date", s))
        .transpose()?;
    if let Some(expiration) = expiration {
        if expiration <= effective {
            return Err(PlanParseError::ExpirationBeforeEffective {
                effective,
                expiration,
            });
        }
    }
    Ok((effective, expiration))
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, PlanParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| PlanParseError::InvalidDate {
        field,
        value: value.to_owned(),
    })
}

fn parse_category(item: &str, value: &str) -> Result<TaskCategory, PlanParseError> {
    TaskCategory::from_str(value).map_err(|_| PlanParseError::InvalidCategory {
        item: item.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_pattern(item: &str, value: &str) -> Result<FrequencyPattern, PlanParseError> {
    let pattern = match value {
        "daily" => FrequencyPattern::Daily,
        "weekly" => FrequencyPattern::Weekly,
        "bi_weekly" => FrequencyPattern::BiWeekly,
        "monthly" => FrequencyPattern::Monthly,
        "as_needed" => FrequencyPattern::AsNeeded,
        "custom" => FrequencyPattern::Custom,
        other => {
            return Err(PlanParseError::InvalidPattern {
                item: item.to_owned(),
                value: other.to_owned(),
            });
        }
    };
    Ok(pattern)
}

fn parse_day(item: &str, value: &str) -> Result<DayOfWeek, PlanParseError> {
    let day = match value {
        "monday" => DayOfWeek::Monday,
        "tuesday" => DayOfWeek::Tuesday,
        "wednesday" => DayOfWeek::Wednesday,
        "thursday" => DayOfWeek::Thursday,
        "friday" => DayOfWeek::Friday,
        "saturday" => DayOfWeek::Saturday,
        "sunday" => DayOfWeek::Sunday,
        other => {
            return Err(PlanParseError::InvalidDay {
                item: item.to_owned(),
                value: other.to_owned(),
            });
        }
    };
    Ok(day)
}

fn parse_time(item: &str, value: &str) -> Result<NaiveTime, PlanParseError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| PlanParseError::InvalidTime {
            item: item.to_owned(),
            value: value.to_owned(),
        })
}

fn parse_frequency(item: &str, freq: &FrequencyToml) -> Result<Frequency, PlanParseError> {
    let pattern = parse_pattern(item, &freq.pattern)?;
    let days_of_week = freq
        .days_of_week
        .iter()
        .map(|d| parse_day(item, d))
        .collect::<Result<Vec<_>, _>>()?;
    let times_of_day = freq
        .times_of_day
        .iter()
        .map(|t| parse_time(item, t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Frequency {
        pattern,
        days_of_week,
        times_of_day,
    })
}

fn build_goals(plan: &PlanToml) -> Vec<Goal> {
    plan.goals
        .iter()
        .map(|g| Goal {
            id: Uuid::new_v4(),
            category: g.category.clone(),
            description: g.description.clone(),
            status: GoalStatus::NotStarted,
            target_value: g.target_value.clone(),
            current_value: None,
            intervention_ids: Vec::new(),
            task_ids: Vec::new(),
        })
        .collect()
}

fn build_interventions(plan: &PlanToml) -> Result<Vec<Intervention>, PlanParseError> {
    plan.interventions
        .iter()
        .map(|i| {
            Ok(Intervention {
                id: Uuid::new_v4(),
                category: parse_category(&i.description, &i.category)?,
                description: i.description.clone(),
                frequency: parse_frequency(&i.description, &i.frequency)?,
                performer_roles: i.performer_roles.clone(),
                requires_documentation: i.requires_documentation,
                status: ItemStatus::Active,
            })
        })
        .collect()
}

fn build_templates(plan: &PlanToml) -> Result<Vec<TaskTemplate>, PlanParseError> {
    plan.templates
        .iter()
        .map(|t| {
            let frequency = parse_frequency(&t.name, &t.frequency)?;
            if frequency.pattern == FrequencyPattern::AsNeeded
                && !frequency.days_of_week.is_empty()
            {
                return Err(PlanParseError::AsNeededWithDays(t.name.clone()));
            }
            if t.service_units < 0 {
                return Err(PlanParseError::NegativeServiceUnits(t.name.clone()));
            }
            Ok(TaskTemplate {
                id: Uuid::new_v4(),
                name: t.name.clone(),
                category: parse_category(&t.name, &t.category)?,
                frequency,
                require_signature: t.require_signature,
                require_note: t.require_note,
                require_photo: t.require_photo,
                allow_skip: t.allow_skip,
                skip_reasons: t.skip_reasons.clone(),
                quality_checks: t.quality_checks.clone(),
                service_units: t.service_units,
                status: ItemStatus::Active,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PLAN: &str = r#"
[plan]
title = "Post-surgery home care"
client_id = "a4c8a9e2-64b7-4c2e-9f3d-2b1f0a9d8c7e"
priority = "high"
jurisdiction = "TX"
effective_date = "2025-01-01"
expiration_date = "2025-07-01"

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
require_signature = true
service_units = 1

[templates.frequency]
pattern = "weekly"
days_of_week = ["monday", "wednesday", "friday"]
times_of_day = ["09:00"]
"#;

    #[test]
    fn parse_valid_plan() {
        let plan = parse_plan_toml(VALID_PLAN).expect("should parse");
        assert_eq!(plan.templates.len(), 1);
    }

    #[test]
    fn conversion_mints_ids_and_parses_fields() {
        let plan = parse_plan_toml(VALID_PLAN).expect("should parse");
        let new = to_new_plan(&plan, Uuid::new_v4(), Uuid::new_v4()).expect("should convert");
        assert_eq!(new.priority, Priority::High);
        assert_eq!(
            new.effective_date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
        assert_eq!(new.goals.len(), 1);
        assert_eq!(new.task_templates[0].category, TaskCategory::PersonalCare);
        assert_eq!(
            new.task_templates[0].frequency.days_of_week,
            vec![DayOfWeek::Monday, DayOfWeek::Wednesday, DayOfWeek::Friday]
        );
        assert_eq!(
            new.task_templates[0].frequency.times_of_day,
            vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()]
        );
        // Each embedded item gets a fresh id.
        assert_ne!(new.goals[0].id, new.task_templates[0].id);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = parse_plan_toml("this is not valid toml {{{").unwrap_err();
        assert!(matches!(err, PlanParseError::TomlError(_)));
    }

    #[test]
    fn rejects_empty_title() {
        let toml_str = VALID_PLAN.replace("Post-surgery home care", "  ");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::EmptyTitle));
    }

    #[test]
    fn rejects_duplicate_template_names() {
        let toml_str = format!(
            "{VALID_PLAN}\n\
             [[templates]]\n\
             name = \"morning-bath\"\n\
             category = \"personal_care\"\n\
             frequency = {{ pattern = \"daily\" }}\n"
        );
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(
            matches!(err, PlanParseError::DuplicateTemplateName(ref n) if n == "morning-bath"),
            "expected DuplicateTemplateName, got: {err}"
        );
    }

    #[test]
    fn rejects_invalid_priority() {
        let toml_str = VALID_PLAN.replace("\"high\"", "\"extreme\"");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::InvalidPriority(_)));
    }

    #[test]
    fn rejects_invalid_category() {
        let toml_str = VALID_PLAN.replace("category = \"personal_care\"\nrequire_signature", "category = \"gardening\"\nrequire_signature");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(
            matches!(err, PlanParseError::InvalidCategory { .. }),
            "expected InvalidCategory, got: {err}"
        );
    }

    #[test]
    fn rejects_invalid_pattern() {
        let toml_str = VALID_PLAN.replace("pattern = \"weekly\"", "pattern = \"fortnightly\"");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_invalid_weekday() {
        let toml_str = VALID_PLAN.replace("\"monday\"", "\"moonday\"");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::InvalidDay { .. }));
    }

    #[test]
    fn rejects_invalid_time() {
        let toml_str = VALID_PLAN.replace("\"09:00\"", "\"9am\"");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::InvalidTime { .. }));
    }

    #[test]
    fn rejects_unparseable_date() {
        let toml_str = VALID_PLAN.replace("2025-01-01", "01/01/2025");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(
            err,
            PlanParseError::InvalidDate {
                field: "effective_date",
                ..
            }
        ));
    }

    #[test]
    fn rejects_expiration_before_effective() {
        let toml_str = VALID_PLAN.replace("2025-07-01", "2024-12-01");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(
            err,
            PlanParseError::ExpirationBeforeEffective { .. }
        ));
    }

    #[test]
    fn rejects_as_needed_with_weekdays() {
        let toml_str = VALID_PLAN.replace("pattern = \"weekly\"", "pattern = \"as_needed\"");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(
            matches!(err, PlanParseError::AsNeededWithDays(ref n) if n == "morning-bath"),
            "expected AsNeededWithDays, got: {err}"
        );
    }

    #[test]
    fn rejects_negative_service_units() {
        let toml_str = VALID_PLAN.replace("service_units = 1", "service_units = -1");
        let err = parse_plan_toml(&toml_str).unwrap_err();
        assert!(matches!(err, PlanParseError::NegativeServiceUnits(_)));
    }
}
