//! Care plan management: TOML parsing, lifecycle service, task generation.

pub mod generate;
pub mod parser;
pub mod service;
pub mod toml_format;

pub use generate::{create_manual_task, generate_visit_tasks};
pub use parser::{PlanParseError, parse_plan_toml, to_new_plan};
pub use service::{
    activate_plan, check_compliance, complete_plan, create_plan, create_plan_from_toml,
    delete_plan, discontinue_plan, get_plan, place_on_hold, submit_for_approval, update_plan,
};
pub use toml_format::{FrequencyToml, GoalToml, InterventionToml, PlanMeta, PlanToml, TemplateToml};
