//! Domain core for hearth: care plan lifecycle, per-visit task
//! generation, the task completion state machine, jurisdiction compliance
//! rule sets, and the service authorization ledger.
//!
//! All operations are request-scoped: load, validate, conditionally
//! write, return. Persistence is an injected `sqlx::PgPool`; permission
//! decisions come from an injected [`authz::PolicyProvider`].

pub mod authz;
pub mod compliance;
pub mod error;
pub mod ledger;
pub mod plan;
pub mod recurrence;
pub mod task;
