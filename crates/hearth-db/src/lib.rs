//! Persistence layer for hearth: PostgreSQL pool management, typed row
//! models, embedded value objects, and query functions.
//!
//! All mutating queries are conditional writes (optimistic locking on
//! status and/or `version`); callers inspect the affected-row count to
//! distinguish stale writes from missing rows.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
pub mod values;
