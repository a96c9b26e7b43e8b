//! Query functions, one module per table.

pub mod authorizations;
pub mod plans;
pub mod tasks;
