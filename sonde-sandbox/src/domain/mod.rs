//! Sandbox domain model

pub mod budgets;
pub mod messages;
pub mod traits;
