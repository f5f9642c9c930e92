//! Engine application services

pub mod executor;
pub mod registry;
