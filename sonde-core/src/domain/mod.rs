//! Core domain model

pub mod finding;
pub mod plugin;
