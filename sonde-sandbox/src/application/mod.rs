//! Sandbox application services

pub mod executor;
