//! Engine infrastructure

pub mod checkpoint;
