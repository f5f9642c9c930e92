//! Engine domain model

pub mod graph;
pub mod pipeline;
pub mod state;
