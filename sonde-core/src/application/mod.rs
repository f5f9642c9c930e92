//! Application services

pub mod normalize;
