//! Command handlers.

pub mod plan;
pub mod serve;
