//! Shared utilities

pub mod fixed;
pub mod rate_limit;
pub mod time;
