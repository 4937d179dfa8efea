//! Business logic services

pub mod import;
pub mod rate_limiter;
