//! HTTP handlers for sales-service.

pub mod health;
pub mod sales;

pub use health::{health_check, metrics_endpoint, readiness_check};
