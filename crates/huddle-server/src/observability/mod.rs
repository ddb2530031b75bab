//! Health endpoint and metrics recording helpers.

pub mod health;
pub mod metrics;

pub use health::health_router;
