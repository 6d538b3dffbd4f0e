//! Health reports and aggregate statistics

pub mod health;

pub use health::{ConnectionHealth, HealthStatus, ManagerStats};
