//! Request handlers

pub mod admin;
pub mod health;
pub mod query;

pub use admin::{ingest_handler, refresh_handler};
pub use health::{admin_health, health_check};
pub use query::query_handler;
