//! # datav Shared Library
//!
//! Access control and lifecycle core for multi-tenant dashboards: who may
//! read, write, star or delete a dashboard or team, and how dashboards,
//! teams and their dependent rows stay consistent across create, update and
//! delete.
//!
//! ## Module Organization
//!
//! - `models`: roles, users, teams, dashboards, history and audit records
//! - `auth`: ACL decisions, visibility resolution, bearer tokens
//! - `services`: dashboard and team lifecycle operations
//! - `store`: storage traits with PostgreSQL and in-memory adapters
//! - `history`: asynchronous dashboard history recorder
//! - `audit`: audit sink for destructive operations
//! - `datasource`: per-datasource connection cache
//! - `db`: connection pool and migrations
//! - `config`: core settings
//! - `error`: error kinds returned by services

pub mod audit;
pub mod auth;
pub mod config;
pub mod datasource;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod services;
pub mod store;

pub use error::{CoreError, CoreResult};

/// Current version of the datav shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
