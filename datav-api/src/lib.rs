//! # datav API Server Library
//!
//! HTTP surface over the dashboard and team lifecycle services in
//! `datav-shared`.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration management
//! - `error`: error handling and HTTP response mapping
//! - `identity`: optional bearer-token identification
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
