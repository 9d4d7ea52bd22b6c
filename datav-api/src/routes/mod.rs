/// API route handlers
///
/// - `health`: health check endpoint
/// - `dashboard`: dashboard save, fetch, search, stars, deletion, weight
/// - `team`: team creation, lookup, menu, deletion, archiving

pub mod dashboard;
pub mod health;
pub mod team;
