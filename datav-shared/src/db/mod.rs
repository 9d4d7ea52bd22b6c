/// Database plumbing
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: embedded schema migrations
///
/// Queries live in [`crate::store::postgres`]; nothing here knows about
/// dashboards or teams.

pub mod migrations;
pub mod pool;
