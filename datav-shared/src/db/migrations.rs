/// Schema migrations
///
/// The SQL files under `datav-shared/migrations/` are embedded at compile
/// time and applied in timestamp order. sqlx records applied versions in
/// `_sqlx_migrations`, so running them again is a no-op.

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}
