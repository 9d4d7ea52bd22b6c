/// PostgreSQL pool for [`crate::store::PgStore`]
///
/// ```text
/// let pool = create_pool(DatabaseConfig { url, ..Default::default() }).await?;
/// let store = PgStore::new(pool.clone());
/// ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Connection pool settings; timeouts in seconds
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,

    /// Idle connections kept warm
    pub min_connections: u32,

    /// How long an acquire waits when every connection is busy
    pub acquire_timeout_seconds: u64,

    /// None keeps idle connections forever
    pub idle_timeout_seconds: Option<u64>,

    /// None never recycles connections
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 10,
            idle_timeout_seconds: Some(300),
            max_lifetime_seconds: Some(1800),
        }
    }
}

impl DatabaseConfig {
    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_seconds))
            .idle_timeout(self.idle_timeout_seconds.map(Duration::from_secs))
            .max_lifetime(self.max_lifetime_seconds.map(Duration::from_secs))
    }
}

/// Connects and checks that the database answers before returning
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to PostgreSQL"
    );

    let pool = config.options().connect(&config.url).await?;
    health_check(&pool).await?;

    info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// Round-trips a trivial query
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    if one != 1 {
        return Err(sqlx::Error::Protocol(format!(
            "health check returned {}",
            one
        )));
    }
    Ok(())
}

/// Waits for checked-out connections to return, then closes them all
pub async fn close_pool(pool: PgPool) {
    pool.close().await;
    info!("Database pool closed");
}
