/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use datav_api::app::{build_router, AppState};
/// use datav_shared::config::CoreConfig;
/// use datav_shared::history::HistoryRecorder;
/// use datav_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let config = CoreConfig::default();
/// let (history, _consumer) = HistoryRecorder::spawn(store.clone(), config.history.queue_capacity);
/// let state = AppState::new(store, history, &config, "a-secret-of-at-least-32-characters!");
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, build_router(state)).await?;
/// # Ok(())
/// # }
/// ```

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use datav_shared::audit::{AuditSink, StoreAuditSink};
use datav_shared::config::CoreConfig;
use datav_shared::history::HistoryRecorder;
use datav_shared::services::{DashboardService, TeamService};
use datav_shared::store::Store;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::identity;

/// Shared application state
///
/// Cloned for each request by Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub dashboards: Arc<DashboardService>,

    pub teams: Arc<TeamService>,

    /// Pool behind the store, when it is PostgreSQL; used by `/health`
    pub db: Option<PgPool>,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    jwt_secret: Arc<str>,
}

impl AppState {
    /// Wires the lifecycle services over one store
    pub fn new(
        store: Arc<dyn Store>,
        history: HistoryRecorder,
        config: &CoreConfig,
        jwt_secret: impl Into<String>,
    ) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(StoreAuditSink::new(store.clone()));

        Self {
            dashboards: Arc::new(DashboardService::new(
                store.clone(),
                history,
                audit.clone(),
                config.dashboard.clone(),
            )),
            teams: Arc::new(TeamService::new(store, audit)),
            db: None,
            cors_origins: vec!["*".to_string()],
            jwt_secret: Arc::from(jwt_secret.into()),
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Secret used to validate bearer tokens
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/                                  (optional bearer identity)
///     ├── /dashboard/
///     │   ├── POST   /save
///     │   ├── POST   /import
///     │   ├── POST   /weight
///     │   ├── GET    /starred
///     │   ├── GET    /byId/:id
///     │   ├── GET    /search/:tenant_id
///     │   ├── DELETE /:id
///     │   ├── POST   /:id/star
///     │   ├── DELETE /:id/star
///     │   └── GET    /:id/starred
///     ├── POST /tenant/:tenant_id/team
///     └── /team/:id
///         ├── GET    /
///         ├── DELETE /
///         ├── POST   /archive
///         ├── GET    /dashboards
///         ├── GET    /sidemenu
///         └── GET    /datasources
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let dashboard_routes = Router::new()
        .route("/save", post(routes::dashboard::save))
        .route("/import", post(routes::dashboard::import))
        .route("/weight", post(routes::dashboard::update_weight))
        .route("/starred", get(routes::dashboard::starred))
        .route("/byId/:id", get(routes::dashboard::fetch))
        .route("/search/:tenant_id", get(routes::dashboard::search))
        .route("/:id", delete(routes::dashboard::delete))
        .route(
            "/:id/star",
            post(routes::dashboard::star).delete(routes::dashboard::unstar),
        )
        .route("/:id/starred", get(routes::dashboard::is_starred));

    let team_routes = Router::new()
        .route(
            "/:id",
            get(routes::team::get_team).delete(routes::team::delete_team),
        )
        .route("/:id/archive", post(routes::team::archive_team))
        .route("/:id/dashboards", get(routes::team::team_dashboards))
        .route("/:id/sidemenu", get(routes::team::side_menu))
        .route("/:id/datasources", get(routes::team::datasources));

    let v1_routes = Router::new()
        .nest("/dashboard", dashboard_routes)
        .nest("/team", team_routes)
        .route("/tenant/:tenant_id/team", post(routes::team::create_team))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity::identify,
        ));

    let cors = if state.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
