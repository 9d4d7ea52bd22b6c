/// Dashboard endpoints
///
/// Reads accept anonymous requests and let the visibility rules decide.
/// Writes need an identified user; anonymous writes get 403.
///
/// # Endpoints
///
/// - `POST /v1/dashboard/save` - create (no `id`) or update a dashboard
/// - `POST /v1/dashboard/import` - create under a caller-chosen `id`
/// - `GET /v1/dashboard/byId/:id` - fetch a visible dashboard
/// - `GET /v1/dashboard/search/:tenant_id` - dashboards of visible teams
/// - `DELETE /v1/dashboard/:id` - delete with star marks
/// - `POST /v1/dashboard/weight` - change search weight (tenant admins)
/// - `POST|DELETE /v1/dashboard/:id/star` - star / unstar
/// - `GET /v1/dashboard/:id/starred` - whether the user starred it
/// - `GET /v1/dashboard/starred` - IDs the user starred

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use datav_shared::models::{Dashboard, DashboardListing, TenantId};
use datav_shared::services::SaveDashboard;
use serde::{Deserialize, Serialize};

use crate::{app::AppState, error::ApiResult, identity::CurrentUser};

/// Response to save and import
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeightRequest {
    pub id: String,
    pub weight: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StarredResponse {
    pub starred: bool,
}

/// Create or update a dashboard
///
/// ```text
/// POST /v1/dashboard/save
/// Authorization: Bearer <jwt_token>
///
/// {"title": "CPU", "ownedBy": 3, "visibleTo": "team", "tags": ["infra"], "data": {}}
/// ```
///
/// Returns `{"id": "d-..."}`. Errors: 400 invalid payload, 403 not a team
/// admin, 404 unknown id on update.
pub async fn save(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<SaveDashboard>, JsonRejection>,
) -> ApiResult<Json<SaveResponse>> {
    let user = current.require()?;
    let Json(req) = payload?;

    let id = state.dashboards.save(req, user).await?;
    Ok(Json(SaveResponse { id }))
}

/// Create a dashboard under the `id` in the body; 409 if it is taken
pub async fn import(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<SaveDashboard>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SaveResponse>)> {
    let user = current.require()?;
    let Json(req) = payload?;

    let id = state.dashboards.import(req, user).await?;
    Ok((StatusCode::CREATED, Json(SaveResponse { id })))
}

pub async fn fetch(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Dashboard>> {
    let dashboard = state.dashboards.fetch(&id, current.user()).await?;
    Ok(Json(dashboard))
}

/// Dashboards of every team of the tenant the user can see, weight first
pub async fn search(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(tenant_id): Path<TenantId>,
) -> ApiResult<Json<Vec<DashboardListing>>> {
    let listings = state.dashboards.search(tenant_id, current.user()).await?;
    Ok(Json(listings))
}

/// Delete a dashboard
///
/// 403 for every request while deletion is disabled, before the id is
/// looked up.
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user = current.require()?;
    state.dashboards.delete(&id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_weight(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<WeightRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let user = current.require()?;
    let Json(req) = payload?;

    state
        .dashboards
        .update_weight(&req.id, req.weight, user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn star(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.dashboards.star(&id, current.user()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unstar(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.dashboards.unstar(&id, current.user()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn is_starred(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<StarredResponse>> {
    let starred = state.dashboards.is_starred(&id, current.user()).await?;
    Ok(Json(StarredResponse { starred }))
}

pub async fn starred(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<String>>> {
    let ids = state.dashboards.starred(current.user()).await?;
    Ok(Json(ids))
}
