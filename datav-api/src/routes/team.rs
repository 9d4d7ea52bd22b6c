/// Team endpoints
///
/// # Endpoints
///
/// - `POST /v1/tenant/:tenant_id/team` - create a team with its defaults
/// - `GET /v1/team/:id` - team details
/// - `DELETE /v1/team/:id` - delete the team and everything it owns
/// - `POST /v1/team/:id/archive` - mark the team deleted, keeping its rows
/// - `GET /v1/team/:id/dashboards` - dashboard listing
/// - `GET /v1/team/:id/sidemenu` - navigation menu
/// - `GET /v1/team/:id/datasources` - datasources

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use datav_shared::models::{Datasource, DashboardSummary, SideMenu, Team, TeamId, TenantId};
use datav_shared::services::CreateTeam;

use crate::{app::AppState, error::ApiResult, identity::CurrentUser};

/// Create a team
///
/// ```text
/// POST /v1/tenant/1/team
/// Authorization: Bearer <jwt_token>
///
/// {"name": "ops", "brief": "operations"}
/// ```
///
/// The creator becomes the team's SuperAdmin. The team starts with a
/// `TestData` datasource, a home dashboard and a side menu pointing at it.
///
/// Errors: 400 empty name, 403 not a tenant member, 409 name taken in the
/// tenant.
pub async fn create_team(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(tenant_id): Path<TenantId>,
    payload: Result<Json<CreateTeam>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let user = current.require()?;
    let Json(req) = payload?;

    let team = state.teams.create(tenant_id, req, user).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<Team>> {
    let team = state.teams.get(team_id, current.user()).await?;
    Ok(Json(team))
}

/// Delete a team; all-or-nothing
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<StatusCode> {
    let user = current.require()?;
    state.teams.delete(team_id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive_team(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<StatusCode> {
    let user = current.require()?;
    state.teams.archive(team_id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn team_dashboards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<Vec<DashboardSummary>>> {
    let dashboards = state
        .dashboards
        .team_dashboards(team_id, current.user())
        .await?;
    Ok(Json(dashboards))
}

pub async fn side_menu(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<SideMenu>> {
    let menu = state.teams.side_menu(team_id, current.user()).await?;
    Ok(Json(menu))
}

pub async fn datasources(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<TeamId>,
) -> ApiResult<Json<Vec<Datasource>>> {
    let datasources = state.teams.datasources(team_id, current.user()).await?;
    Ok(Json(datasources))
}
