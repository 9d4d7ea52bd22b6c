/// Acting-user resolution
///
/// Every `/v1` request passes through [`identify`]. The bearer token is
/// optional:
///
/// - no `Authorization` header: anonymous request
/// - `Authorization: Bearer <jwt>` with a valid token: that user
/// - anything else: 401
///
/// Handlers read the result with `Extension<CurrentUser>`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use datav_shared::auth::{jwt, AclError};
use datav_shared::models::User;
use datav_shared::CoreError;

use crate::{app::AppState, error::ApiError};

/// The user behind a request, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    /// The user, or a login-required denial for anonymous requests
    pub fn require(&self) -> Result<&User, ApiError> {
        self.0
            .as_ref()
            .ok_or_else(|| CoreError::from(AclError::LoginRequired).into())
    }
}

/// Resolves the bearer token into a [`CurrentUser`] extension
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = match req.headers().get(AUTHORIZATION) {
        None => CurrentUser(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::Unauthorized("Malformed authorization header".to_string()))?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

            let claims = jwt::validate_token(token, state.jwt_secret())?;
            CurrentUser(Some(claims.user()))
        }
    };

    if let Some(user) = current.user() {
        tracing::debug!(user_id = user.id, username = %user.username, "Request identified");
    }

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}
