//! OAuth login, callback, session introspection and logout.

use crate::{
    errors::AppError,
    handlers::session::{Principal, cleared_session_cookie, session_cookie},
    models::session::UserResponse,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /api/auth/google` — redirect to the provider's consent page.
pub async fn google_login(
    State(state): State<AppState>,
    Query(q): Query<LoginQuery>,
) -> impl IntoResponse {
    let url = state.auth.authorization_url(q.state.as_deref());
    Redirect::temporary(&url)
}

/// `GET /api/auth/google/callback` — finish the login.
///
/// On success the session token is set as the `jwt` cookie and the browser
/// is sent to the frontend dashboard.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(error) = q.error.as_deref().filter(|e| !e.is_empty()) {
        warn!(
            error,
            description = q.error_description.as_deref().unwrap_or(""),
            "provider returned an error"
        );
        return Err(AppError::unauthorized(
            "access_denied",
            "Authentication was denied",
        ));
    }

    let Some(code) = q.code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(AppError::bad_request(
            "missing_code",
            "Authorization code is required",
        ));
    };
    if q.state.as_deref().is_none_or(str::is_empty) {
        return Err(AppError::bad_request(
            "missing_state",
            "State parameter is required",
        ));
    }

    let result = state.auth.login(code).await?;
    let cookie = session_cookie(&result.token)?;
    let target = format!("{}/dashboard", state.settings.frontend_url);

    info!(email = %result.profile.email, "session issued");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::temporary(&target)).into_response())
}

/// `GET /api/auth/me` — the signed-in user.
pub async fn me(Principal(claims): Principal) -> Json<UserResponse> {
    Json(UserResponse::from(claims))
}

/// `POST /api/auth/logout` — drop the session cookie.
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_session_cookie())],
    )
}
