//! Defines every route of the notes API.
//!
//! ## Structure
//! - **Public**
//!   - `GET  /` — welcome banner
//!   - `GET  /healthz`, `GET /readyz`
//!   - `GET  /api/auth/google` — redirect to Google consent
//!   - `GET  /api/auth/google/callback` — finish login, set the `jwt` cookie
//!   - `POST /api/auth/logout`
//!   - `GET  /api/files/{*key}` — signed links of the local backend
//!
//! - **Session required**
//!   - `GET    /api/auth/me`
//!   - `POST   /api/notes`, `GET /api/notes`
//!   - `GET    /api/notes/{id}`, `DELETE /api/notes/{id}`
//!   - `GET    /api/notes/{id}/download`

use crate::{
    handlers::{
        auth_handlers::{google_callback, google_login, logout, me},
        file_handlers::signed_download,
        health_handlers::{healthz, readyz},
        note_handlers::{create_note, delete_note, download_note, get_note, list_notes, welcome},
    },
    services::note_service::MAX_UPLOAD_BYTES,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Room left in the request body for multipart boundaries and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router for all API routes. Carries `AppState` to every handler.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // auth
        .route("/api/auth/google", get(google_login))
        .route("/api/auth/google/callback", get(google_callback))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        // notes
        .route(
            "/api/notes",
            post(create_note)
                .get(list_notes)
                .layer(DefaultBodyLimit::max(
                    MAX_UPLOAD_BYTES as usize + MULTIPART_OVERHEAD,
                )),
        )
        .route("/api/notes/{id}", get(get_note).delete(delete_note))
        .route("/api/notes/{id}/download", get(download_note))
        // local backend links
        .route("/api/files/{*key}", get(signed_download))
}

/// The full application: routes, state, tracing and CORS.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);
    routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
