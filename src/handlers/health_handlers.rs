//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the database and the blob store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// `GET /healthz`
///
/// Always 200; performs no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Pings the metadata store and probes the blob store. HTTP 200 when both
/// pass, 503 otherwise. Failure detail goes to the log, the body only says
/// which check failed.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.notes.repository().ping().await {
        Ok(()) => CheckStatus { ok: true },
        Err(err) => {
            warn!(error = %err, "database ping failed");
            CheckStatus { ok: false }
        }
    };

    let blobs = state.notes.blobs();
    let storage = match blobs.probe().await {
        Ok(()) => CheckStatus { ok: true },
        Err(err) => {
            warn!(backend = blobs.backend(), error = %err, "blob store probe failed");
            CheckStatus { ok: false }
        }
    };

    let overall_ok = database.ok && storage.ok;

    let mut checks = HashMap::new();
    checks.insert("database", database);
    checks.insert("storage", storage);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        storage_backend: blobs.backend(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    storage_backend: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
}
