//! Serves signed download links issued by the local disk backend.

use crate::{errors::AppError, models::note::PDF_CONTENT_TYPE, state::AppState, stores::blob::BlobError};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct SignedLink {
    pub expires: i64,
    pub signature: String,
}

/// `GET /api/files/{*key}?expires=&signature=` — stream a stored note.
///
/// Expired links and bad signatures are indistinguishable to the caller.
pub async fn signed_download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(link): Query<SignedLink>,
) -> Result<Response, AppError> {
    let Some(store) = state.local_files.as_ref() else {
        return Err(AppError::not_found("File not found"));
    };

    let now = Utc::now().timestamp();
    if !store.signer().verify(&key, link.expires, &link.signature, now) {
        debug!(%key, expires = link.expires, "rejected download link");
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "invalid_signature",
            "Download link is invalid or expired",
        ));
    }

    let (file, len) = store.open(&key).await.map_err(|err| match err {
        BlobError::NotFound(_) | BlobError::InvalidKey => AppError::not_found("File not found"),
        other => {
            error!(error = %other, %key, "failed to open stored file");
            AppError::internal("Failed to read file")
        }
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Some(name) = key.rsplit('/').next() {
        let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
