//! HTTP handlers for notes. Every route here requires a session; the owner
//! is always taken from the session, never from the request.

use crate::{
    errors::AppError,
    handlers::session::Principal,
    models::note::{FileUpload, ListNotesQuery, NewNote, Note, NoteSummary},
    services::note_service::MAX_UPLOAD_BYTES,
    state::AppState,
    stores::blob::bytes_stream,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use bytes::BytesMut;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// Query parameters of `GET /api/notes`, kept as strings so that a bad
/// number falls back to the default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub course_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl From<ListParams> for ListNotesQuery {
    fn from(p: ListParams) -> Self {
        Self {
            course_id: p.course_id,
            limit: p.limit.and_then(|v| v.trim().parse().ok()),
            offset: p.offset.and_then(|v| v.trim().parse().ok()),
        }
    }
}

/// `GET /` — service banner.
pub async fn welcome() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to Rice Notes!",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/notes` — multipart upload with `file`, `title` and `course_id`.
pub async fn create_note(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart.map_err(|rej| {
        debug!(error = %rej, "rejected upload body");
        AppError::bad_request("validation_error", "Expected a multipart/form-data body")
    })?;

    let mut title = String::new();
    let mut course_id = String::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => title = field.text().await.map_err(multipart_error)?,
            Some("course_id") => course_id = field.text().await.map_err(multipart_error)?,
            Some("file") => file = Some(read_file_field(field).await?),
            other => debug!(field = ?other, "ignoring unknown multipart field"),
        }
    }

    let summary: NoteSummary = state
        .notes
        .create_note(NewNote {
            owner: principal.email().to_string(),
            title: title.trim().to_string(),
            course_id: course_id.trim().to_string(),
            file,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /api/notes` — the caller's notes, newest first.
pub async fn list_notes(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Note>>, AppError> {
    let notes = state
        .notes
        .list_notes(principal.email(), params.into())
        .await?;
    Ok(Json(notes))
}

/// `GET /api/notes/{id}`
pub async fn get_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Note>, AppError> {
    let id = parse_note_id(&id)?;
    let note = state.notes.get_note(id, principal.email()).await?;
    Ok(Json(note))
}

/// `GET /api/notes/{id}/download` — redirect to a short-lived link.
pub async fn download_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = parse_note_id(&id)?;
    let url = state.notes.download_url(id, principal.email()).await?;
    Ok(Redirect::temporary(&url))
}

/// `DELETE /api/notes/{id}`
pub async fn delete_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_note_id(&id)?;
    state.notes.delete_note(id, principal.email()).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_note_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("invalid_note_id", "Invalid note ID"))
}

/// Buffer the file field up to the upload cap. Bytes past the cap are
/// counted but dropped, so the reported size stays accurate and the
/// orchestrator rejects the upload before touching any store.
async fn read_file_field(mut field: Field<'_>) -> Result<FileUpload, AppError> {
    let file_name = field.file_name().unwrap_or_default().trim().to_string();
    let cap = MAX_UPLOAD_BYTES as usize;

    let mut buf = BytesMut::new();
    let mut total: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        total += chunk.len() as u64;
        if buf.len() < cap {
            let room = cap - buf.len();
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
    }

    debug!(file_name = %file_name, size = total, "received file field");
    Ok(FileUpload {
        file_name,
        declared_size: total,
        body: bytes_stream(buf.freeze()),
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    debug!(error = %err, %status, "malformed multipart body");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(status, "validation_error", "file exceeds the 10 MiB limit")
    } else {
        AppError::bad_request("validation_error", err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_ignore_garbage_numbers() {
        let q: ListNotesQuery = ListParams {
            course_id: Some("COMP182".into()),
            limit: Some("abc".into()),
            offset: Some(" 20 ".into()),
        }
        .into();
        assert_eq!(q.course_id.as_deref(), Some("COMP182"));
        assert_eq!(q.limit, None);
        assert_eq!(q.offset, Some(20));
    }

    #[test]
    fn note_id_must_be_a_uuid() {
        assert!(parse_note_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_note_id(&id.to_string()).unwrap(), id);
    }
}
