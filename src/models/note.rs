//! Represents an uploaded note (one PDF file) and its metadata.

use crate::stores::blob::ByteStream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The only content type accepted for uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A single note record.
///
/// The `Note` struct stores metadata only; the file bytes live in the blob
/// store under `storage_key`. Field names on the wire follow the frontend's
/// existing contract, hence the serde renames.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Note {
    /// Generated at creation, never changes.
    pub id: Uuid,

    /// Email of the authenticated user who uploaded the note.
    #[serde(rename = "user_email")]
    pub owner_email: String,

    pub title: String,

    pub course_id: String,

    /// Original filename of the uploaded file.
    pub file_name: String,

    /// Blob store key, `notes/{owner}/{id}/{file_name}`.
    #[serde(rename = "file_path")]
    pub storage_key: String,

    #[serde(rename = "file_size")]
    pub size_bytes: i64,

    pub content_type: String,

    #[serde(rename = "uploaded_at")]
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Response body for a freshly created note.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteSummary {
    pub id: Uuid,
    pub title: String,
    pub course_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Note> for NoteSummary {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            course_id: note.course_id.clone(),
            file_name: note.file_name.clone(),
            file_size: note.size_bytes,
            content_type: note.content_type.clone(),
            uploaded_at: note.created_at,
        }
    }
}

/// An uploaded file as handed to the orchestrator.
///
/// `body` is consumed exactly once, by the blob store.
pub struct FileUpload {
    pub file_name: String,
    pub declared_size: u64,
    pub body: ByteStream,
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Input to `NoteService::create_note`.
#[derive(Debug)]
pub struct NewNote {
    pub owner: String,
    pub title: String,
    pub course_id: String,
    pub file: Option<FileUpload>,
}

/// Filters and pagination for listing a user's notes, as received from the
/// client. Values are clamped by `NotesPage::clamp` before use.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListNotesQuery {
    pub course_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
