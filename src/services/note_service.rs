//! NoteService: create, read, list and delete notes across the blob store
//! and the metadata store.
//!
//! There is no transaction spanning both backends, so writes are ordered to
//! fail safe:
//! - create uploads the blob first and inserts the row second; if the insert
//!   fails the blob is deleted once, best-effort.
//! - delete removes the row first and the blob second; a blob that fails to
//!   delete is logged and otherwise ignored.
//!
//! Ownership is enforced here. A note owned by someone else is reported
//! exactly like a missing one.

use crate::{
    models::note::{FileUpload, ListNotesQuery, NewNote, Note, NoteSummary, PDF_CONTENT_TYPE},
    stores::{
        blob::{BlobError, BlobStore, storage_key},
        metadata::{NoteRepository, RepositoryError},
    },
};
use chrono::Utc;
use std::{path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Largest accepted upload, 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_COURSE_ID_LEN: usize = 50;
/// Longest accepted file name in bytes. Keeps `notes/{owner}/{id}/{name}`
/// well inside the blob key limit.
pub const MAX_FILE_NAME_LEN: usize = 255;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Lifetime of download links handed out by `download_url`.
pub const DOWNLOAD_LINK_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("{0}")]
    Validation(String),
    #[error("note not found")]
    NotFound,
    #[error("storage upload failed: {0}")]
    StorageUpload(#[source] BlobError),
    #[error("download link failed: {0}")]
    StorageLink(#[source] BlobError),
    #[error("metadata write failed: {0}")]
    MetadataWrite(#[source] RepositoryError),
    #[error("metadata read failed: {0}")]
    MetadataRead(#[source] RepositoryError),
}

pub type NoteResult<T> = Result<T, NoteError>;

/// Limit and offset actually applied to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotesPage {
    pub limit: i64,
    pub offset: i64,
}

impl NotesPage {
    /// `limit` must fall in `1..=100`, otherwise 50 is used. Negative or
    /// missing offsets become 0.
    pub fn clamp(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 && l <= MAX_PAGE_SIZE => l,
            _ => DEFAULT_PAGE_SIZE,
        };
        let offset = match offset {
            Some(o) if o >= 0 => o,
            _ => 0,
        };
        Self { limit, offset }
    }
}

#[derive(Clone)]
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn repository(&self) -> &Arc<dyn NoteRepository> {
        &self.repo
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Validate, upload, then record a new note.
    ///
    /// Validation failures never reach either store. An upload failure
    /// leaves no row behind; an insert failure triggers one compensating
    /// delete of the uploaded key.
    pub async fn create_note(&self, new: NewNote) -> NoteResult<NoteSummary> {
        let NewNote {
            owner,
            title,
            course_id,
            file,
        } = new;
        let file = validate_new_note(&owner, &title, &course_id, file)?;

        let id = Uuid::new_v4();
        let key = storage_key(&owner, &id, &file.file_name);
        let size = file.declared_size;

        if let Err(err) = self
            .blobs
            .upload(&key, file.body, PDF_CONTENT_TYPE, size)
            .await
        {
            error!(error = %err, %key, owner = %owner, "upload failed, no metadata written");
            return Err(NoteError::StorageUpload(err));
        }

        let now = Utc::now();
        let note = Note {
            id,
            owner_email: owner,
            title,
            course_id,
            file_name: file.file_name,
            storage_key: key,
            size_bytes: size as i64,
            content_type: PDF_CONTENT_TYPE.to_string(),
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repo.insert(&note).await {
            error!(error = %err, note_id = %note.id, "metadata insert failed, removing uploaded object");
            if let Err(cleanup_err) = self.blobs.delete(&note.storage_key).await {
                warn!(
                    error = %cleanup_err,
                    key = %note.storage_key,
                    "compensating delete failed, object orphaned"
                );
            }
            return Err(NoteError::MetadataWrite(err));
        }

        info!(note_id = %note.id, owner = %note.owner_email, size, "note created");
        Ok(NoteSummary::from(&note))
    }

    /// Fetch a note owned by `owner`.
    pub async fn get_note(&self, id: Uuid, owner: &str) -> NoteResult<Note> {
        match self.repo.find_by_id(id).await {
            Ok(Some(note)) if note.owner_email == owner => Ok(note),
            Ok(Some(_)) => {
                warn!(note_id = %id, owner, "note requested by a non-owner");
                Err(NoteError::NotFound)
            }
            Ok(None) => {
                debug!(note_id = %id, "note not found");
                Err(NoteError::NotFound)
            }
            Err(err) => {
                error!(error = %err, note_id = %id, "failed to read note");
                Err(NoteError::MetadataRead(err))
            }
        }
    }

    /// The owner's notes, newest first.
    pub async fn list_notes(&self, owner: &str, query: ListNotesQuery) -> NoteResult<Vec<Note>> {
        let page = NotesPage::clamp(query.limit, query.offset);
        let course_id = query.course_id.as_deref().filter(|c| !c.is_empty());

        self.repo
            .list_by_owner(owner, course_id, page.limit, page.offset)
            .await
            .map_err(|err| {
                error!(error = %err, owner, "failed to list notes");
                NoteError::MetadataRead(err)
            })
    }

    /// Delete a note and, best-effort, its stored file.
    ///
    /// Losing a concurrent delete race yields `NotFound`.
    pub async fn delete_note(&self, id: Uuid, owner: &str) -> NoteResult<()> {
        let note = self.get_note(id, owner).await?;

        match self.repo.delete(id, owner).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(note_id = %id, "note already deleted");
                return Err(NoteError::NotFound);
            }
            Err(err) => {
                error!(error = %err, note_id = %id, "failed to delete note row");
                return Err(NoteError::MetadataWrite(err));
            }
        }

        if let Err(err) = self.blobs.delete(&note.storage_key).await {
            warn!(error = %err, key = %note.storage_key, "failed to delete stored file");
        }

        info!(note_id = %id, owner, "note deleted");
        Ok(())
    }

    /// A short-lived download link for a note owned by `owner`.
    pub async fn download_url(&self, id: Uuid, owner: &str) -> NoteResult<String> {
        let note = self.get_note(id, owner).await?;
        self.blobs
            .presigned_url(&note.storage_key, DOWNLOAD_LINK_TTL)
            .await
            .map_err(|err| {
                error!(error = %err, key = %note.storage_key, "failed to create download link");
                NoteError::StorageLink(err)
            })
    }
}

/// Synchronous input checks, run before any I/O.
fn validate_new_note(
    owner: &str,
    title: &str,
    course_id: &str,
    file: Option<FileUpload>,
) -> NoteResult<FileUpload> {
    if owner.trim().is_empty() {
        return Err(NoteError::Validation("owner is required".into()));
    }
    if title.trim().is_empty() {
        return Err(NoteError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(NoteError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    if course_id.trim().is_empty() {
        return Err(NoteError::Validation("course_id is required".into()));
    }
    if course_id.chars().count() > MAX_COURSE_ID_LEN {
        return Err(NoteError::Validation(format!(
            "course_id must be at most {} characters",
            MAX_COURSE_ID_LEN
        )));
    }

    let Some(file) = file else {
        return Err(NoteError::Validation("file is required".into()));
    };
    if file.declared_size == 0 {
        return Err(NoteError::Validation("file is empty".into()));
    }
    if file.declared_size > MAX_UPLOAD_BYTES {
        return Err(NoteError::Validation("file exceeds the 10 MiB limit".into()));
    }
    if file.file_name.len() > MAX_FILE_NAME_LEN {
        return Err(NoteError::Validation(format!(
            "file name must be at most {} bytes",
            MAX_FILE_NAME_LEN
        )));
    }
    if !is_safe_file_name(&file.file_name) {
        return Err(NoteError::Validation("invalid file name".into()));
    }
    let is_pdf = Path::new(&file.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(NoteError::Validation("only PDF files are accepted".into()));
    }

    Ok(file)
}

/// File names become the last segment of the storage key, so they must not
/// be `.` or `..` or contain separators or control characters.
fn is_safe_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
}
