//! Note metadata persistence.
//!
//! `NoteRepository` is the relational side of a note; `SqliteNoteRepository`
//! implements it over an sqlx SQLite pool. `list_by_owner` and `delete` are
//! scoped to one owner; `find_by_id` is not, and callers check ownership.

use crate::models::note::Note;
use async_trait::async_trait;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Schema applied on startup and by `--migrate`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id BLOB PRIMARY KEY NOT NULL,
    owner_email TEXT NOT NULL,
    title TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 255),
    course_id TEXT NOT NULL CHECK (length(course_id) BETWEEN 1 AND 50),
    file_name TEXT NOT NULL,
    storage_key TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_owner_created ON notes (owner_email, created_at);
CREATE INDEX IF NOT EXISTS idx_notes_owner_course ON notes (owner_email, course_id)
"#;

const NOTE_COLUMNS: &str = "id, owner_email, title, course_id, file_name, storage_key, \
                            size_bytes, content_type, created_at, updated_at";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn insert(&self, note: &Note) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Note>>;

    /// Newest first. `course_id` filters by exact match when present.
    async fn list_by_owner(
        &self,
        owner: &str,
        course_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Note>>;

    /// Delete the row only if it belongs to `owner`. Returns whether a row
    /// was removed.
    async fn delete(&self, id: Uuid, owner: &str) -> RepositoryResult<bool>;

    async fn ping(&self) -> RepositoryResult<()>;
}

#[derive(Clone)]
pub struct SqliteNoteRepository {
    pool: SqlitePool,
}

impl SqliteNoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema statement by statement.
    pub async fn migrate(&self) -> RepositoryResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn insert(&self, note: &Note) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO notes (id, owner_email, title, course_id, file_name, storage_key,
                                size_bytes, content_type, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(note.id)
        .bind(&note.owner_email)
        .bind(&note.title)
        .bind(&note.course_id)
        .bind(&note.file_name)
        .bind(&note.storage_key)
        .bind(note.size_bytes)
        .bind(&note.content_type)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(note_id = %note.id, owner = %note.owner_email, "note row inserted");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {} FROM notes WHERE id = ?",
            NOTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(note)
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        course_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Note>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM notes WHERE owner_email = ",
            NOTE_COLUMNS
        ));
        builder.push_bind(owner);

        if let Some(course_id) = course_id {
            builder.push(" AND course_id = ");
            builder.push_bind(course_id);
        }

        // rowid breaks ties between notes created within the same instant
        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let notes: Vec<Note> = builder.build_query_as().fetch_all(&self.pool).await?;
        debug!(owner, ?course_id, count = notes.len(), "notes listed");
        Ok(notes)
    }

    async fn delete(&self, id: Uuid, owner: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND owner_email = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    /// One connection keeps every query on the same in-memory database.
    async fn memory_repository() -> SqliteNoteRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = SqliteNoteRepository::new(pool);
        repo.migrate().await.unwrap();
        repo
    }

    fn note(owner: &str, course: &str, minutes_ago: i64) -> Note {
        let id = Uuid::new_v4();
        let created = Utc::now() - Duration::minutes(minutes_ago);
        Note {
            id,
            owner_email: owner.to_string(),
            title: format!("notes {}", minutes_ago),
            course_id: course.to_string(),
            file_name: "n.pdf".to_string(),
            storage_key: format!("notes/{}/{}/n.pdf", owner, id),
            size_bytes: 42,
            content_type: "application/pdf".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let repo = memory_repository().await;
        let n = note("a@rice.edu", "MATH101", 0);
        repo.insert(&n).await.unwrap();

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found, n);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_id_ignores_owner() {
        let repo = memory_repository().await;
        let n = note("a@rice.edu", "MATH101", 0);
        repo.insert(&n).await.unwrap();

        let found = repo.find_by_id(n.id).await.unwrap().unwrap();
        assert_eq!(found.owner_email, "a@rice.edu");
        assert!(repo.list_by_owner("b@rice.edu", None, 50, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_scoped_filtered_and_newest_first() {
        let repo = memory_repository().await;
        let old = note("a@rice.edu", "MATH101", 30);
        let new = note("a@rice.edu", "COMP140", 5);
        let other = note("b@rice.edu", "MATH101", 1);
        for n in [&old, &new, &other] {
            repo.insert(n).await.unwrap();
        }

        let all = repo.list_by_owner("a@rice.edu", None, 50, 0).await.unwrap();
        assert_eq!(
            all.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![new.id, old.id]
        );

        let math = repo
            .list_by_owner("a@rice.edu", Some("MATH101"), 50, 0)
            .await
            .unwrap();
        assert_eq!(math.len(), 1);
        assert_eq!(math[0].id, old.id);

        let page = repo.list_by_owner("a@rice.edu", None, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, old.id);
    }

    #[tokio::test]
    async fn delete_requires_matching_owner() {
        let repo = memory_repository().await;
        let n = note("a@rice.edu", "MATH101", 0);
        repo.insert(&n).await.unwrap();

        assert!(!repo.delete(n.id, "b@rice.edu").await.unwrap());
        assert!(repo.delete(n.id, "a@rice.edu").await.unwrap());
        assert!(!repo.delete(n.id, "a@rice.edu").await.unwrap());
    }

    #[tokio::test]
    async fn ping_succeeds() {
        memory_repository().await.ping().await.unwrap();
    }
}
