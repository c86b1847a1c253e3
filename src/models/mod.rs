//! Core data models for the notes service.
//!
//! Notes map to the `notes` table via `sqlx::FromRow` and serialize as JSON
//! via `serde`. Session types describe identities coming out of the OAuth flow.

pub mod note;
pub mod session;
