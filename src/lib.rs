//! Rice Notes: PDF lecture notes for university students.
//!
//! Users sign in with a Google account from the allowed email domain and
//! receive a signed session cookie. Notes are PDFs kept in a blob store with
//! their metadata in SQLite.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stores;
