use crate::{
    services::{auth_service::AuthService, note_service::NoteService, token_service::TokenService},
    stores::local::LocalBlobStore,
};
use std::sync::Arc;

/// Values the HTTP layer needs beyond the services themselves.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Where the browser lands after a successful login.
    pub frontend_url: String,
    pub allowed_origins: Vec<String>,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<NoteService>,
    pub auth: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    /// Present only when notes are kept on local disk; serves signed links.
    pub local_files: Option<Arc<LocalBlobStore>>,
    pub settings: Arc<HttpSettings>,
}
