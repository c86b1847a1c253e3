pub mod auth_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod note_handlers;
pub mod session;
