pub mod auth_service;
pub mod google;
pub mod note_service;
pub mod token_service;
