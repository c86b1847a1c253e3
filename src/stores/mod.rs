//! Backing stores: blob payloads and note metadata.

pub mod blob;
pub mod local;
pub mod metadata;
pub mod s3;
