//! HTTP request handlers.
//!
//! Handlers are thin wrappers that delegate to `StreamSupervisor` and
//! `UploadStore`.

pub mod events;
pub mod streams;
pub mod upload;
