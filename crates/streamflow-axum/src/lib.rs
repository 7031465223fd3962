#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use hyper as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;
pub mod uploads;

pub use bootstrap::{
    AxumContext, CorsConfig, ServerConfig, bootstrap, bootstrap_with_backend, start_server,
};
pub use error::HttpError;
pub use routes::create_router;
pub use sse::SseBroadcaster;
pub use state::AppState;
pub use uploads::{UploadError, UploadStore};
