//! `streamflow` command-line interface.
//!
//! - `streamflow serve`: HTTP API with reconciliation and graceful shutdown.
//! - `streamflow plan`: print the ffmpeg argument vector for a broadcast
//!   (keys redacted) without spawning anything.
//!
//! Every option can also come from a `STREAMFLOW_*` environment variable or
//! a `.env` file.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by main.rs
use dotenvy as _;
use tokio as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;

pub use commands::{Commands, FfmpegArgs, PlanArgs, ServeArgs};
pub use error::CliError;
pub use parser::Cli;
