//! Process runtime for streamflow.
//!
//! OS-level adapters for the `streamflow-core` ports:
//!
//! - [`DirectBackend`]: ffmpeg as a child process, SIGKILL (or SIGTERM with
//!   grace) on stop, exit observed by waiting on the child.
//! - [`Pm2Cli`] + [`DelegatedBackend`]: jobs run under pm2, exits observed
//!   by polling `pm2 jlist`.
//! - [`spawn_reconciler`]: periodic `StreamSupervisor::reconcile`.
//! - [`build_backend`]: pick a backend from `SupervisorSettings`.

#![deny(unsafe_code)]

mod delegated;
mod direct;
mod factory;
mod pm2;
pub mod process;
mod reconciler;

pub use delegated::DelegatedBackend;
pub use direct::DirectBackend;
pub use factory::build_backend;
pub use pm2::{Pm2Cli, parse_jlist, start_args};
pub use reconciler::spawn_reconciler;
