//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use streamflow_axum::bootstrap::{DEFAULT_PORT, DEFAULT_UPLOAD_LIMIT, DEFAULT_UPLOADS_DIR};
use streamflow_axum::{CorsConfig, ServerConfig};
use streamflow_core::settings::{
    DEFAULT_FFMPEG_PATH, DEFAULT_MANAGER_POLL_INTERVAL_MS, DEFAULT_PM2_NAMESPACE,
    DEFAULT_PM2_PATH, DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_STOP_TIMEOUT_SECS,
};
use streamflow_core::{
    BackendKind, DEFAULT_FFMPEG_LOG_LEVEL, DEFAULT_JOB_PREFIX, ManagerSettings,
    SupervisorSettings,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Print the ffmpeg command for a broadcast without running it
    Plan(PlanArgs),
}

/// ffmpeg options shared by `serve` and `plan`.
#[derive(Debug, Clone, Args)]
pub struct FfmpegArgs {
    /// ffmpeg executable
    #[arg(long = "ffmpeg", env = "STREAMFLOW_FFMPEG", default_value = DEFAULT_FFMPEG_PATH)]
    pub ffmpeg_path: PathBuf,

    /// ffmpeg -loglevel
    #[arg(long, env = "STREAMFLOW_FFMPEG_LOG_LEVEL", default_value = DEFAULT_FFMPEG_LOG_LEVEL)]
    pub ffmpeg_log_level: String,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "STREAMFLOW_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory for uploaded videos
    #[arg(long, env = "STREAMFLOW_UPLOADS_DIR", default_value = DEFAULT_UPLOADS_DIR)]
    pub uploads_dir: PathBuf,

    /// Allowed CORS origin (repeatable, comma-separated in env). Any origin
    /// is allowed when none is given.
    #[arg(
        long = "allow-origin",
        env = "STREAMFLOW_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,

    /// Maximum upload size in bytes
    #[arg(long, env = "STREAMFLOW_UPLOAD_LIMIT", default_value_t = DEFAULT_UPLOAD_LIMIT)]
    pub upload_limit: u64,

    /// Process backend: `direct` (child processes) or `delegated` (pm2)
    #[arg(long, env = "STREAMFLOW_BACKEND", default_value = "direct")]
    pub backend: BackendKind,

    #[command(flatten)]
    pub ffmpeg: FfmpegArgs,

    /// Direct backend: SIGTERM and wait this long before SIGKILL (0 = kill at once)
    #[arg(long, env = "STREAMFLOW_STOP_GRACE_MS", default_value_t = 0)]
    pub stop_grace_ms: u64,

    /// Seconds a stop may take before termination is re-issued
    #[arg(long, env = "STREAMFLOW_STOP_TIMEOUT_SECS", default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
    pub stop_timeout_secs: u64,

    /// Seconds between reconciliation passes
    #[arg(
        long,
        env = "STREAMFLOW_RECONCILE_INTERVAL_SECS",
        default_value_t = DEFAULT_RECONCILE_INTERVAL_SECS
    )]
    pub reconcile_interval_secs: u64,

    /// pm2 executable (delegated backend)
    #[arg(long = "pm2", env = "STREAMFLOW_PM2", default_value = DEFAULT_PM2_PATH)]
    pub pm2_path: PathBuf,

    /// pm2 process name prefix (delegated backend)
    #[arg(long, env = "STREAMFLOW_JOB_PREFIX", default_value = DEFAULT_JOB_PREFIX)]
    pub job_prefix: String,

    /// pm2 namespace (delegated backend)
    #[arg(long, env = "STREAMFLOW_PM2_NAMESPACE", default_value = DEFAULT_PM2_NAMESPACE)]
    pub pm2_namespace: String,

    /// How often pm2 is polled for exits, in milliseconds (delegated backend)
    #[arg(
        long,
        env = "STREAMFLOW_PM2_POLL_INTERVAL_MS",
        default_value_t = DEFAULT_MANAGER_POLL_INTERVAL_MS
    )]
    pub pm2_poll_interval_ms: u64,
}

impl ServeArgs {
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            backend: self.backend,
            ffmpeg_path: self.ffmpeg.ffmpeg_path.clone(),
            ffmpeg_log_level: self.ffmpeg.ffmpeg_log_level.clone(),
            stop_grace_ms: self.stop_grace_ms,
            stop_timeout_secs: self.stop_timeout_secs,
            reconcile_interval_secs: self.reconcile_interval_secs,
            manager: ManagerSettings {
                pm2_path: self.pm2_path.clone(),
                job_prefix: self.job_prefix.clone(),
                namespace: self.pm2_namespace.clone(),
                poll_interval_ms: self.pm2_poll_interval_ms,
            },
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        let cors = if self.allowed_origins.is_empty() {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(self.allowed_origins.clone())
        };
        ServerConfig {
            port: self.port,
            uploads_dir: self.uploads_dir.clone(),
            cors,
            upload_limit: self.upload_limit,
            supervisor: self.supervisor_settings(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Video file to loop
    #[arg(long)]
    pub source: PathBuf,

    /// YouTube stream key
    #[arg(long, required_unless_present = "facebook")]
    pub youtube: Option<String>,

    /// Facebook stream key
    #[arg(long)]
    pub facebook: Option<String>,

    #[command(flatten)]
    pub ffmpeg: FfmpegArgs,
}
