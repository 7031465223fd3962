//! Axum server bootstrap, the composition root.
//!
//! The only place where the backend, supervisor, SSE broadcaster and upload
//! store are wired together for the web adapter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use streamflow_core::{
    BackendKind, BroadcastBackend, StreamEventEmitter, StreamSupervisor, SupervisorDeps,
    SupervisorSettings,
};
use streamflow_runtime::{build_backend, spawn_reconciler};

use crate::sse::SseBroadcaster;
use crate::uploads::UploadStore;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPLOADS_DIR: &str = "./uploads";
/// 4 GiB.
pub const DEFAULT_UPLOAD_LIMIT: u64 = 4 * 1024 * 1024 * 1024;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Where uploaded videos are stored. Created on bootstrap.
    pub uploads_dir: PathBuf,
    pub cors: CorsConfig,
    /// Maximum accepted upload body in bytes.
    pub upload_limit: u64,
    pub supervisor: SupervisorSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            cors: CorsConfig::default(),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            supervisor: SupervisorSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    pub supervisor: StreamSupervisor,
    pub uploads: UploadStore,
    /// SSE broadcaster, also the supervisor's event emitter.
    pub sse: Arc<SseBroadcaster>,
    pub upload_limit: u64,
}

/// Build the backend named by the settings and wire everything around it.
pub async fn bootstrap(config: &ServerConfig) -> Result<AxumContext> {
    let backend = build_backend(&config.supervisor).context("Invalid supervisor settings")?;
    bootstrap_with_backend(config, backend).await
}

/// Like [`bootstrap`] with a caller-supplied backend.
pub async fn bootstrap_with_backend(
    config: &ServerConfig,
    backend: Arc<dyn BroadcastBackend>,
) -> Result<AxumContext> {
    let uploads = UploadStore::open(&config.uploads_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to prepare uploads directory {}",
                config.uploads_dir.display()
            )
        })?;

    let sse = Arc::new(SseBroadcaster::with_defaults());
    let deps = SupervisorDeps::new(backend, config.supervisor.command_builder())
        .with_events(sse.clone() as Arc<dyn StreamEventEmitter>)
        .with_stop_timeout(config.supervisor.stop_timeout());
    let supervisor = StreamSupervisor::new(deps);

    info!(
        backend = %supervisor.backend_kind(),
        ffmpeg = %config.supervisor.ffmpeg_path.display(),
        uploads_dir = %uploads.dir().display(),
        "Axum bootstrap complete"
    );

    Ok(AxumContext {
        supervisor,
        uploads,
        sse,
        upload_limit: config.upload_limit,
    })
}

/// Run the web server until Ctrl-C / SIGTERM.
///
/// Reconciliation runs alongside. On shutdown the direct backend stops every
/// job (its children would die with us anyway); pm2 jobs are left running
/// and adopted by the next start.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let ctx = bootstrap(&config).await?;
    let supervisor = ctx.supervisor.clone();

    let cancel = CancellationToken::new();
    let reconciler = spawn_reconciler(
        supervisor.clone(),
        config.supervisor.reconcile_interval(),
        cancel.clone(),
    );

    let app = crate::routes::create_router(ctx, &config.cors);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("streamflow web server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Err(e) = reconciler.await {
        warn!("Reconciler task ended abnormally: {e}");
    }
    drain(&supervisor, config.supervisor.stop_timeout()).await;
    Ok(())
}

async fn drain(supervisor: &StreamSupervisor, timeout: Duration) {
    match supervisor.backend_kind() {
        BackendKind::Direct => {
            let ids: Vec<_> = supervisor.snapshots().into_iter().map(|s| s.id).collect();
            let stopped = supervisor.stop_all().await;
            info!(stopped, "Stopping broadcasts before exit");
            let waits = join_all(ids.iter().map(|id| supervisor.wait_terminated(id)));
            if tokio::time::timeout(timeout, waits).await.is_err() {
                warn!("Timed out waiting for broadcasts to exit");
            }
        }
        BackendKind::Delegated => {
            info!(
                running = supervisor.registered(),
                "Leaving pm2-managed broadcasts running"
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
