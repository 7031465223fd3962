//! Backend selection from settings.

use std::sync::Arc;

use tracing::info;

use streamflow_core::{BackendKind, BroadcastBackend, SettingsError, SupervisorSettings};

use crate::{DelegatedBackend, DirectBackend, Pm2Cli};

/// Build the backend named by `settings.backend`.
pub fn build_backend(
    settings: &SupervisorSettings,
) -> Result<Arc<dyn BroadcastBackend>, SettingsError> {
    settings.validate()?;
    let backend: Arc<dyn BroadcastBackend> = match settings.backend {
        BackendKind::Direct => {
            info!(grace = ?settings.stop_grace(), "Using direct ffmpeg backend");
            Arc::new(DirectBackend::new(settings.stop_grace()))
        }
        BackendKind::Delegated => {
            let manager = &settings.manager;
            info!(
                pm2 = %manager.pm2_path.display(),
                namespace = %manager.namespace,
                prefix = %manager.job_prefix,
                "Using pm2-delegated backend"
            );
            Arc::new(DelegatedBackend::new(
                Arc::new(Pm2Cli::new(&manager.pm2_path)),
                manager.naming()?,
                manager.namespace.clone(),
                manager.poll_interval(),
            ))
        }
    };
    Ok(backend)
}
