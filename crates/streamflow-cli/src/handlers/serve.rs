//! Serve command handler.

use anyhow::Result;
use tracing::info;

use streamflow_axum::start_server;

use crate::commands::ServeArgs;
use crate::error::CliError;

/// Validate settings, then run the HTTP API until Ctrl-C.
pub async fn execute(args: &ServeArgs) -> Result<()> {
    let config = args.server_config();
    config.supervisor.validate().map_err(CliError::from)?;

    info!(
        port = config.port,
        backend = %config.supervisor.backend,
        uploads_dir = %config.uploads_dir.display(),
        "Starting streamflow"
    );
    println!();
    println!("  streamflow API:  http://localhost:{}", config.port);
    println!("  Uploads stored:  {}", config.uploads_dir.display());
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    start_server(config)
        .await
        .map_err(|e| CliError::Server(format!("{e:#}")))?;
    Ok(())
}
