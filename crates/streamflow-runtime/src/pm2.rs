//! `pm2` command-line client implementing [`ProcessManager`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use streamflow_core::{ManagedJob, ManagedJobSpec, ManagedStatus, ManagerError, ProcessManager};

/// Talks to pm2 by running its CLI.
#[derive(Debug, Clone)]
pub struct Pm2Cli {
    binary: PathBuf,
}

impl Pm2Cli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `pm2 <args>` and return stdout. `subject` names the job for
    /// error messages.
    async fn run(&self, args: Vec<OsString>, subject: &str) -> Result<String, ManagerError> {
        let verb = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(pm2 = %self.binary.display(), %verb, %subject, "Running pm2");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{} {}", stderr.trim(), stdout.trim());
        if combined.to_ascii_lowercase().contains("not found") {
            return Err(ManagerError::NotFound(subject.to_string()));
        }
        Err(ManagerError::Command(format!(
            "pm2 {verb} {subject} exited with {}: {}",
            output.status,
            combined.trim()
        )))
    }
}

/// Build the `pm2 start` argument vector for a job.
pub fn start_args(spec: &ManagedJobSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "start".into(),
        spec.program.clone().into_os_string(),
        "--name".into(),
        spec.name.clone().into(),
        "--namespace".into(),
        spec.namespace.clone().into(),
        "--interpreter".into(),
        "none".into(),
        // A crash must surface as an exit, not a silent restart.
        "--no-autorestart".into(),
        "--".into(),
    ];
    args.extend(spec.args.iter().cloned());
    args
}

#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    pm2_env: JlistEnv,
}

#[derive(Debug, Default, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    exit_code: Option<i32>,
}

/// Parse `pm2 jlist` output.
///
/// pm2 may print banners or warnings before the JSON array, so parsing
/// starts at the first `[`. Empty output means no processes.
pub fn parse_jlist(raw: &str) -> Result<Vec<ManagedJob>, ManagerError> {
    let Some(start) = raw.find('[') else {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Err(ManagerError::Parse("no JSON array in pm2 jlist output".into()));
    };
    let entries: Vec<JlistEntry> =
        serde_json::from_str(raw[start..].trim_end()).map_err(|e| ManagerError::Parse(e.to_string()))?;

    Ok(entries
        .into_iter()
        .map(|entry| ManagedJob {
            name: entry.name,
            namespace: entry.pm2_env.namespace,
            status: entry
                .pm2_env
                .status
                .as_deref()
                .map_or(ManagedStatus::Other, ManagedStatus::parse),
            pid: entry.pid.filter(|pid| *pid != 0),
            exit_code: entry.pm2_env.exit_code,
        })
        .collect())
}

#[async_trait]
impl ProcessManager for Pm2Cli {
    async fn start(&self, spec: &ManagedJobSpec) -> Result<(), ManagerError> {
        self.run(start_args(spec), &spec.name).await.map(|_| ())
    }

    async fn stop(&self, name: &str) -> Result<(), ManagerError> {
        self.run(vec!["stop".into(), name.into()], name)
            .await
            .map(|_| ())
    }

    async fn delete(&self, name: &str) -> Result<(), ManagerError> {
        self.run(vec!["delete".into(), name.into()], name)
            .await
            .map(|_| ())
    }

    async fn list(&self) -> Result<Vec<ManagedJob>, ManagerError> {
        let raw = self.run(vec!["jlist".into()], "*").await?;
        parse_jlist(&raw)
    }
}
