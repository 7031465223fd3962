//! Termination of `tokio::process::Child` with optional SIGTERM grace.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::timeout;

/// End a child process and reap it.
///
/// With a zero `grace` the child is killed immediately (SIGKILL). Otherwise
/// SIGTERM is sent first and SIGKILL follows if the child is still running
/// after `grace`. Always waits for the exit status so no zombie is left.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if !grace.is_zero() {
            if let Some(status) = sigterm_and_wait(child, grace).await? {
                return Ok(status);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    // Child::kill is SIGKILL on Unix and waits for the process.
    child.kill().await?;
    child.wait().await
}

/// Returns `Some(status)` if the child exited within `grace`.
#[cfg(unix)]
async fn sigterm_and_wait(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(pid) = child.id() else {
        // Already reaped.
        return child.wait().await.map(Some);
    };
    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await.map(Some);
        }
        return Err(io::Error::other(e));
    }

    match timeout(grace, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => Ok(None),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use tokio::process::Command;

    #[tokio::test]
    async fn zero_grace_kills_immediately() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = terminate_child(&mut child, Duration::ZERO).await.unwrap();
        assert_eq!(status.signal(), Some(9));
    }

    #[tokio::test]
    async fn grace_lets_sigterm_end_the_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = terminate_child(&mut child, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status.signal(), Some(15));
    }

    #[tokio::test]
    async fn escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; exec sleep 30")
            .spawn()
            .unwrap();
        // Give the shell time to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = terminate_child(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(status.signal(), Some(9));
    }

    #[tokio::test]
    async fn handles_already_exited_child() {
        let mut child = Command::new("true").spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = terminate_child(&mut child, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(status.success());
    }
}
