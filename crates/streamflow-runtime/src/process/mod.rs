//! Child process helpers shared by the backends.

mod logs;
mod shutdown;

pub use logs::spawn_line_logger;
pub use shutdown::terminate_child;

use std::process::ExitStatus;

use streamflow_core::ExitReport;

/// Convert an OS exit status into an [`ExitReport`].
pub fn exit_report(status: ExitStatus) -> ExitReport {
    if let Some(code) = status.code() {
        return ExitReport::exited(Some(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitReport::killed(status.signal())
    }
    #[cfg(not(unix))]
    {
        ExitReport::killed(None)
    }
}
