use serde::{Deserialize, Serialize};

/// Why a broadcast job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitReason {
    /// The process exited on its own with a status code.
    Exited,
    /// The process was ended by a signal.
    Killed,
    /// The external process manager reports the job as no longer running.
    ManagerStopped,
    /// The backend stopped listing the job and no exit was ever observed.
    Vanished,
    /// The exit could not be determined.
    Unknown,
}

/// Outcome of a broadcast job, delivered once per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitReport {
    pub reason: ExitReason,
    pub code: Option<i32>,
    pub signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ExitReport {
    #[must_use]
    pub const fn exited(code: Option<i32>) -> Self {
        Self {
            reason: ExitReason::Exited,
            code,
            signal: None,
            detail: None,
        }
    }

    #[must_use]
    pub const fn killed(signal: Option<i32>) -> Self {
        Self {
            reason: ExitReason::Killed,
            code: None,
            signal,
            detail: None,
        }
    }

    pub fn manager_stopped(status: impl Into<String>) -> Self {
        Self {
            reason: ExitReason::ManagerStopped,
            code: None,
            signal: None,
            detail: Some(status.into()),
        }
    }

    #[must_use]
    pub fn vanished() -> Self {
        Self {
            reason: ExitReason::Vanished,
            code: None,
            signal: None,
            detail: Some("no longer listed by backend".to_string()),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            reason: ExitReason::Unknown,
            code: None,
            signal: None,
            detail: Some(detail.into()),
        }
    }

    /// Exit code 0.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_zero_code() {
        assert!(ExitReport::exited(Some(0)).is_success());
        assert!(!ExitReport::exited(Some(1)).is_success());
        assert!(!ExitReport::killed(Some(9)).is_success());
        assert!(!ExitReport::vanished().is_success());
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_detail() {
        let json = serde_json::to_value(ExitReport::killed(Some(9))).unwrap();
        assert_eq!(json["reason"], "killed");
        assert_eq!(json["signal"], 9);
        assert!(json.get("detail").is_none());

        let json = serde_json::to_value(ExitReport::manager_stopped("errored")).unwrap();
        assert_eq!(json["reason"], "managerStopped");
        assert_eq!(json["detail"], "errored");
    }
}
