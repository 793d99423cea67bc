use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScannerStatus {
    Idle,
    Starting,
    Active,
    Error,
}

impl Default for ScannerStatus {
    fn default() -> Self {
        ScannerStatus::Idle
    }
}

/// Snapshot of the camera session state machine.
///
/// `Error` is sticky: once acquisition fails, `can_start` stays false
/// until camera availability is revalidated and `reset` is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerState {
    pub status: ScannerStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for ScannerState {
    fn default() -> Self {
        Self {
            status: ScannerStatus::Idle,
            session_id: None,
            started_at: None,
            last_error: None,
        }
    }
}

impl ScannerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_start(&self) -> bool {
        self.status == ScannerStatus::Idle
    }

    /// Idle -> Starting. Clears any stale error from a prior session.
    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Utc>) {
        *self = Self {
            status: ScannerStatus::Starting,
            session_id: Some(session_id),
            started_at: Some(started_at),
            last_error: None,
        };
    }

    /// Starting -> Active, once the camera is streaming.
    pub fn activate(&mut self) {
        if self.status == ScannerStatus::Starting {
            self.status = ScannerStatus::Active;
        }
    }

    /// Any running state -> Error. Records the failure reason and drops
    /// the session metadata; the camera was never (or is no longer) held.
    pub fn fail(&mut self, reason: String) {
        *self = Self {
            status: ScannerStatus::Error,
            session_id: None,
            started_at: None,
            last_error: Some(reason),
        };
    }

    /// Starting/Active -> Idle. Used both for user stop and for the
    /// automatic stop after the first successful decode.
    pub fn finish(&mut self) {
        if self.status != ScannerStatus::Error {
            *self = Self::default();
        }
    }

    /// Back to a clean Idle, clearing a sticky error. Only called after
    /// camera availability has been revalidated.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
