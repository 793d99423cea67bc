//! Application-level error type returned by every Tauri command.
//!
//! Commands return `Result<T, AppError>`; the error is serialized to a
//! human-readable string for the IPC boundary.

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Camera acquisition failed or was denied.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Clipboard write failed; surfaced as a transient notification,
    /// never retried.
    #[error("clipboard write failed: {0}")]
    ClipboardWriteFailed(String),

    /// A scan session is already starting or active.
    #[error("a scan session is already active")]
    ScannerBusy,

    /// Anything else that went wrong inside a command.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Recover a typed `AppError` from an `anyhow` chain, falling back to
    /// `Internal` with the rendered message.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal(other.to_string()),
        }
    }
}

/// Tauri IPC requires return values to implement `Serialize`.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_anyhow_preserves_typed_variant() {
        let err: anyhow::Error = AppError::ScannerBusy.into();
        assert!(matches!(AppError::from_anyhow(err), AppError::ScannerBusy));
    }

    #[test]
    fn from_anyhow_wraps_foreign_errors() {
        let err = anyhow::anyhow!("boom");
        match AppError::from_anyhow(err) {
            AppError::Internal(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
