//! Camera collaborator boundary.
//!
//! The decode loop only ever sees the [`FrameSource`] trait, so the
//! hardware backend can be swapped for a scripted source in tests. The
//! production backend is `nokhwa` over the platform's native capture API.

use log::warn;
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// No capture device is present at all, as opposed to a device that
    /// exists but failed to open.
    #[error("no camera found")]
    NoCamera,

    /// The device exists but could not be opened (permissions, busy, ...).
    #[error("camera access failed: {0}")]
    Acquisition(String),

    /// A failure after the stream was up.
    #[error("camera stream error: {0}")]
    Stream(String),
}

/// One grayscale frame. Raw luma bytes, row-major, `width * height` long.
///
/// Frames carry their own buffer instead of an `image` type so the capture
/// backend and the decoder never have to agree on an image crate version.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

/// A source of camera frames, exclusively owned by one scan session.
///
/// `close` must be idempotent: closing an already-closed source is a no-op.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CameraError>;
    fn grab(&mut self) -> Result<Frame, CameraError>;
    fn close(&mut self);
}

/// Count the capture devices currently visible to the platform backend.
/// Used to revalidate availability after an `Error` state.
pub fn probe() -> Result<usize, CameraError> {
    let devices =
        nokhwa::query(ApiBackend::Auto).map_err(|err| CameraError::Acquisition(err.to_string()))?;
    Ok(devices.len())
}

/// Default capture backend: first enumerated device, grayscale frames.
pub struct NokhwaCamera {
    camera: Option<Camera>,
}

impl NokhwaCamera {
    pub fn new() -> Self {
        Self { camera: None }
    }
}

impl Default for NokhwaCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for NokhwaCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.camera.is_some() {
            return Ok(());
        }

        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|err| CameraError::Acquisition(err.to_string()))?;
        if devices.is_empty() {
            return Err(CameraError::NoCamera);
        }

        let requested =
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(0), requested)
            .map_err(|err| CameraError::Acquisition(err.to_string()))?;
        camera
            .open_stream()
            .map_err(|err| CameraError::Acquisition(err.to_string()))?;

        self.camera = Some(camera);
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| CameraError::Stream("camera is not open".to_string()))?;

        let buffer = camera
            .frame()
            .map_err(|err| CameraError::Stream(err.to_string()))?;
        let gray = buffer
            .decode_image::<LumaFormat>()
            .map_err(|err| CameraError::Stream(err.to_string()))?;

        Ok(Frame {
            width: gray.width(),
            height: gray.height(),
            luma: gray.into_raw(),
        })
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                warn!("failed to stop camera stream: {err}");
            }
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.close();
    }
}
