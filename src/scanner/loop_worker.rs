use std::io::Cursor;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraError, Frame, FrameSource};

use super::decode::Decode;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const FRAME_INTERVAL_MS: u64 = 200;

/// Events the decode loop reports back to the controller, delivered one
/// at a time over an mpsc channel so no two callbacks ever overlap.
#[derive(Debug)]
pub enum ScanEvent {
    /// Camera acquired, loop running.
    CameraReady,
    /// Acquisition failed; the loop has already exited.
    CameraFailed(CameraError),
    /// Throttled viewfinder frame, PNG as base64.
    Preview(String),
    /// First successful decode; the loop stops after sending this.
    Decoded(String),
}

struct CaptureOutcome {
    decoded: Option<String>,
    preview: Option<String>,
}

/// Capture + decode loop for one scan session.
///
/// Owns the frame source for its whole lifetime; the hardware is released
/// exactly once, on every exit path. The loop ends on the first successful
/// decode (one-shot scanning) or on cancellation.
pub async fn scan_loop(
    source: Box<dyn FrameSource>,
    decoder: Box<dyn Decode>,
    events: mpsc::Sender<ScanEvent>,
    cancel_token: CancellationToken,
    preview_every_ticks: u32,
) {
    // Acquisition can block on a permission prompt, so it runs off the
    // async runtime.
    let (source, opened) = match tokio::task::spawn_blocking(move || {
        let mut source = source;
        let outcome = source.open();
        (source, outcome)
    })
    .await
    {
        Ok(pair) => pair,
        Err(err) => {
            log_error!("camera open worker join failed: {err}");
            let _ = events
                .send(ScanEvent::CameraFailed(CameraError::Acquisition(
                    "camera worker panicked".to_string(),
                )))
                .await;
            return;
        }
    };

    if let Err(err) = opened {
        log_warn!("camera acquisition failed: {err}");
        let _ = events.send(ScanEvent::CameraFailed(err)).await;
        release(source).await;
        return;
    }

    if events.send(ScanEvent::CameraReady).await.is_err() {
        // Controller went away before the loop even started.
        release(source).await;
        return;
    }

    let mut source = Some(source);
    let mut decoder = Some(decoder);
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks = ticks.wrapping_add(1);
                let want_preview = preview_every_ticks != 0 && ticks % preview_every_ticks == 0;

                // Source and decoder move into the blocking worker and
                // back out; both slots are refilled below unless the
                // worker panicked (which drops the camera anyway).
                let (Some(mut src), Some(mut dec)) = (source.take(), decoder.take()) else {
                    log_error!("capture state lost, ending scan loop");
                    break;
                };
                let step = tokio::task::spawn_blocking(move || {
                    let outcome = capture_step(src.as_mut(), dec.as_mut(), want_preview);
                    (src, dec, outcome)
                })
                .await;

                let (src, dec, outcome) = match step {
                    Ok(triple) => triple,
                    Err(err) => {
                        log_error!("capture worker join failed: {err}");
                        return;
                    }
                };
                source = Some(src);
                decoder = Some(dec);

                match outcome {
                    Ok(CaptureOutcome { decoded: Some(data), .. }) => {
                        log_info!("QR payload decoded ({} bytes)", data.len());
                        let _ = events.send(ScanEvent::Decoded(data)).await;
                        break;
                    }
                    Ok(CaptureOutcome { preview: Some(png), .. }) => {
                        if events.send(ScanEvent::Preview(png)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        // Transient frame failure; keep scanning.
                        log_warn!("frame capture failed: {err}");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop cancelled");
                break;
            }
        }
    }

    if let Some(source) = source.take() {
        release(source).await;
    }
    log_info!("scan loop shutting down");
}

fn capture_step(
    source: &mut dyn FrameSource,
    decoder: &mut dyn Decode,
    want_preview: bool,
) -> Result<CaptureOutcome, CameraError> {
    let frame = source.grab()?;

    if let Some(data) = decoder.decode(&frame) {
        return Ok(CaptureOutcome {
            decoded: Some(data),
            preview: None,
        });
    }

    // Preview encoding failures are cosmetic only.
    let preview = if want_preview {
        encode_preview(&frame).ok()
    } else {
        None
    };

    Ok(CaptureOutcome {
        decoded: None,
        preview,
    })
}

fn encode_preview(frame: &Frame) -> Result<String> {
    let img = image::GrayImage::from_raw(frame.width, frame.height, frame.luma.clone())
        .context("frame buffer does not match its dimensions")?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("png encode failed")?;
    Ok(BASE64.encode(png))
}

async fn release(source: Box<dyn FrameSource>) {
    let _ = tokio::task::spawn_blocking(move || {
        let mut source = source;
        source.close();
    })
    .await;
}
