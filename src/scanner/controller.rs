use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Runtime, Wry};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::camera::{self, CameraError, FrameSource, NokhwaCamera};
use crate::error::AppError;
use crate::history::HistoryStore;
use crate::models::ScanResult;

use super::decode::{Decode, RqrrDecoder};
use super::loop_worker::{scan_loop, ScanEvent};
use super::state::{ScannerState, ScannerStatus};

#[derive(Serialize, Clone)]
struct ScannerStateChangedEvent {
    state: ScannerState,
}

#[derive(Serialize, Clone)]
struct ScanResultEvent {
    result: ScanResult,
}

#[derive(Serialize, Clone)]
struct PreviewFrameEvent {
    png: String,
}

#[derive(Serialize, Clone)]
struct ToastEvent {
    title: String,
    description: String,
    variant: &'static str,
}

struct ScanWorker {
    loop_handle: JoinHandle<()>,
    pump_handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Produces the camera and decoder collaborators for one scan session.
type SessionFactory = Arc<dyn Fn() -> (Box<dyn FrameSource>, Box<dyn Decode>) + Send + Sync>;

/// Owns the camera session state machine and the per-session worker
/// tasks. The camera is held by at most one session at a time; stop and
/// teardown are idempotent.
///
/// Start and stop serialize on the worker slot lock, so the state
/// transition and the worker installation are always observed together.
pub struct ScannerController<R: Runtime = Wry> {
    state: Arc<Mutex<ScannerState>>,
    history: HistoryStore,
    app_handle: AppHandle<R>,
    worker: Arc<Mutex<Option<ScanWorker>>>,
    session_factory: SessionFactory,
    preview_every_ticks: u32,
}

impl<R: Runtime> Clone for ScannerController<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            history: self.history.clone(),
            app_handle: self.app_handle.clone(),
            worker: self.worker.clone(),
            session_factory: self.session_factory.clone(),
            preview_every_ticks: self.preview_every_ticks,
        }
    }
}

impl<R: Runtime> ScannerController<R> {
    pub fn new(app_handle: AppHandle<R>, history: HistoryStore) -> Self {
        let debug_mode = std::env::var("QRLENS_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            state: Arc::new(Mutex::new(ScannerState::new())),
            history,
            app_handle,
            worker: Arc::new(Mutex::new(None)),
            session_factory: Arc::new(|| {
                (
                    Box::new(NokhwaCamera::new()) as Box<dyn FrameSource>,
                    Box::new(RqrrDecoder) as Box<dyn Decode>,
                )
            }),
            preview_every_ticks: if debug_mode { 1 } else { 3 },
        }
    }

    #[cfg(test)]
    fn with_session_factory(
        app_handle: AppHandle<R>,
        history: HistoryStore,
        session_factory: SessionFactory,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScannerState::new())),
            history,
            app_handle,
            worker: Arc::new(Mutex::new(None)),
            session_factory,
            preview_every_ticks: 0,
        }
    }

    pub async fn get_state(&self) -> ScannerState {
        self.state.lock().await.clone()
    }

    /// Start a scan session: Idle -> Starting, camera acquisition and the
    /// decode loop kick off in the background. Clears the current result
    /// (new session) but never the history.
    pub async fn start_scan(&self) -> Result<ScannerState> {
        // The worker slot lock is held for the whole start sequence, so a
        // concurrent stop cannot interleave between the Starting
        // transition and the worker installation.
        let mut worker_guard = self.worker.lock().await;

        let session_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().await;
            if state.status == ScannerStatus::Error {
                let reason = state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "camera unavailable".to_string());
                return Err(AppError::CameraUnavailable(reason).into());
            }
            if !state.can_start() {
                return Err(AppError::ScannerBusy.into());
            }
            state.begin_session(session_id.clone(), Utc::now());
        }

        self.history.start_new_session().await;

        // A finished one-shot session leaves its worker behind; join it
        // so the camera is fully released before being acquired again.
        if let Some(old) = worker_guard.take() {
            old.cancel_token.cancel();
            if let Err(err) = old.loop_handle.await {
                error!("previous scan loop failed to join: {err}");
            }
            if let Err(err) = old.pump_handle.await {
                error!("previous scan event pump failed to join: {err}");
            }
        }

        let cancel_token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel::<ScanEvent>(8);
        let (source, decoder) = (self.session_factory)();

        let loop_handle = tokio::spawn(scan_loop(
            source,
            decoder,
            events_tx,
            cancel_token.clone(),
            self.preview_every_ticks,
        ));
        let pump_handle = tokio::spawn(pump_events(
            events_rx,
            self.state.clone(),
            self.history.clone(),
            self.app_handle.clone(),
        ));

        *worker_guard = Some(ScanWorker {
            loop_handle,
            pump_handle,
            cancel_token,
        });
        drop(worker_guard);

        info!("scan session {session_id} starting");
        self.emit_state_changed().await;
        Ok(self.get_state().await)
    }

    /// Stop the running session and release the camera. Idempotent:
    /// stopping an idle controller is a no-op, and the camera can never
    /// be released twice.
    pub async fn stop_scan(&self) -> Result<ScannerState> {
        {
            // Same lock order as start_scan (worker slot, then state), so
            // the Idle transition can never clobber a session that a
            // concurrent start is still installing.
            let mut worker_guard = self.worker.lock().await;
            if let Some(worker) = worker_guard.take() {
                worker.cancel_token.cancel();
                if let Err(err) = worker.loop_handle.await {
                    error!("scan loop task failed to join: {err}");
                }
                if let Err(err) = worker.pump_handle.await {
                    error!("scan event pump failed to join: {err}");
                }
            }

            self.state.lock().await.finish();
        }

        self.emit_state_changed().await;
        Ok(self.get_state().await)
    }

    /// Revalidate camera availability after an acquisition failure.
    /// Returns to Idle (start re-enabled) only if a device is present.
    pub async fn retry_camera(&self) -> Result<ScannerState> {
        {
            let state = self.state.lock().await;
            if state.status != ScannerStatus::Error {
                return Ok(state.clone());
            }
        }

        let devices = tokio::task::spawn_blocking(camera::probe)
            .await
            .map_err(|err| anyhow::anyhow!("camera probe worker failed: {err}"))??;

        {
            let mut state = self.state.lock().await;
            if devices > 0 {
                info!("camera detected again ({devices} device(s)), re-enabling scanning");
                state.reset();
            } else {
                state.fail("no camera found".to_string());
            }
        }

        self.emit_state_changed().await;
        Ok(self.get_state().await)
    }

    async fn emit_state_changed(&self) {
        let state = self.state.lock().await.clone();
        emit_scanner_state(&self.app_handle, state);
    }
}

/// Consumes decode-loop events for one session. Decode events arrive one
/// at a time, in frame order; the first decoded payload completes the
/// session (one-shot scanning) and the pump exits.
async fn pump_events<R: Runtime>(
    mut events: mpsc::Receiver<ScanEvent>,
    state: Arc<Mutex<ScannerState>>,
    history: HistoryStore,
    app_handle: AppHandle<R>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::CameraReady => {
                let snapshot = {
                    let mut guard = state.lock().await;
                    guard.activate();
                    guard.clone()
                };
                emit_scanner_state(&app_handle, snapshot);
            }
            ScanEvent::CameraFailed(err) => {
                let description = match &err {
                    CameraError::NoCamera => {
                        "No camera was found on this device.".to_string()
                    }
                    other => format!("Unable to access camera: {other}. Please check permissions."),
                };
                let snapshot = {
                    let mut guard = state.lock().await;
                    guard.fail(err.to_string());
                    guard.clone()
                };
                emit_scanner_state(&app_handle, snapshot);
                emit_toast(&app_handle, "Camera Error", &description, "destructive");
                break;
            }
            ScanEvent::Preview(png) => {
                let _ = app_handle.emit("preview-frame", PreviewFrameEvent { png });
            }
            ScanEvent::Decoded(data) => {
                let result = ScanResult::from_payload(data);
                info!(
                    "scanned {} payload {}",
                    result.content_type.as_str(),
                    result.id
                );

                history.append(result.clone()).await;

                let snapshot = {
                    let mut guard = state.lock().await;
                    guard.finish();
                    guard.clone()
                };

                let _ = app_handle.emit("scan-result", ScanResultEvent { result });
                emit_scanner_state(&app_handle, snapshot);
                emit_toast(
                    &app_handle,
                    "QR Code Scanned!",
                    "Successfully scanned QR code",
                    "default",
                );
                break;
            }
        }
    }
}

fn emit_scanner_state<R: Runtime>(app_handle: &AppHandle<R>, state: ScannerState) {
    let _ = app_handle.emit("scanner-state-changed", ScannerStateChangedEvent { state });
}

fn emit_toast<R: Runtime>(
    app_handle: &AppHandle<R>,
    title: &str,
    description: &str,
    variant: &'static str,
) {
    let _ = app_handle.emit(
        "toast",
        ToastEvent {
            title: title.to_string(),
            description: description.to_string(),
            variant,
        },
    );
}
