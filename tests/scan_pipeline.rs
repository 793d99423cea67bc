//! End-to-end tests for the capture/decode loop using scripted camera and
//! decoder collaborators, plus the decode-event -> store hand-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use qrlens_lib::camera::{CameraError, Frame, FrameSource};
use qrlens_lib::classify::ContentType;
use qrlens_lib::history::HistoryStore;
use qrlens_lib::models::ScanResult;
use qrlens_lib::scanner::decode::Decode;
use qrlens_lib::scanner::loop_worker::{scan_loop, ScanEvent};

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// Camera fake: configurable open outcome, blank frames, and a shared
/// release counter to catch double-release faults.
struct ScriptedSource {
    fail_open: Option<CameraError>,
    open: bool,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn working(closes: Arc<AtomicUsize>) -> Self {
        Self {
            fail_open: None,
            open: false,
            closes,
        }
    }

    fn broken(err: CameraError, closes: Arc<AtomicUsize>) -> Self {
        Self {
            fail_open: Some(err),
            open: false,
            closes,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<(), CameraError> {
        if let Some(err) = self.fail_open.take() {
            return Err(err);
        }
        self.open = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::Stream("not open".to_string()));
        }
        Ok(Frame {
            width: 32,
            height: 32,
            luma: vec![255; 32 * 32],
        })
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Decoder fake driven by a per-frame script; `None` entries are frames
/// with no QR payload. An exhausted script keeps yielding `None`.
struct ScriptedDecoder {
    script: Vec<Option<String>>,
    cursor: usize,
}

impl ScriptedDecoder {
    fn new(script: Vec<Option<String>>) -> Self {
        Self { script, cursor: 0 }
    }

    fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl Decode for ScriptedDecoder {
    fn decode(&mut self, _frame: &Frame) -> Option<String> {
        let result = self.script.get(self.cursor).cloned().flatten();
        self.cursor += 1;
        result
    }
}

async fn next_event(rx: &mut mpsc::Receiver<ScanEvent>) -> Option<ScanEvent> {
    timeout(EVENT_WAIT, rx.recv())
        .await
        .expect("timed out waiting for scan event")
}

#[tokio::test]
async fn first_decode_ends_the_session() {
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::working(closes.clone()));
    let decoder = Box::new(ScriptedDecoder::new(vec![
        None,
        None,
        Some("https://example.com".to_string()),
    ]));
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    let handle = tokio::spawn(scan_loop(source, decoder, tx, token, 0));

    assert!(matches!(
        next_event(&mut rx).await,
        Some(ScanEvent::CameraReady)
    ));
    match next_event(&mut rx).await {
        Some(ScanEvent::Decoded(data)) => assert_eq!(data, "https://example.com"),
        other => panic!("expected decoded payload, got {other:?}"),
    }

    // One-shot: the loop exits on its own and releases the camera once.
    timeout(EVENT_WAIT, handle).await.unwrap().unwrap();
    assert!(next_event(&mut rx).await.is_none());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loop_keeps_scanning_across_many_empty_frames() {
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::working(closes.clone()));
    let mut script: Vec<Option<String>> = vec![None; 6];
    script.push(Some("mailto:team@example.com".to_string()));
    let decoder = Box::new(ScriptedDecoder::new(script));
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    let handle = tokio::spawn(scan_loop(source, decoder, tx, token, 0));

    assert!(matches!(
        next_event(&mut rx).await,
        Some(ScanEvent::CameraReady)
    ));
    // The capture step hands the camera and decoder back every tick; a
    // long run of undecoded frames must still end in a clean decode.
    match next_event(&mut rx).await {
        Some(ScanEvent::Decoded(data)) => assert_eq!(data, "mailto:team@example.com"),
        other => panic!("expected decoded payload, got {other:?}"),
    }

    timeout(EVENT_WAIT, handle).await.unwrap().unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_stops_the_loop_and_releases_the_camera() {
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::working(closes.clone()));
    let decoder = Box::new(ScriptedDecoder::silent());
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    let handle = tokio::spawn(scan_loop(source, decoder, tx, token.clone(), 0));

    assert!(matches!(
        next_event(&mut rx).await,
        Some(ScanEvent::CameraReady)
    ));

    token.cancel();
    timeout(EVENT_WAIT, handle).await.unwrap().unwrap();

    // Cancelling again is a no-op; the camera was released exactly once.
    token.cancel();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(next_event(&mut rx).await.is_none());
}

#[tokio::test]
async fn acquisition_failure_surfaces_and_loop_exits() {
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::broken(CameraError::NoCamera, closes.clone()));
    let decoder = Box::new(ScriptedDecoder::silent());
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    let handle = tokio::spawn(scan_loop(source, decoder, tx, token, 0));

    match next_event(&mut rx).await {
        Some(ScanEvent::CameraFailed(CameraError::NoCamera)) => {}
        other => panic!("expected no-camera failure, got {other:?}"),
    }

    timeout(EVENT_WAIT, handle).await.unwrap().unwrap();
    // The source never opened, so there was nothing to release.
    assert_eq!(closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preview_frames_flow_while_scanning() {
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::working(closes.clone()));
    let decoder = Box::new(ScriptedDecoder::new(vec![
        None,
        Some("wifi:S:Net;P:pass;;".to_string()),
    ]));
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();

    // Preview on every tick so the first undecoded frame produces one.
    let handle = tokio::spawn(scan_loop(source, decoder, tx, token, 1));

    assert!(matches!(
        next_event(&mut rx).await,
        Some(ScanEvent::CameraReady)
    ));
    match next_event(&mut rx).await {
        Some(ScanEvent::Preview(png)) => assert!(!png.is_empty()),
        other => panic!("expected preview frame, got {other:?}"),
    }
    match next_event(&mut rx).await {
        Some(ScanEvent::Decoded(data)) => assert_eq!(data, "wifi:S:Net;P:pass;;"),
        other => panic!("expected decoded payload, got {other:?}"),
    }

    timeout(EVENT_WAIT, handle).await.unwrap().unwrap();
}

#[test]
fn releasing_an_already_released_source_is_a_noop() {
    let closes = Arc::new(AtomicUsize::new(0));
    let mut source = ScriptedSource::working(closes.clone());
    source.open().unwrap();

    source.close();
    source.close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn decoded_payload_lands_in_the_store_classified() {
    let store = HistoryStore::new();
    let result = ScanResult::from_payload("https://example.com");
    let snapshot = store.append(result.clone()).await;

    assert_eq!(result.content_type, ContentType::Url);
    assert_eq!(snapshot.history[0].data, "https://example.com");
    assert_eq!(snapshot.current, Some(result));
}

#[tokio::test]
async fn camera_failure_leaves_history_and_current_alone() {
    let store = HistoryStore::new();
    let existing = ScanResult::from_payload("tel:+15550100");
    store.append(existing.clone()).await;

    // Simulate a failed session start: a broken camera produces no decode
    // events, so the store is never touched past the session-start reset.
    let closes = Arc::new(AtomicUsize::new(0));
    let source = Box::new(ScriptedSource::broken(
        CameraError::Acquisition("permission denied".to_string()),
        closes,
    ));
    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    tokio::spawn(scan_loop(
        source,
        Box::new(ScriptedDecoder::silent()),
        tx,
        token,
        0,
    ));

    match next_event(&mut rx).await {
        Some(ScanEvent::CameraFailed(CameraError::Acquisition(reason))) => {
            assert_eq!(reason, "permission denied");
        }
        other => panic!("expected acquisition failure, got {other:?}"),
    }

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.history, vec![existing.clone()]);
    assert_eq!(snapshot.current, Some(existing));
}
