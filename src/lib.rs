pub mod camera;
pub mod classify;
pub mod error;
pub mod history;
pub mod models;
pub mod scanner;
pub mod utils;

use history::commands::{clear_history, copy_to_clipboard, get_history, open_result};
use history::HistoryStore;
use scanner::commands::{get_scanner_state, retry_camera, start_scan, stop_scan};
use scanner::ScannerController;
use tauri::{Emitter, Manager};

pub struct AppState {
    pub scanner: ScannerController,
    pub history: HistoryStore,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("QRLens starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let history = HistoryStore::new();
            let scanner = ScannerController::new(app.handle().clone(), history.clone());

            // Forward store snapshots to the webview; the store itself
            // knows nothing about rendering.
            let mut history_rx = history.subscribe();
            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                while history_rx.changed().await.is_ok() {
                    let snapshot = history_rx.borrow_and_update().clone();
                    let _ = app_handle.emit("history-changed", snapshot);
                }
            });

            app.manage(AppState { scanner, history });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_scanner_state,
            start_scan,
            stop_scan,
            retry_camera,
            get_history,
            clear_history,
            copy_to_clipboard,
            open_result,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
