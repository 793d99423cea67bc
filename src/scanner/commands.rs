use tauri::State;

use crate::error::AppError;
use crate::scanner::{ScannerController, ScannerState};
use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> ScannerController {
    state.scanner.clone()
}

#[tauri::command]
pub async fn get_scanner_state(state: State<'_, AppState>) -> Result<ScannerState, AppError> {
    let controller = controller_from_state(&state);
    Ok(controller.get_state().await)
}

#[tauri::command]
pub async fn start_scan(state: State<'_, AppState>) -> Result<ScannerState, AppError> {
    let controller = controller_from_state(&state);
    controller.start_scan().await.map_err(AppError::from_anyhow)
}

#[tauri::command]
pub async fn stop_scan(state: State<'_, AppState>) -> Result<ScannerState, AppError> {
    let controller = controller_from_state(&state);
    controller.stop_scan().await.map_err(AppError::from_anyhow)
}

#[tauri::command]
pub async fn retry_camera(state: State<'_, AppState>) -> Result<ScannerState, AppError> {
    let controller = controller_from_state(&state);
    controller
        .retry_camera()
        .await
        .map_err(AppError::from_anyhow)
}
