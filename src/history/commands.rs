use tauri::State;
use tauri_plugin_opener::OpenerExt;

use crate::error::AppError;
use crate::history::HistorySnapshot;
use crate::AppState;

#[tauri::command]
pub async fn get_history(state: State<'_, AppState>) -> Result<HistorySnapshot, AppError> {
    Ok(state.history.snapshot().await)
}

#[tauri::command]
pub async fn clear_history(state: State<'_, AppState>) -> Result<HistorySnapshot, AppError> {
    Ok(state.history.clear().await)
}

/// Write text to the system clipboard. Failures surface to the caller
/// once; there is no retry.
#[tauri::command]
pub async fn copy_to_clipboard(text: String) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || -> Result<(), AppError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|err| AppError::ClipboardWriteFailed(err.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|err| AppError::ClipboardWriteFailed(err.to_string()))
    })
    .await
    .map_err(|err| AppError::Internal(err.to_string()))?
}

/// Open a scanned payload with the platform's default handler.
///
/// Only URL, Email and Phone payloads are openable; for everything else
/// this is a no-op and returns `false`.
#[tauri::command]
pub async fn open_result(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    result_id: String,
) -> Result<bool, AppError> {
    let result = state
        .history
        .find(&result_id)
        .await
        .ok_or_else(|| AppError::Internal(format!("unknown scan result: {result_id}")))?;

    if !result.openable() {
        return Ok(false);
    }

    app.opener()
        .open_url(result.data, None::<&str>)
        .map_err(|err| AppError::Internal(err.to_string()))?;
    Ok(true)
}
