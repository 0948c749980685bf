use crate::notify::dispatcher::NotifyResult;
use crate::notify::sanitize::NotificationRequest;
use crate::state::AppState;
use serde_json::Value;
use tauri::State;

#[tauri::command]
pub fn alerts_notify(state: State<'_, AppState>, payload: Option<Value>) -> NotifyResult {
    let payload = payload.unwrap_or(Value::Null);
    let request = NotificationRequest::from_payload(&payload);
    state.alerts.dispatcher.notify(&request)
}
