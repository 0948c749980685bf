use crate::state::AppState;
use crate::telemetry::record::ErrorRecord;
use chrono::Utc;
use serde_json::Value;
use tauri::State;

#[tauri::command]
pub fn errors_report(state: State<'_, AppState>, payload: Option<Value>) {
    let payload = payload.unwrap_or(Value::Null);
    let forwarder = state.forwarder();
    let record = ErrorRecord::from_render_payload(&payload, forwarder.session_id(), Utc::now());
    forwarder.report(record);
}
