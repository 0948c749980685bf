use crate::alerts::api::{create_alert, delete_alert, set_alert_enabled};
use crate::alerts::detector::AlertsUnseenEvent;
use crate::alerts::poller::{publish_unseen, run_alerts_panel};
use crate::alerts::types::{
    Alert, AlertDeleteArgs, AlertDeleteResult, AlertToggleArgs, AlertsPanelSession,
    AlertsPanelStopResult, CreateAlertArgs, StartAlertsPanelArgs,
};
use crate::commands::normalize_instance_id;
use crate::error::AppError;
use crate::state::{AlertPanelHandle, AppState};
use chrono::Utc;
use tauri::{AppHandle, State};
use tokio_util::sync::CancellationToken;
use tracing::warn;

async fn shutdown_panel(handle: AlertPanelHandle) {
    handle.cancellation_token.cancel();
    let _ = handle.join_handle.await;
}

#[tauri::command]
pub async fn start_alerts_panel(
    app: AppHandle,
    state: State<'_, AppState>,
    panel_id: String,
    args: Option<StartAlertsPanelArgs>,
) -> Result<AlertsPanelSession, AppError> {
    let panel_id = normalize_instance_id(&panel_id, "panelId")?;
    let config = args.unwrap_or_default().normalize()?;

    let existing_handle = {
        let mut panels = state.alert_panels.lock().await;
        panels.remove(&panel_id)
    };
    if let Some(handle) = existing_handle {
        shutdown_panel(handle).await;
    }

    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    let runtime = state.alerts.clone();
    let task_panel_id = panel_id.clone();
    let runtime_config = config.clone();

    let join_handle = tauri::async_runtime::spawn(async move {
        run_alerts_panel(app, task_panel_id, runtime, runtime_config, task_token).await;
    });

    let replaced = {
        let mut panels = state.alert_panels.lock().await;
        panels.insert(
            panel_id.clone(),
            AlertPanelHandle {
                cancellation_token,
                join_handle,
            },
        )
    };
    if let Some(handle) = replaced {
        shutdown_panel(handle).await;
    }

    Ok(AlertsPanelSession::from_config(&panel_id, &config))
}

#[tauri::command]
pub async fn stop_alerts_panel(
    state: State<'_, AppState>,
    panel_id: String,
) -> Result<AlertsPanelStopResult, AppError> {
    let panel_id = normalize_instance_id(&panel_id, "panelId")?;
    let existing_handle = {
        let mut panels = state.alert_panels.lock().await;
        panels.remove(&panel_id)
    };

    let stopped = if let Some(handle) = existing_handle {
        shutdown_panel(handle).await;
        true
    } else {
        false
    };

    Ok(AlertsPanelStopResult { stopped })
}

#[tauri::command]
pub async fn alerts_list(state: State<'_, AppState>) -> Result<Vec<Alert>, AppError> {
    Ok(state.alerts.alerts())
}

#[tauri::command]
pub async fn alerts_unseen(state: State<'_, AppState>) -> Result<AlertsUnseenEvent, AppError> {
    Ok(AlertsUnseenEvent::from(state.alerts.current_unseen()))
}

#[tauri::command]
pub async fn alerts_panel_opened(
    state: State<'_, AppState>,
) -> Result<AlertsUnseenEvent, AppError> {
    Ok(AlertsUnseenEvent::from(state.alerts.open_panel()))
}

#[tauri::command]
pub async fn alerts_panel_closed(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<AlertsUnseenEvent, AppError> {
    let unseen = state
        .alerts
        .close_panel(Utc::now(), |unseen| publish_unseen(&app, unseen));
    Ok(AlertsUnseenEvent::from(unseen))
}

#[tauri::command]
pub async fn alert_toggle(
    state: State<'_, AppState>,
    args: AlertToggleArgs,
) -> Result<Alert, AppError> {
    let runtime = &state.alerts;
    let pending = runtime.book.lock().apply_toggle(args.id, args.enabled)?;

    if let Err(error) =
        set_alert_enabled(&runtime.client, &runtime.api_base_url, args.id, args.enabled).await
    {
        warn!(alert_id = args.id, %error, "alert toggle failed, rolling back");
        runtime.book.lock().rollback(pending);
        return Err(error);
    }

    runtime
        .alerts()
        .into_iter()
        .find(|alert| alert.id == args.id)
        .ok_or_else(|| AppError::InvalidArgument(format!("alert {} not found", args.id)))
}

#[tauri::command]
pub async fn alert_delete(
    state: State<'_, AppState>,
    args: AlertDeleteArgs,
) -> Result<AlertDeleteResult, AppError> {
    let runtime = &state.alerts;
    let pending = runtime.book.lock().apply_delete(args.id)?;

    if let Err(error) = delete_alert(&runtime.client, &runtime.api_base_url, args.id).await {
        warn!(alert_id = args.id, %error, "alert delete failed, rolling back");
        runtime.book.lock().rollback(pending);
        return Err(error);
    }

    Ok(AlertDeleteResult { deleted: true })
}

#[tauri::command]
pub async fn alert_create(
    state: State<'_, AppState>,
    args: CreateAlertArgs,
) -> Result<Alert, AppError> {
    let runtime = &state.alerts;
    let new_alert = args.normalize()?;
    let (provisional, pending) = runtime.book.lock().apply_create(&new_alert, Utc::now());

    match create_alert(&runtime.client, &runtime.api_base_url, &new_alert).await {
        Ok(created) => {
            runtime
                .book
                .lock()
                .confirm_created(provisional.id, created.clone());
            Ok(created)
        }
        Err(error) => {
            warn!(symbol = %new_alert.symbol, %error, "alert create failed, rolling back");
            runtime.book.lock().rollback(pending);
            Err(error)
        }
    }
}
