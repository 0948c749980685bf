mod alerts;
mod boundary;
mod commands;
mod config;
mod db;
mod error;
mod logging;
mod notify;
mod poll;
mod prices;
mod state;
mod telemetry;
#[cfg(test)]
mod test_support;

use commands::{
    alerts::{
        alert_create, alert_delete, alert_toggle, alerts_list, alerts_panel_closed,
        alerts_panel_opened, alerts_unseen, start_alerts_panel, stop_alerts_panel,
    },
    errors::errors_report,
    health::health,
    notifications::alerts_notify,
    price_feeds::{price_snapshot, start_price_feeds, stop_price_feeds},
    sound_settings::{alert_sound_settings_get, alert_sound_settings_save},
};
use config::HostConfig;
use db::initialize_pool;
use logging::setup_logging;
use notify::dispatcher::{NotificationDispatcher, TauriAlertSurface};
use notify::persistence::load_alert_sound_settings;
use reqwest::Client;
use state::{AppState, SessionContext};
use std::sync::Arc;
use std::time::Duration;
use tauri::Manager;
use telemetry::forwarder::ErrorForwarder;
use telemetry::panic::install_panic_hook;

const HTTP_TIMEOUT_SECS: u64 = 10;

pub fn run() {
    let config = HostConfig::from_env();
    setup_logging(&config.log_level);

    let session = SessionContext::new();
    tracing::info!(
        session_id = %session.session_id,
        api_base_url = %config.api_base_url,
        collector = config.collector_url.is_some(),
        "starting alertdesk host"
    );

    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(move |app| {
            let app_handle = app.handle().clone();
            let db_filename = config.db_filename.clone();
            let (db_pool, sound_settings) = tauri::async_runtime::block_on(async move {
                let pool = initialize_pool(&app_handle, &db_filename).await?;
                let settings = load_alert_sound_settings(&pool).await?;
                Ok::<_, error::AppError>((pool, settings))
            })?;

            let http_client = Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?;
            let forwarder = Arc::new(ErrorForwarder::new(
                http_client.clone(),
                config.collector_url.clone(),
                session.session_id.clone(),
                config.error_dedup_window,
            ));
            install_panic_hook(Arc::clone(&forwarder));

            let surface = Arc::new(TauriAlertSurface::new(app.handle().clone()));
            let dispatcher = Arc::new(NotificationDispatcher::new(
                surface,
                Arc::clone(&forwarder),
            ));

            app.manage(AppState::new(
                config.clone(),
                session.clone(),
                http_client,
                db_pool,
                sound_settings,
                forwarder,
                dispatcher,
            ));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            health,
            start_price_feeds,
            stop_price_feeds,
            price_snapshot,
            start_alerts_panel,
            stop_alerts_panel,
            alerts_list,
            alerts_panel_opened,
            alerts_panel_closed,
            alerts_unseen,
            alert_toggle,
            alert_delete,
            alert_create,
            alerts_notify,
            errors_report,
            alert_sound_settings_get,
            alert_sound_settings_save
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
