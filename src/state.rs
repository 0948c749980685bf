use crate::alerts::detector::AlertSession;
use crate::alerts::poller::AlertsRuntime;
use crate::alerts::store::AlertBook;
use crate::config::HostConfig;
use crate::notify::audio::AlertSoundSettings;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::prices::feeds::FeedEndpoints;
use crate::prices::reconciler::PriceReconciler;
use crate::telemetry::forwarder::ErrorForwarder;
use chrono::{DateTime, Utc};
use reqwest::Client;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PriceViewHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tauri::async_runtime::JoinHandle<()>,
    pub reconciler: Arc<parking_lot::Mutex<PriceReconciler>>,
}

pub struct AlertPanelHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tauri::async_runtime::JoinHandle<()>,
}

pub struct AppState {
    pub started_at: Instant,
    pub session: SessionContext,
    pub config: HostConfig,
    pub http_client: Client,
    pub db_pool: SqlitePool,
    pub price_views: Mutex<HashMap<String, PriceViewHandle>>,
    pub alert_panels: Mutex<HashMap<String, AlertPanelHandle>>,
    pub alerts: AlertsRuntime,
}

impl AppState {
    pub fn new(
        config: HostConfig,
        session: SessionContext,
        http_client: Client,
        db_pool: SqlitePool,
        sound_settings: AlertSoundSettings,
        forwarder: Arc<ErrorForwarder>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let alerts = AlertsRuntime {
            client: http_client.clone(),
            api_base_url: config.api_base_url.clone(),
            book: Arc::new(parking_lot::Mutex::new(AlertBook::default())),
            session: Arc::new(parking_lot::Mutex::new(AlertSession::new(session.started_at))),
            sound_settings: Arc::new(parking_lot::RwLock::new(sound_settings)),
            dispatcher,
            forwarder,
        };

        Self {
            started_at: Instant::now(),
            session,
            config,
            http_client,
            db_pool,
            price_views: Mutex::new(HashMap::new()),
            alert_panels: Mutex::new(HashMap::new()),
            alerts,
        }
    }

    pub fn feed_endpoints(&self) -> FeedEndpoints {
        FeedEndpoints {
            api_base_url: self.config.api_base_url.clone(),
            stream_url: self.config.stream_url.clone(),
            broadcast_url: self.config.broadcast_url.clone(),
        }
    }

    pub fn forwarder(&self) -> &Arc<ErrorForwarder> {
        &self.alerts.forwarder
    }
}
