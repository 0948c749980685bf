use crate::alerts::api::fetch_alerts;
use crate::alerts::detector::{detect_unseen, AlertSession, AlertsUnseenEvent, UnseenAlerts};
use crate::alerts::store::AlertBook;
use crate::alerts::types::{Alert, AlertsPanelConfig};
use crate::alerts::ALERTS_UNSEEN_EVENT;
use crate::error::AppError;
use crate::notify::audio::AlertSoundSettings;
use crate::notify::dispatcher::{emit_to_main, DispatchReport, NotificationDispatcher};
use crate::poll::run_poll_loop;
use crate::telemetry::forwarder::ErrorForwarder;
use crate::telemetry::record::Severity;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tauri::AppHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ALERT_POLL_ERROR_TYPE: &str = "AlertPollError";

#[derive(Clone)]
pub struct AlertsRuntime {
    pub client: Client,
    pub api_base_url: String,
    pub book: Arc<Mutex<AlertBook>>,
    pub session: Arc<Mutex<AlertSession>>,
    pub sound_settings: Arc<RwLock<AlertSoundSettings>>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub forwarder: Arc<ErrorForwarder>,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub unseen: UnseenAlerts,
    pub dispatched: Vec<DispatchReport>,
}

impl AlertsRuntime {
    pub fn alerts(&self) -> Vec<Alert> {
        self.book.lock().alerts().to_vec()
    }

    pub fn current_unseen(&self) -> UnseenAlerts {
        let session = self.session.lock();
        detect_unseen(self.book.lock().alerts(), &session.boundary)
    }

    /// Recomputes the unseen set and hands it to `publish` without releasing
    /// the session lock, so no acknowledgment can land between the two.
    pub fn publish_current_unseen<F>(&self, publish: F) -> UnseenAlerts
    where
        F: FnOnce(&UnseenAlerts),
    {
        let session = self.session.lock();
        let unseen = detect_unseen(self.book.lock().alerts(), &session.boundary);
        publish(&unseen);
        unseen
    }

    pub fn open_panel(&self) -> UnseenAlerts {
        let mut session = self.session.lock();
        let alerts = self.alerts();
        session.open_panel(&alerts)
    }

    pub fn close_panel<F>(&self, now: DateTime<Utc>, publish: F) -> UnseenAlerts
    where
        F: FnOnce(&UnseenAlerts),
    {
        let mut session = self.session.lock();
        let alerts = self.alerts();
        let unseen = session.close_panel(&alerts, now);
        publish(&unseen);
        unseen
    }

    pub fn apply_listing(&self, alerts: Vec<Alert>) -> RefreshOutcome {
        let (unseen, fired) = {
            let mut session = self.session.lock();
            let fired = session.tracker.detect_triggers(&alerts);
            (detect_unseen(&alerts, &session.boundary), fired)
        };
        self.book.lock().replace_all(alerts);

        let settings = self.sound_settings.read().clone();
        let dispatched = fired
            .iter()
            .map(|alert| {
                self.dispatcher
                    .dispatch(Some(alert.id), &alert.notification_request(), &settings)
            })
            .collect();

        RefreshOutcome { unseen, dispatched }
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome, AppError> {
        let alerts = fetch_alerts(&self.client, &self.api_base_url).await?;
        Ok(self.apply_listing(alerts))
    }
}

pub fn publish_unseen(app: &AppHandle, unseen: &UnseenAlerts) {
    if let Err(error) = emit_to_main(app, ALERTS_UNSEEN_EVENT, AlertsUnseenEvent::from(unseen.clone())) {
        warn!(%error, "failed to emit alerts_unseen event");
    }
}

pub async fn run_alerts_panel(
    app_handle: AppHandle,
    panel_id: String,
    runtime: AlertsRuntime,
    config: AlertsPanelConfig,
    cancel_token: CancellationToken,
) {
    info!(%panel_id, poll_interval_ms = config.poll_interval_ms, "alerts panel polling started");

    run_poll_loop(
        Duration::from_millis(config.poll_interval_ms),
        cancel_token,
        || {
            let runtime = runtime.clone();
            let app_handle = app_handle.clone();
            let panel_id = panel_id.clone();
            async move {
                match runtime.refresh().await {
                    Ok(outcome) => {
                        // Dispatch may have raced a panel close; emit against the current boundary.
                        let unseen = runtime
                            .publish_current_unseen(|unseen| publish_unseen(&app_handle, unseen));
                        debug!(
                            %panel_id,
                            new_count = unseen.new_count,
                            triggered = outcome.dispatched.len(),
                            "alerts refreshed"
                        );
                    }
                    Err(error) => {
                        warn!(%panel_id, %error, "alert poll failed");
                        runtime.forwarder.report_host(
                            Severity::Warning,
                            ALERT_POLL_ERROR_TYPE,
                            error.to_string(),
                        );
                    }
                }
            }
        },
    )
    .await;

    info!(%panel_id, "alerts panel polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::audio::SoundType;
    use crate::notify::dispatcher::tests::RecordingSurface;
    use crate::test_support::HttpStub;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn session_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0)
            .single()
            .expect("fixed timestamp should be valid")
    }

    fn alert(id: u64, triggered_at: Option<DateTime<Utc>>) -> Alert {
        Alert {
            id,
            symbol: "TSLA".to_string(),
            condition_type: "price_below".to_string(),
            threshold: 150.0,
            enabled: true,
            sound_type: SoundType::Alarm,
            triggered_at,
            created_at: session_start() - ChronoDuration::days(2),
        }
    }

    fn runtime(surface: Arc<RecordingSurface>, api_base_url: &str) -> AlertsRuntime {
        let forwarder = Arc::new(ErrorForwarder::new(
            Client::new(),
            None,
            "session-test".to_string(),
            Duration::from_secs(10),
        ));
        AlertsRuntime {
            client: Client::new(),
            api_base_url: api_base_url.to_string(),
            book: Arc::new(Mutex::new(AlertBook::default())),
            session: Arc::new(Mutex::new(AlertSession::new(session_start()))),
            sound_settings: Arc::new(RwLock::new(AlertSoundSettings::default())),
            dispatcher: Arc::new(NotificationDispatcher::new(surface, Arc::clone(&forwarder))),
            forwarder,
        }
    }

    #[test]
    fn listing_refresh_counts_and_dispatches_once() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(Arc::clone(&surface), "http://127.0.0.1:1");
        let fired_at = session_start() + ChronoDuration::minutes(5);

        let first = runtime.apply_listing(vec![alert(1, Some(fired_at)), alert(2, None)]);
        assert_eq!(first.unseen.new_ids, vec![1]);
        assert_eq!(first.dispatched.len(), 1);

        let second = runtime.apply_listing(vec![alert(1, Some(fired_at)), alert(2, None)]);
        assert_eq!(second.unseen.new_count, 1);
        assert!(second.dispatched.is_empty());

        assert_eq!(surface.notifications.lock().len(), 1);
        assert_eq!(surface.notifications.lock()[0].title, "TSLA Alert");
        assert_eq!(surface.sounds.lock()[0].sound, SoundType::Alarm);
        assert_eq!(runtime.alerts().len(), 2);
    }

    #[test]
    fn unseen_follows_panel_acknowledgment() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(surface, "http://127.0.0.1:1");
        runtime.apply_listing(vec![alert(1, Some(session_start() + ChronoDuration::minutes(1)))]);

        assert_eq!(runtime.open_panel().new_count, 1);
        runtime.close_panel(session_start() + ChronoDuration::minutes(2), |_| {});

        assert_eq!(runtime.current_unseen().new_count, 0);
    }

    #[test]
    fn poll_publishes_against_boundary_moved_during_dispatch() {
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(surface, "http://127.0.0.1:1");
        let published = Mutex::new(Vec::new());

        let outcome = runtime.apply_listing(vec![
            alert(1, Some(session_start() + ChronoDuration::minutes(1))),
            alert(2, Some(session_start() + ChronoDuration::minutes(2))),
            alert(3, Some(session_start() + ChronoDuration::minutes(3))),
        ]);
        assert_eq!(outcome.unseen.new_count, 3);

        runtime.open_panel();
        runtime.close_panel(session_start() + ChronoDuration::minutes(4), |unseen| {
            published.lock().push(unseen.new_count)
        });
        runtime.publish_current_unseen(|unseen| published.lock().push(unseen.new_count));

        assert_eq!(*published.lock(), vec![0, 0]);
    }

    #[tokio::test]
    async fn refresh_reads_backend_listing() {
        let stub = HttpStub::start(
            200,
            r#"{"data":[{"id":9,"symbol":"NVDA","condition_type":"price_above","threshold":1000,"triggered_at":"2026-05-04T09:10:00Z","created_at":"2026-05-01T00:00:00Z"}]}"#,
        )
        .await;
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(Arc::clone(&surface), &stub.base_url);

        let outcome = runtime.refresh().await.expect("refresh should succeed");

        assert_eq!(outcome.unseen.new_ids, vec![9]);
        assert_eq!(surface.notifications.lock().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_collection() {
        let stub = HttpStub::start(503, "").await;
        let surface = Arc::new(RecordingSurface::default());
        let runtime = runtime(surface, &stub.base_url);
        runtime.apply_listing(vec![alert(1, None)]);

        assert!(runtime.refresh().await.is_err());
        assert_eq!(runtime.alerts().len(), 1);
    }
}
