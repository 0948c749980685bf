use crate::telemetry::record::{ErrorOrigin, ErrorRecord, Severity};
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const DELIVERY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Rejected(u16),
    Unreachable,
}

#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    last_seen: HashMap<(String, String), Instant>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn admit(&mut self, error_type: &str, message: &str, now: Instant) -> bool {
        let window = self.window;
        self.last_seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < window);

        let key = (error_type.to_string(), message.to_string());
        if self.last_seen.contains_key(&key) {
            return false;
        }
        self.last_seen.insert(key, now);
        true
    }

    pub fn tracked_pairs(&self) -> usize {
        self.last_seen.len()
    }
}

/// Best-effort shipping of error records to the collector.
///
/// `report` never blocks, never fails and never retries. Delivery problems are
/// only visible at debug level, because the collector may legitimately be down.
pub struct ErrorForwarder {
    client: Client,
    collector_url: Option<String>,
    session_id: String,
    dedup: Mutex<DedupWindow>,
}

impl ErrorForwarder {
    pub fn new(
        client: Client,
        collector_url: Option<String>,
        session_id: String,
        dedup_window: Duration,
    ) -> Self {
        Self {
            client,
            collector_url,
            session_id,
            dedup: Mutex::new(DedupWindow::new(dedup_window)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.collector_url.is_some()
    }

    pub fn report_host(
        &self,
        severity: Severity,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        let record = ErrorRecord::new(
            ErrorOrigin::HostProcess,
            &self.session_id,
            severity,
            error_type,
            message,
        );
        self.report(record)
    }

    pub fn report(&self, record: ErrorRecord) -> bool {
        let Some(collector_url) = self.collector_url.clone() else {
            return false;
        };

        {
            let mut dedup = self.dedup.lock();
            if !dedup.admit(&record.error_type, &record.message, Instant::now()) {
                debug!(
                    error_type = %record.error_type,
                    tracked = dedup.tracked_pairs(),
                    "suppressing duplicate error record inside dedup window"
                );
                return false;
            }
        }

        let client = self.client.clone();
        tauri::async_runtime::spawn(async move {
            let _ = deliver_record(&client, &collector_url, &record).await;
        });
        true
    }
}

pub async fn deliver_record(
    client: &Client,
    collector_url: &str,
    record: &ErrorRecord,
) -> DeliveryOutcome {
    let result = client
        .post(collector_url)
        .timeout(Duration::from_millis(DELIVERY_TIMEOUT_MS))
        .json(record)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => DeliveryOutcome::Delivered,
        Ok(response) => {
            let status = response.status().as_u16();
            debug!(status, "collector rejected error record, dropping");
            DeliveryOutcome::Rejected(status)
        }
        Err(error) => {
            debug!(%error, "collector unreachable, dropping error record");
            DeliveryOutcome::Unreachable
        }
    }
}
