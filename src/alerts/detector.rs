use crate::alerts::types::Alert;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const BADGE_CAP: usize = 9;

/// Session-local instant below which triggers count as already seen.
/// Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgmentBoundary {
    at: DateTime<Utc>,
}

impl AcknowledgmentBoundary {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn advance(&mut self, now: DateTime<Utc>) {
        if now > self.at {
            self.at = now;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenAlerts {
    pub new_count: usize,
    pub new_ids: Vec<u64>,
}

pub fn detect_unseen(alerts: &[Alert], boundary: &AcknowledgmentBoundary) -> UnseenAlerts {
    let mut new_ids: Vec<u64> = alerts
        .iter()
        .filter_map(|alert| alert.triggered_at.map(|triggered_at| (alert.id, triggered_at)))
        .filter(|(_, triggered_at)| *triggered_at > boundary.at())
        .map(|(id, _)| id)
        .collect();
    new_ids.sort_unstable();
    new_ids.dedup();

    UnseenAlerts {
        new_count: new_ids.len(),
        new_ids,
    }
}

pub fn badge_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
        n => Some(n.to_string()),
    }
}

pub fn accessible_label(count: usize) -> String {
    match count {
        0 => "No new alerts".to_string(),
        1 => "1 new alert".to_string(),
        n => format!("{n} new alerts"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsUnseenEvent {
    pub new_count: usize,
    pub new_ids: Vec<u64>,
    pub badge_label: Option<String>,
    pub accessible_label: String,
}

impl From<UnseenAlerts> for AlertsUnseenEvent {
    fn from(value: UnseenAlerts) -> Self {
        Self {
            badge_label: badge_label(value.new_count),
            accessible_label: accessible_label(value.new_count),
            new_count: value.new_count,
            new_ids: value.new_ids,
        }
    }
}

/// Remembers the last `triggered_at` per alert so each firing is dispatched once.
#[derive(Debug)]
pub struct TriggerTracker {
    session_started_at: DateTime<Utc>,
    last_seen: HashMap<u64, Option<DateTime<Utc>>>,
}

impl TriggerTracker {
    pub fn new(session_started_at: DateTime<Utc>) -> Self {
        Self {
            session_started_at,
            last_seen: HashMap::new(),
        }
    }

    pub fn detect_triggers(&mut self, alerts: &[Alert]) -> Vec<Alert> {
        let mut fired = Vec::new();

        for alert in alerts {
            let previous = self.last_seen.insert(alert.id, alert.triggered_at);
            let Some(triggered_at) = alert.triggered_at else {
                continue;
            };
            if previous == Some(Some(triggered_at)) {
                continue;
            }
            if alert.enabled && triggered_at > self.session_started_at {
                fired.push(alert.clone());
            }
        }

        self.last_seen
            .retain(|id, _| alerts.iter().any(|alert| alert.id == *id));
        fired
    }
}

#[derive(Debug)]
pub struct AlertSession {
    pub boundary: AcknowledgmentBoundary,
    pub tracker: TriggerTracker,
    pub panel_open: bool,
}

impl AlertSession {
    pub fn new(session_started_at: DateTime<Utc>) -> Self {
        Self {
            boundary: AcknowledgmentBoundary::new(session_started_at),
            tracker: TriggerTracker::new(session_started_at),
            panel_open: false,
        }
    }

    pub fn open_panel(&mut self, alerts: &[Alert]) -> UnseenAlerts {
        self.panel_open = true;
        detect_unseen(alerts, &self.boundary)
    }

    pub fn close_panel(&mut self, alerts: &[Alert], now: DateTime<Utc>) -> UnseenAlerts {
        if self.panel_open {
            self.boundary.advance(now);
        }
        self.panel_open = false;
        detect_unseen(alerts, &self.boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::audio::SoundType;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0)
            .single()
            .expect("fixed timestamp should be valid")
    }

    fn alert(id: u64, triggered_at: Option<DateTime<Utc>>) -> Alert {
        Alert {
            id,
            symbol: "AAPL".to_string(),
            condition_type: "price_above".to_string(),
            threshold: 200.0,
            enabled: true,
            sound_type: SoundType::Default,
            triggered_at,
            created_at: base_time() - Duration::days(1),
        }
    }

    #[test]
    fn boundary_instant_is_not_new() {
        let boundary = AcknowledgmentBoundary::new(base_time());
        let alerts = vec![
            alert(1, Some(base_time())),
            alert(2, Some(base_time() + Duration::milliseconds(1))),
            alert(3, None),
            alert(4, Some(base_time() - Duration::seconds(5))),
        ];

        let unseen = detect_unseen(&alerts, &boundary);

        assert_eq!(unseen.new_count, 1);
        assert_eq!(unseen.new_ids, vec![2]);
    }

    #[test]
    fn fifteen_triggers_render_capped_badge() {
        let boundary = AcknowledgmentBoundary::new(base_time());
        let alerts: Vec<Alert> = (1..=15)
            .map(|id| alert(id, Some(base_time() + Duration::seconds(1))))
            .collect();

        let event = AlertsUnseenEvent::from(detect_unseen(&alerts, &boundary));

        assert_eq!(event.new_count, 15);
        assert_eq!(event.badge_label.as_deref(), Some("9+"));
        assert_ne!(event.badge_label.as_deref(), Some("15"));
        assert_eq!(event.accessible_label, "15 new alerts");
    }

    #[test]
    fn triggers_before_session_start_are_already_acknowledged() {
        let session = AlertSession::new(base_time());
        let before_launch: Vec<Alert> = (1..=15)
            .map(|id| alert(id, Some(base_time() - Duration::minutes(id as i64))))
            .collect();
        assert_eq!(detect_unseen(&before_launch, &session.boundary).new_count, 0);

        let after_launch: Vec<Alert> = (1..=15)
            .map(|id| alert(id, Some(base_time() + Duration::seconds(1))))
            .collect();
        let event = AlertsUnseenEvent::from(detect_unseen(&after_launch, &session.boundary));
        assert_eq!(event.new_count, 15);
        assert_eq!(event.badge_label.as_deref(), Some("9+"));
    }

    #[test]
    fn labels_use_singular_and_plural() {
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(1).as_deref(), Some("1"));
        assert_eq!(badge_label(9).as_deref(), Some("9"));
        assert_eq!(badge_label(10).as_deref(), Some("9+"));
        assert_eq!(accessible_label(0), "No new alerts");
        assert_eq!(accessible_label(1), "1 new alert");
        assert_eq!(accessible_label(2), "2 new alerts");
    }

    #[test]
    fn boundary_never_moves_backwards() {
        let mut boundary = AcknowledgmentBoundary::new(base_time());
        boundary.advance(base_time() - Duration::minutes(1));
        assert_eq!(boundary.at(), base_time());

        boundary.advance(base_time() + Duration::minutes(1));
        assert_eq!(boundary.at(), base_time() + Duration::minutes(1));
    }

    #[test]
    fn closing_the_panel_acknowledges_seen_triggers() {
        let mut session = AlertSession::new(base_time());
        let alerts = vec![alert(1, Some(base_time() + Duration::seconds(10)))];

        let shown = session.open_panel(&alerts);
        assert_eq!(shown.new_ids, vec![1]);

        let after_close = session.close_panel(&alerts, base_time() + Duration::seconds(20));
        assert_eq!(after_close.new_count, 0);

        let refreshed = vec![
            alert(1, Some(base_time() + Duration::seconds(10))),
            alert(2, Some(base_time() + Duration::seconds(30))),
        ];
        assert_eq!(detect_unseen(&refreshed, &session.boundary).new_ids, vec![2]);
    }

    #[test]
    fn closing_without_opening_keeps_boundary() {
        let mut session = AlertSession::new(base_time());
        let alerts = vec![alert(1, Some(base_time() + Duration::seconds(10)))];

        let unseen = session.close_panel(&alerts, base_time() + Duration::seconds(20));
        assert_eq!(unseen.new_count, 1);
    }

    #[test]
    fn tracker_fires_once_per_trigger_instant() {
        let mut tracker = TriggerTracker::new(base_time());
        let fired_at = base_time() + Duration::seconds(5);

        assert!(tracker.detect_triggers(&[alert(1, None)]).is_empty());

        let fired = tracker.detect_triggers(&[alert(1, Some(fired_at))]);
        assert_eq!(fired.len(), 1);
        assert!(tracker.detect_triggers(&[alert(1, Some(fired_at))]).is_empty());

        // Re-armed, then fired again later.
        assert!(tracker.detect_triggers(&[alert(1, None)]).is_empty());
        let refired = tracker.detect_triggers(&[alert(1, Some(fired_at + Duration::seconds(60)))]);
        assert_eq!(refired.len(), 1);
    }

    #[test]
    fn tracker_ignores_pre_session_and_disabled_triggers() {
        let mut tracker = TriggerTracker::new(base_time());
        let mut disabled = alert(2, Some(base_time() + Duration::seconds(1)));
        disabled.enabled = false;

        let fired = tracker.detect_triggers(&[
            alert(1, Some(base_time() - Duration::hours(2))),
            disabled,
        ]);
        assert!(fired.is_empty());
    }
}
