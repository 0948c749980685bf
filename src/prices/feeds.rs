use crate::error::AppError;
use crate::notify::dispatcher::emit_to_main;
use crate::poll::{now_unix_ms, reconnect_delay, run_poll_loop};
use crate::prices::adapters::{connect_price_channel, fetch_quote_snapshot};
use crate::prices::reconciler::{ObserveOutcome, PriceReconciler};
use crate::prices::types::{
    parse_broadcast_payload, parse_stream_payload, AuthoritativePrice, FeedConnectionState,
    FeedStatusEvent, ObservationSource, PriceFeedsConfig, PriceObservation,
};
use crate::prices::{FEED_STATUS_EVENT, PRICE_UPDATE_EVENT};
use crate::telemetry::forwarder::ErrorForwarder;
use crate::telemetry::record::Severity;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tauri::AppHandle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const OBSERVATION_QUEUE_CAPACITY: usize = 1_024;
const FEED_ERROR_TYPE: &str = "PriceFeedError";

pub trait FeedEventSink: Send + Sync {
    fn price_updated(&self, price: &AuthoritativePrice);
    fn feed_status(&self, status: &FeedStatusEvent);
}

pub struct WindowFeedEvents {
    app: AppHandle,
}

impl WindowFeedEvents {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl FeedEventSink for WindowFeedEvents {
    fn price_updated(&self, price: &AuthoritativePrice) {
        if let Err(error) = emit_to_main(&self.app, PRICE_UPDATE_EVENT, price) {
            warn!(%error, "failed to emit price update event");
        }
    }

    fn feed_status(&self, status: &FeedStatusEvent) {
        if let Err(error) = emit_to_main(&self.app, FEED_STATUS_EVENT, status) {
            warn!(%error, "failed to emit feed status event");
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedEndpoints {
    pub api_base_url: String,
    pub stream_url: String,
    pub broadcast_url: String,
}

type LastStatus = Option<(FeedConnectionState, Option<String>)>;

#[derive(Clone)]
pub struct FeedContext {
    pub view_id: String,
    pub config: PriceFeedsConfig,
    pub endpoints: FeedEndpoints,
    pub client: Client,
    pub reconciler: Arc<Mutex<PriceReconciler>>,
    pub events: Arc<dyn FeedEventSink>,
    pub forwarder: Arc<ErrorForwarder>,
    last_status: Arc<Mutex<[LastStatus; 3]>>,
}

impl FeedContext {
    pub fn new(
        view_id: String,
        config: PriceFeedsConfig,
        endpoints: FeedEndpoints,
        client: Client,
        events: Arc<dyn FeedEventSink>,
        forwarder: Arc<ErrorForwarder>,
    ) -> Self {
        let reconciler = PriceReconciler::new(config.staleness_window_ms);
        Self {
            view_id,
            config,
            endpoints,
            client,
            reconciler: Arc::new(Mutex::new(reconciler)),
            events,
            forwarder,
            last_status: Arc::new(Mutex::new([None, None, None])),
        }
    }

    fn enabled_sources(&self) -> Vec<ObservationSource> {
        ObservationSource::ALL
            .into_iter()
            .filter(|source| match source {
                ObservationSource::Stream => self.config.stream_enabled,
                ObservationSource::Broadcast => self.config.broadcast_enabled,
                ObservationSource::Snapshot => self.config.snapshot_enabled,
            })
            .collect()
    }

    fn publish_status(
        &self,
        source: ObservationSource,
        state: FeedConnectionState,
        reason: Option<String>,
    ) {
        {
            let mut last = self.last_status.lock();
            let slot = &mut last[source.index()];
            if slot.as_ref() == Some(&(state, reason.clone())) {
                return;
            }
            *slot = Some((state, reason.clone()));
        }

        self.events.feed_status(&FeedStatusEvent {
            view_id: self.view_id.clone(),
            source,
            state,
            reason,
        });
    }

    fn report_failure(&self, source: ObservationSource, error: &AppError) {
        self.forwarder.report_host(
            Severity::Warning,
            FEED_ERROR_TYPE,
            format!("{} channel failed: {error}", source.as_str()),
        );
    }

    fn accepts(&self, observation: &PriceObservation) -> bool {
        self.config.symbols.contains(&observation.symbol)
    }
}

/// Runs every enabled channel of one view until `cancel_token` fires.
/// Returns only after all channel tasks have finished.
pub async fn run_price_feeds(context: FeedContext, cancel_token: CancellationToken) {
    let (sender, receiver) = mpsc::channel(OBSERVATION_QUEUE_CAPACITY);
    let sources = context.enabled_sources();
    info!(view_id = %context.view_id, symbols = ?context.config.symbols, ?sources, "price feeds started");

    let mut producers = Vec::with_capacity(sources.len());
    for source in sources.iter().copied() {
        let task_context = context.clone();
        let task_sender = sender.clone();
        let task_cancel = cancel_token.clone();
        producers.push(tauri::async_runtime::spawn(async move {
            match source {
                ObservationSource::Stream => {
                    let url = task_context.endpoints.stream_url.clone();
                    run_push_channel(&task_context, source, &url, task_sender, task_cancel).await;
                }
                ObservationSource::Broadcast => {
                    let url = task_context.endpoints.broadcast_url.clone();
                    run_push_channel(&task_context, source, &url, task_sender, task_cancel).await;
                }
                ObservationSource::Snapshot => {
                    let period = Duration::from_millis(task_context.config.poll_interval_ms);
                    run_snapshot_channel(&task_context, period, task_sender, task_cancel).await;
                }
            }
        }));
    }
    drop(sender);

    consume_observations(&context, receiver, &cancel_token).await;

    cancel_token.cancel();
    for producer in producers {
        let _ = producer.await;
    }
    for source in sources {
        context.publish_status(
            source,
            FeedConnectionState::Stopped,
            Some("view unmounted".to_string()),
        );
    }
    info!(view_id = %context.view_id, "price feeds stopped");
}

async fn consume_observations(
    context: &FeedContext,
    mut receiver: mpsc::Receiver<PriceObservation>,
    cancel_token: &CancellationToken,
) {
    loop {
        let observation = tokio::select! {
            _ = cancel_token.cancelled() => break,
            next = receiver.recv() => next,
        };
        let Some(observation) = observation else {
            break;
        };

        let outcome = context.reconciler.lock().observe(observation, now_unix_ms());
        if let ObserveOutcome::Updated(price) = outcome {
            context.events.price_updated(&price);
        }
    }
}

enum PushFrame {
    Observation(PriceObservation),
    Ignored,
    Malformed(AppError),
    Closed,
}

fn decode_push_message(source: ObservationSource, message: Message, observed_at: i64) -> PushFrame {
    let mut payload = match message {
        Message::Text(text_payload) => text_payload.into_bytes(),
        Message::Binary(binary_payload) => binary_payload,
        Message::Close(_) => return PushFrame::Closed,
        _ => return PushFrame::Ignored,
    };

    let parsed = match source {
        ObservationSource::Broadcast => parse_broadcast_payload(payload.as_mut_slice(), observed_at),
        _ => parse_stream_payload(payload.as_mut_slice(), observed_at).map(Some),
    };
    match parsed {
        Ok(Some(observation)) => PushFrame::Observation(observation),
        Ok(None) => PushFrame::Ignored,
        Err(error) => PushFrame::Malformed(error),
    }
}

async fn run_push_channel(
    context: &FeedContext,
    source: ObservationSource,
    url: &str,
    sender: mpsc::Sender<PriceObservation>,
    cancel_token: CancellationToken,
) {
    let mut reconnect_attempt = 0_u32;

    while !cancel_token.is_cancelled() {
        let (phase, reason) = if reconnect_attempt == 0 {
            (FeedConnectionState::Connecting, "opening websocket".to_string())
        } else {
            (
                FeedConnectionState::Reconnecting,
                format!("reconnect attempt {reconnect_attempt}"),
            )
        };
        context.publish_status(source, phase, Some(reason));

        let connected = tokio::select! {
            _ = cancel_token.cancelled() => break,
            result = connect_price_channel(url, &context.config.symbols) => result,
        };

        match connected {
            Ok(mut websocket_stream) => {
                reconnect_attempt = 0;
                context.publish_status(
                    source,
                    FeedConnectionState::Live,
                    Some("websocket connected".to_string()),
                );

                loop {
                    let frame = tokio::select! {
                        _ = cancel_token.cancelled() => break,
                        next_message = websocket_stream.next() => next_message,
                    };
                    let Some(frame_result) = frame else {
                        break;
                    };

                    let message = match frame_result {
                        Ok(message) => message,
                        Err(error) => {
                            debug!(view_id = %context.view_id, source = source.as_str(), %error, "websocket frame error");
                            break;
                        }
                    };

                    match decode_push_message(source, message, now_unix_ms()) {
                        PushFrame::Observation(observation) => {
                            if !context.accepts(&observation) {
                                continue;
                            }
                            if sender.send(observation).await.is_err() {
                                return;
                            }
                        }
                        PushFrame::Ignored => {}
                        PushFrame::Malformed(error) => {
                            debug!(source = source.as_str(), %error, "ignoring malformed price frame");
                        }
                        PushFrame::Closed => break,
                    }
                }

                if cancel_token.is_cancelled() {
                    break;
                }
            }
            Err(error) => {
                warn!(view_id = %context.view_id, source = source.as_str(), %error, "price channel connect failed");
                context.report_failure(source, &error);
            }
        }

        reconnect_attempt = reconnect_attempt.saturating_add(1);
        let delay = reconnect_delay(reconnect_attempt);
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_snapshot_channel(
    context: &FeedContext,
    period: Duration,
    sender: mpsc::Sender<PriceObservation>,
    cancel_token: CancellationToken,
) {
    run_poll_loop(period, cancel_token, || {
        let context = context.clone();
        let sender = sender.clone();
        async move {
            let fetched = fetch_quote_snapshot(
                &context.client,
                &context.endpoints.api_base_url,
                &context.config.symbols,
                now_unix_ms(),
            )
            .await;

            match fetched {
                Ok(observations) => {
                    context.publish_status(ObservationSource::Snapshot, FeedConnectionState::Live, None);
                    for observation in observations.into_iter().filter(|o| context.accepts(o)) {
                        if sender.send(observation).await.is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(view_id = %context.view_id, %error, "quote snapshot poll failed");
                    context.publish_status(
                        ObservationSource::Snapshot,
                        FeedConnectionState::Error,
                        Some(error.to_string()),
                    );
                    context.report_failure(ObservationSource::Snapshot, &error);
                }
            }
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::types::StartPriceFeedsArgs;
    use crate::test_support::{unreachable_url, HttpStub};
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct RecordingEvents {
        prices: Mutex<Vec<AuthoritativePrice>>,
        statuses: Mutex<Vec<FeedStatusEvent>>,
    }

    impl FeedEventSink for RecordingEvents {
        fn price_updated(&self, price: &AuthoritativePrice) {
            self.prices.lock().push(price.clone());
        }

        fn feed_status(&self, status: &FeedStatusEvent) {
            self.statuses.lock().push(status.clone());
        }
    }

    fn config(stream: bool, broadcast: bool, snapshot: bool) -> PriceFeedsConfig {
        StartPriceFeedsArgs {
            symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
            poll_interval_ms: None,
            staleness_window_ms: None,
            stream_enabled: Some(stream),
            broadcast_enabled: Some(broadcast),
            snapshot_enabled: Some(snapshot),
        }
        .normalize()
        .expect("test config should be valid")
    }

    fn context(
        config: PriceFeedsConfig,
        endpoints: FeedEndpoints,
        events: Arc<RecordingEvents>,
    ) -> FeedContext {
        let forwarder = Arc::new(ErrorForwarder::new(
            Client::new(),
            None,
            "session-test".to_string(),
            Duration::from_secs(10),
        ));
        FeedContext::new(
            "watchlist".to_string(),
            config,
            endpoints,
            Client::new(),
            events,
            forwarder,
        )
    }

    fn endpoints(api_base_url: &str, stream_url: &str, broadcast_url: &str) -> FeedEndpoints {
        FeedEndpoints {
            api_base_url: api_base_url.to_string(),
            stream_url: stream_url.to_string(),
            broadcast_url: broadcast_url.to_string(),
        }
    }

    fn observation(source: ObservationSource, price: f64, observed_at: i64) -> PriceObservation {
        PriceObservation {
            symbol: "AAPL".to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 0.0,
            observed_at,
            source,
        }
    }

    #[tokio::test]
    async fn consumer_emits_only_authoritative_changes() {
        let events = Arc::new(RecordingEvents::default());
        let context = context(
            config(true, true, true),
            endpoints("http://127.0.0.1:1", "ws://127.0.0.1:1", "ws://127.0.0.1:1"),
            Arc::clone(&events),
        );
        let (sender, receiver) = mpsc::channel(8);
        let now = now_unix_ms();

        sender
            .send(observation(ObservationSource::Snapshot, 198.0, now))
            .await
            .expect("queue open");
        sender
            .send(observation(ObservationSource::Broadcast, 199.0, now + 1))
            .await
            .expect("queue open");
        sender
            .send(observation(ObservationSource::Snapshot, 150.0, now + 5))
            .await
            .expect("queue open");
        sender
            .send(observation(ObservationSource::Broadcast, 199.0, now + 1))
            .await
            .expect("queue open");
        drop(sender);

        consume_observations(&context, receiver, &CancellationToken::new()).await;

        let prices = events.prices.lock();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].source, ObservationSource::Snapshot);
        assert_eq!(prices[1].source, ObservationSource::Broadcast);
        assert_eq!(prices[1].price, 199.0);
    }

    #[tokio::test]
    async fn snapshot_channel_feeds_reconciler_and_stops_fetching() {
        let stub = HttpStub::start(
            200,
            r#"[{"symbol":"AAPL","price":"201.5","changePercent":0.4},{"symbol":"ZZZZ","price":1}]"#,
        )
        .await;
        let events = Arc::new(RecordingEvents::default());
        let context = context(
            config(false, false, true),
            endpoints(&stub.base_url, "ws://127.0.0.1:1", "ws://127.0.0.1:1"),
            Arc::clone(&events),
        );
        let (sender, mut receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task_context = context.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_snapshot_channel(&task_context, Duration::from_millis(50), sender, task_cancel).await;
        });

        let first = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("snapshot should arrive")
            .expect("queue open");
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.source, ObservationSource::Snapshot);

        cancel.cancel();
        handle.await.expect("snapshot channel should exit");
        let hits_at_stop = stub.hits();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stub.hits(), hits_at_stop);
    }

    #[tokio::test]
    async fn snapshot_failure_is_reported_as_status_only() {
        let events = Arc::new(RecordingEvents::default());
        let context = context(
            config(false, false, true),
            endpoints(&unreachable_url().await, "ws://127.0.0.1:1", "ws://127.0.0.1:1"),
            Arc::clone(&events),
        );
        let (sender, _receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task_context = context.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_snapshot_channel(&task_context, Duration::from_millis(50), sender, task_cancel).await;
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        handle.await.expect("snapshot channel should exit");

        let statuses = events.statuses.lock();
        assert!(!statuses.is_empty());
        assert!(statuses
            .iter()
            .all(|status| status.state == FeedConnectionState::Error));
        // Identical failures are not re-emitted.
        assert_eq!(statuses.len(), 1);
        assert!(events.prices.lock().is_empty());
    }

    #[tokio::test]
    async fn broadcast_channel_forwards_price_events_only() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ws listener should bind");
        let address = listener.local_addr().expect("ws listener address");
        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut websocket) = tokio_tungstenite::accept_async(socket).await else {
                return;
            };
            let frames = [
                r#"{"event":"alert.triggered","data":{"symbol":"AAPL","price":1}}"#,
                "not json",
                r#"{"event":"price.updated","data":{"symbol":"AAPL","price":202.25}}"#,
            ];
            for frame in frames {
                let _ = websocket.send(Message::Text(frame.to_string())).await;
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let events = Arc::new(RecordingEvents::default());
        let broadcast_url = format!("ws://{address}/ws/broadcast");
        let context = context(
            config(false, true, false),
            endpoints("http://127.0.0.1:1", "ws://127.0.0.1:1", &broadcast_url),
            Arc::clone(&events),
        );
        let (sender, mut receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task_context = context.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let url = task_context.endpoints.broadcast_url.clone();
            run_push_channel(
                &task_context,
                ObservationSource::Broadcast,
                &url,
                sender,
                task_cancel,
            )
            .await;
        });

        let received = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("broadcast price should arrive")
            .expect("queue open");
        assert_eq!(received.price, 202.25);
        assert_eq!(received.source, ObservationSource::Broadcast);

        cancel.cancel();
        handle.await.expect("push channel should exit");
        assert!(events
            .statuses
            .lock()
            .iter()
            .any(|status| status.state == FeedConnectionState::Live));
    }

    #[tokio::test]
    async fn dead_channels_do_not_block_the_live_one() {
        let stub = HttpStub::start(200, r#"[{"symbol":"MSFT","price":415.1}]"#).await;
        let dead_ws = unreachable_url().await.replace("http://", "ws://");
        let events = Arc::new(RecordingEvents::default());
        let context = context(
            config(true, true, true),
            endpoints(&stub.base_url, &dead_ws, &dead_ws),
            Arc::clone(&events),
        );
        let cancel = CancellationToken::new();

        let task_context = context.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(run_price_feeds(task_context, task_cancel));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while events.prices.lock().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        handle.await.expect("feeds should stop");

        assert_eq!(events.prices.lock()[0].symbol, "MSFT");
        assert!(context.reconciler.lock().authoritative("MSFT", now_unix_ms()).is_some());
        assert!(events
            .statuses
            .lock()
            .iter()
            .any(|status| status.state == FeedConnectionState::Stopped));
    }
}
