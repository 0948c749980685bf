use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 300_000;
pub const MIN_STALENESS_WINDOW_MS: u64 = 1_000;
pub const MAX_STALENESS_WINDOW_MS: u64 = 3_600_000;
pub const MAX_SYMBOLS_PER_VIEW: usize = 50;
pub const BROADCAST_PRICE_EVENT: &str = "price.updated";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    Stream,
    Broadcast,
    Snapshot,
}

impl ObservationSource {
    pub const ALL: [ObservationSource; 3] = [Self::Stream, Self::Broadcast, Self::Snapshot];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Broadcast => "broadcast",
            Self::Snapshot => "snapshot",
        }
    }

    /// Higher wins. The only place source priority is defined.
    pub fn priority(self) -> u8 {
        match self {
            Self::Stream => 2,
            Self::Broadcast => 1,
            Self::Snapshot => 0,
        }
    }

    pub fn is_live(self) -> bool {
        !matches!(self, Self::Snapshot)
    }

    pub fn index(self) -> usize {
        match self {
            Self::Stream => 0,
            Self::Broadcast => 1,
            Self::Snapshot => 2,
        }
    }
}

pub fn compare_observations(lhs: &PriceObservation, rhs: &PriceObservation) -> Ordering {
    lhs.source
        .priority()
        .cmp(&rhs.source.priority())
        .then(lhs.observed_at.cmp(&rhs.observed_at))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub observed_at: i64,
    pub source: ObservationSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativePrice {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub observed_at: i64,
    pub source: ObservationSource,
}

impl From<&PriceObservation> for AuthoritativePrice {
    fn from(value: &PriceObservation) -> Self {
        Self {
            symbol: value.symbol.clone(),
            price: value.price,
            change: value.change,
            change_percent: value.change_percent,
            volume: value.volume,
            observed_at: value.observed_at,
            source: value.source,
        }
    }
}

/// Backends send decimals either as JSON numbers or as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(f64),
    Text(String),
}

impl WireNumber {
    pub fn to_f64(&self) -> Result<f64, AppError> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().map_err(|error| {
                AppError::InvalidArgument(format!("numeric field '{text}' is invalid: {error}"))
            })?,
        };
        if !value.is_finite() {
            return Err(AppError::InvalidArgument(
                "numeric fields must be finite".to_string(),
            ));
        }
        Ok(value)
    }
}

fn optional_to_f64(value: &Option<WireNumber>) -> Result<f64, AppError> {
    value.as_ref().map(WireNumber::to_f64).unwrap_or(Ok(0.0))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuoteWire {
    pub symbol: String,
    pub price: WireNumber,
    #[serde(default)]
    pub change: Option<WireNumber>,
    #[serde(default, rename = "changePercent", alias = "change_percent")]
    pub change_percent: Option<WireNumber>,
    #[serde(default)]
    pub volume: Option<WireNumber>,
}

impl PriceQuoteWire {
    pub fn into_observation(
        self,
        source: ObservationSource,
        observed_at: i64,
    ) -> Result<PriceObservation, AppError> {
        let symbol = self.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(AppError::InvalidArgument(
                "quote symbol must be non-empty".to_string(),
            ));
        }

        // Zero and negative prices are real readings, only non-finite values are rejected.
        Ok(PriceObservation {
            symbol,
            price: self.price.to_f64()?,
            change: optional_to_f64(&self.change)?,
            change_percent: optional_to_f64(&self.change_percent)?,
            volume: optional_to_f64(&self.volume)?,
            observed_at,
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastEnvelopeWire {
    #[serde(default)]
    pub event: Option<String>,
    pub data: PriceQuoteWire,
}

pub fn parse_stream_payload(
    payload: &mut [u8],
    observed_at: i64,
) -> Result<PriceObservation, AppError> {
    let wire: PriceQuoteWire = simd_json::serde::from_slice(payload)?;
    wire.into_observation(ObservationSource::Stream, observed_at)
}

pub fn parse_broadcast_payload(
    payload: &mut [u8],
    observed_at: i64,
) -> Result<Option<PriceObservation>, AppError> {
    let envelope: BroadcastEnvelopeWire = simd_json::serde::from_slice(payload)?;
    match envelope.event.as_deref() {
        None | Some(BROADCAST_PRICE_EVENT) => envelope
            .data
            .into_observation(ObservationSource::Broadcast, observed_at)
            .map(Some),
        Some(_) => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedConnectionState {
    Connecting,
    Live,
    Reconnecting,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatusEvent {
    pub view_id: String,
    pub source: ObservationSource,
    pub state: FeedConnectionState,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartPriceFeedsArgs {
    pub symbols: Vec<String>,
    pub poll_interval_ms: Option<u64>,
    pub staleness_window_ms: Option<u64>,
    pub stream_enabled: Option<bool>,
    pub broadcast_enabled: Option<bool>,
    pub snapshot_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceFeedsConfig {
    pub symbols: Vec<String>,
    pub poll_interval_ms: u64,
    pub staleness_window_ms: Option<u64>,
    pub stream_enabled: bool,
    pub broadcast_enabled: bool,
    pub snapshot_enabled: bool,
}

impl StartPriceFeedsArgs {
    pub fn normalize(self) -> Result<PriceFeedsConfig, AppError> {
        let mut symbols = Vec::with_capacity(self.symbols.len());
        for raw in self.symbols {
            let symbol = raw.trim().to_ascii_uppercase();
            if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                return Err(AppError::InvalidArgument(format!(
                    "symbol '{raw}' must be non-empty alphanumeric ASCII"
                )));
            }
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        if symbols.is_empty() || symbols.len() > MAX_SYMBOLS_PER_VIEW {
            return Err(AppError::InvalidArgument(format!(
                "symbols must contain between 1 and {MAX_SYMBOLS_PER_VIEW} entries"
            )));
        }

        let poll_interval_ms = self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&poll_interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "pollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
            )));
        }

        if let Some(window_ms) = self.staleness_window_ms {
            if !(MIN_STALENESS_WINDOW_MS..=MAX_STALENESS_WINDOW_MS).contains(&window_ms) {
                return Err(AppError::InvalidArgument(format!(
                    "stalenessWindowMs must be between {MIN_STALENESS_WINDOW_MS} and {MAX_STALENESS_WINDOW_MS}"
                )));
            }
        }

        let stream_enabled = self.stream_enabled.unwrap_or(true);
        let broadcast_enabled = self.broadcast_enabled.unwrap_or(true);
        let snapshot_enabled = self.snapshot_enabled.unwrap_or(true);
        if !stream_enabled && !broadcast_enabled && !snapshot_enabled {
            return Err(AppError::InvalidArgument(
                "at least one price channel must be enabled".to_string(),
            ));
        }

        Ok(PriceFeedsConfig {
            symbols,
            poll_interval_ms,
            staleness_window_ms: self.staleness_window_ms,
            stream_enabled,
            broadcast_enabled,
            snapshot_enabled,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFeedsSession {
    pub view_id: String,
    pub running: bool,
    pub symbols: Vec<String>,
    pub poll_interval_ms: u64,
    pub staleness_window_ms: Option<u64>,
    pub stream_enabled: bool,
    pub broadcast_enabled: bool,
    pub snapshot_enabled: bool,
}

impl PriceFeedsSession {
    pub fn from_config(view_id: &str, config: &PriceFeedsConfig) -> Self {
        Self {
            view_id: view_id.to_string(),
            running: true,
            symbols: config.symbols.clone(),
            poll_interval_ms: config.poll_interval_ms,
            staleness_window_ms: config.staleness_window_ms,
            stream_enabled: config.stream_enabled,
            broadcast_enabled: config.broadcast_enabled,
            snapshot_enabled: config.snapshot_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStopResult {
    pub stopped: bool,
}
