use crate::error::AppError;
use crate::prices::types::{ObservationSource, PriceObservation, PriceQuoteWire};
use reqwest::Client;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type PriceWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn subscription_endpoint(base_url: &str, symbols: &[String]) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}symbols={}", symbols.join(","))
}

fn quotes_endpoint(api_base_url: &str, symbols: &[String]) -> String {
    format!("{api_base_url}/api/quotes?symbols={}", symbols.join(","))
}

pub async fn connect_price_channel(
    base_url: &str,
    symbols: &[String],
) -> Result<PriceWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(4 << 20),
        max_frame_size: Some(1 << 20),
        ..Default::default()
    };

    let request = subscription_endpoint(base_url, symbols);
    let (stream, _) = connect_async_with_config(request, Some(ws_config), true).await?;
    Ok(stream)
}

pub async fn fetch_quote_snapshot(
    client: &Client,
    api_base_url: &str,
    symbols: &[String],
    observed_at: i64,
) -> Result<Vec<PriceObservation>, AppError> {
    let endpoint = quotes_endpoint(api_base_url, symbols);
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let payload = response.json::<Vec<PriceQuoteWire>>().await?;

    let mut observations = Vec::with_capacity(payload.len());
    for quote in payload {
        match quote.into_observation(ObservationSource::Snapshot, observed_at) {
            Ok(observation) => observations.push(observation),
            Err(error) => debug!(%error, "skipping malformed quote in snapshot"),
        }
    }
    Ok(observations)
}
