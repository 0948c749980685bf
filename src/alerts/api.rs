use crate::alerts::types::{parse_alert, parse_alert_list, Alert, NewAlert};
use crate::error::AppError;
use reqwest::Client;
use serde_json::{json, Value};

fn alerts_endpoint(api_base_url: &str) -> String {
    format!("{api_base_url}/api/alerts")
}

fn alert_endpoint(api_base_url: &str, id: u64) -> String {
    format!("{api_base_url}/api/alerts/{id}")
}

pub async fn fetch_alerts(client: &Client, api_base_url: &str) -> Result<Vec<Alert>, AppError> {
    let response = client
        .get(alerts_endpoint(api_base_url))
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<Value>().await?;
    parse_alert_list(payload)
}

pub async fn set_alert_enabled(
    client: &Client,
    api_base_url: &str,
    id: u64,
    enabled: bool,
) -> Result<(), AppError> {
    client
        .patch(alert_endpoint(api_base_url, id))
        .json(&json!({ "enabled": enabled }))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

pub async fn delete_alert(client: &Client, api_base_url: &str, id: u64) -> Result<(), AppError> {
    client
        .delete(alert_endpoint(api_base_url, id))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

pub async fn create_alert(
    client: &Client,
    api_base_url: &str,
    new_alert: &NewAlert,
) -> Result<Alert, AppError> {
    let body = json!({
        "symbol": new_alert.symbol,
        "condition_type": new_alert.condition_type,
        "threshold": new_alert.threshold,
        "sound_type": new_alert.sound_type.as_str(),
        "enabled": new_alert.enabled,
    });
    let response = client
        .post(alerts_endpoint(api_base_url))
        .json(&body)
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<Value>().await?;
    parse_alert(payload)
}
