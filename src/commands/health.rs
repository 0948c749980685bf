use crate::{error::AppError, state::AppState};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;
use tauri::State;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u128,
    pub db: &'static str,
    pub session_id: String,
    pub collector: &'static str,
    pub active_price_views: usize,
    pub active_alert_panels: usize,
}

pub struct HealthInputs<'a> {
    pub started_at: Instant,
    pub pool: &'a SqlitePool,
    pub session_id: &'a str,
    pub collector_enabled: bool,
    pub active_price_views: usize,
    pub active_alert_panels: usize,
}

pub async fn build_health_response(inputs: HealthInputs<'_>) -> HealthResponse {
    let db_status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(inputs.pool)
        .await
    {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    HealthResponse {
        status: "ok",
        uptime_ms: inputs.started_at.elapsed().as_millis(),
        db: db_status,
        session_id: inputs.session_id.to_string(),
        collector: if inputs.collector_enabled {
            "enabled"
        } else {
            "disabled"
        },
        active_price_views: inputs.active_price_views,
        active_alert_panels: inputs.active_alert_panels,
    }
}

#[tauri::command]
pub async fn health(state: State<'_, AppState>) -> Result<HealthResponse, AppError> {
    let active_price_views = state.price_views.lock().await.len();
    let active_alert_panels = state.alert_panels.lock().await.len();

    Ok(build_health_response(HealthInputs {
        started_at: state.started_at,
        pool: &state.db_pool,
        session_id: &state.session.session_id,
        collector_enabled: state.forwarder().is_enabled(),
        active_price_views,
        active_alert_panels,
    })
    .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok_status_and_db_health() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");

        let response = build_health_response(HealthInputs {
            started_at: Instant::now(),
            pool: &pool,
            session_id: "session-test",
            collector_enabled: false,
            active_price_views: 2,
            active_alert_panels: 0,
        })
        .await;

        assert_eq!(response.status, "ok");
        assert_eq!(response.db, "ok");
        assert_eq!(response.collector, "disabled");
        assert_eq!(response.active_price_views, 2);
        assert!(response.uptime_ms <= 1_000);
    }

    #[tokio::test]
    async fn closed_pool_reports_db_error() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        pool.close().await;

        let response = build_health_response(HealthInputs {
            started_at: Instant::now(),
            pool: &pool,
            session_id: "session-test",
            collector_enabled: true,
            active_price_views: 0,
            active_alert_panels: 1,
        })
        .await;

        assert_eq!(response.db, "error");
        assert_eq!(response.collector, "enabled");
    }
}
