use crate::commands::normalize_instance_id;
use crate::error::AppError;
use crate::poll::now_unix_ms;
use crate::prices::feeds::{run_price_feeds, FeedContext, WindowFeedEvents};
use crate::prices::types::{
    AuthoritativePrice, FeedStopResult, PriceFeedsSession, StartPriceFeedsArgs,
};
use crate::state::{AppState, PriceViewHandle};
use std::sync::Arc;
use tauri::{AppHandle, State};
use tokio_util::sync::CancellationToken;

async fn shutdown_view(handle: PriceViewHandle) {
    handle.cancellation_token.cancel();
    let _ = handle.join_handle.await;
}

#[tauri::command]
pub async fn start_price_feeds(
    app: AppHandle,
    state: State<'_, AppState>,
    view_id: String,
    args: StartPriceFeedsArgs,
) -> Result<PriceFeedsSession, AppError> {
    let view_id = normalize_instance_id(&view_id, "viewId")?;
    let config = args.normalize()?;

    let existing_handle = {
        let mut views = state.price_views.lock().await;
        views.remove(&view_id)
    };
    if let Some(handle) = existing_handle {
        shutdown_view(handle).await;
    }

    let context = FeedContext::new(
        view_id.clone(),
        config.clone(),
        state.feed_endpoints(),
        state.http_client.clone(),
        Arc::new(WindowFeedEvents::new(app)),
        Arc::clone(state.forwarder()),
    );
    let reconciler = Arc::clone(&context.reconciler);
    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();

    let join_handle = tauri::async_runtime::spawn(async move {
        run_price_feeds(context, task_token).await;
    });

    let replaced = {
        let mut views = state.price_views.lock().await;
        views.insert(
            view_id.clone(),
            PriceViewHandle {
                cancellation_token,
                join_handle,
                reconciler,
            },
        )
    };
    // Two starts for the same view raced; the later one wins.
    if let Some(handle) = replaced {
        shutdown_view(handle).await;
    }

    Ok(PriceFeedsSession::from_config(&view_id, &config))
}

#[tauri::command]
pub async fn stop_price_feeds(
    state: State<'_, AppState>,
    view_id: String,
) -> Result<FeedStopResult, AppError> {
    let view_id = normalize_instance_id(&view_id, "viewId")?;
    let existing_handle = {
        let mut views = state.price_views.lock().await;
        views.remove(&view_id)
    };

    let stopped = if let Some(handle) = existing_handle {
        shutdown_view(handle).await;
        true
    } else {
        false
    };

    Ok(FeedStopResult { stopped })
}

#[tauri::command]
pub async fn price_snapshot(
    state: State<'_, AppState>,
    view_id: String,
) -> Result<Vec<AuthoritativePrice>, AppError> {
    let view_id = normalize_instance_id(&view_id, "viewId")?;
    let views = state.price_views.lock().await;
    let handle = views
        .get(&view_id)
        .ok_or_else(|| AppError::InvalidArgument(format!("price view '{view_id}' is not running")))?;

    let prices = handle.reconciler.lock().snapshot(now_unix_ms());
    Ok(prices)
}
