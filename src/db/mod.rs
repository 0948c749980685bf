use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tauri::{AppHandle, Manager};
use tracing::info;

fn settings_db_path(app_handle: &AppHandle, db_filename: &str) -> Result<PathBuf, AppError> {
    let data_dir = app_handle.path().app_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join(db_filename))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn open_settings_db(path: &Path) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn initialize_pool(app_handle: &AppHandle, db_filename: &str) -> Result<SqlitePool, AppError> {
    let path = settings_db_path(app_handle, db_filename)?;
    info!(path = %path.display(), "opening settings database");
    open_settings_db(&path).await
}
