use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

pub fn setup_logging(default_level: &str) {
    let level = default_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
