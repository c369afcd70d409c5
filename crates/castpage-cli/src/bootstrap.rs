use std::path::PathBuf;

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Loads `.env` before argument parsing so `CASTPAGE_*` values reach clap.
pub(crate) fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error),
    }
}

pub(crate) fn report_dotenv(outcome: Result<Option<PathBuf>, dotenvy::Error>) {
    match outcome {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(error) => tracing::warn!(%error, "failed to load environment file"),
    }
}

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
