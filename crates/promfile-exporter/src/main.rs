//! promfile exporter
//!
//! - `PROMFILE_CONFIG`: YAML config path (default `promfile.yaml`)
//! - `PROMFILE_STORE_PATH`: process-wide default store path, used when the
//!   config has no `store` section

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use promfile_exporter::{app_state, config, router};

const DEFAULT_CONFIG: &str = "promfile.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "promfile-exporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("PROMFILE_STORE_PATH") {
        promfile_core::config::init_default_path(path)?;
    }

    let path = std::env::var("PROMFILE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.exporter.listen_addr()?;

    let state = app_state::AppState::new(&cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, "promfile-exporter starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
