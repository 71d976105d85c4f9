mod api;
mod db;
mod loader;
mod router;
mod state;

use std::fs;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use captura_core::Config;
use captura_ingest::AgenticExtractor;
use captura_llm::InvoiceGenerator;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    captura_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    config.log_summary();

    for dir in config.dirs.all() {
        fs::create_dir_all(&dir)?;
    }
    info!("stage directories ready under {}", config.dirs.data_dir.display());

    let extractor = match AgenticExtractor::from_config(&config.extractor) {
        Ok(e) => Some(Arc::new(e) as Arc<dyn captura_ingest::DocumentExtractor>),
        Err(e) => {
            warn!("{} — extract stage disabled", e);
            None
        }
    };

    let generator = match InvoiceGenerator::from_config(&config.llm, &config.ollama) {
        Ok(g) => Some(g),
        Err(e) => {
            warn!("{} — generate stage disabled", e);
            None
        }
    };

    let pg_pool = db::init_pg_pool(&config.postgres).await;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        extractor,
        generator,
        pg_pool,
    });

    let app = router::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
