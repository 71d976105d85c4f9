use std::sync::Arc;

use sqlx::PgPool;

use captura_core::Config;
use captura_ingest::DocumentExtractor;
use captura_llm::InvoiceGenerator;

pub struct AppState {
    pub config: Config,
    /// Absent when EXTRACTOR_API_KEY is not set; the extract stage then 503s.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,
    /// Absent when the selected LLM provider is unconfigured.
    pub generator: Option<InvoiceGenerator>,
    /// Absent when PostgreSQL is not configured; the insert stage then 503s.
    pub pg_pool: Option<PgPool>,
}
