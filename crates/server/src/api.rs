//! Stage endpoints: thin glue around the pipeline core.
//!
//! Every stage is an independent, re-triggerable unit of work: it reads one
//! artifact named by the `filename` query param, produces the next artifact
//! (or database rows), and reports what it did. Handoff between stages is
//! purely the filesystem namespace.

use std::fs;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};

use captura_core::PageMeta;
use captura_ingest::stage::{self, Stage, StageError};
use captura_ingest::{build_records, split_to_pages, DocumentExtractor, ExtractError, PaginateError};
use captura_llm::{InvoiceGenerator, ReconcileError};
use captura_storage::{self as storage, ArtifactError};

use crate::loader::{self, LoadReport};
use crate::state::AppState;

// ── Shared plumbing ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_response(status: StatusCode, e: impl std::fmt::Display) -> ApiError {
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn stage_error(stage: Stage, filename: &str, e: StageError) -> ApiError {
    error!("{} failed for '{}': {}", stage, filename, e);
    let status = match e {
        StageError::FileNotFound(_) => StatusCode::NOT_FOUND,
        StageError::UnsupportedExtension { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        StageError::MalformedPageName(_) | StageError::OutsideStageDir { .. } => {
            StatusCode::BAD_REQUEST
        }
    };
    error_response(status, e)
}

fn paginate_error(filename: &str, e: PaginateError) -> ApiError {
    error!("split failed for '{}': {}", filename, e);
    let status = match e {
        PaginateError::CorruptDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e)
}

fn extract_error(filename: &str, e: ExtractError) -> ApiError {
    error!("extract failed for '{}': {}", filename, e);
    let status = match e {
        ExtractError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ExtractError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e)
}

fn reconcile_error(filename: &str, e: ReconcileError) -> ApiError {
    error!("generate failed for '{}': {}", filename, e);
    error_response(StatusCode::BAD_GATEWAY, e)
}

fn artifact_error(stage: Stage, filename: &str, e: ArtifactError) -> ApiError {
    error!("{} failed for '{}': {}", stage, filename, e);
    let status = match e {
        ArtifactError::Empty { .. } | ArtifactError::MissingColumn { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e)
}

/// Validate the extension, resolve inside the stage directory, normalize a
/// case-variant extension on disk, and check existence.
fn resolve_stage_input(
    dir: &std::path::Path,
    filename: &str,
    target: Stage,
) -> Result<(String, std::path::PathBuf), StageError> {
    let canonical = stage::validate_extension(filename, target)?;
    let path = stage::resolve_in_dir(dir, filename, target)?;
    if !path.exists() {
        return Err(StageError::FileNotFound(filename.to_string()));
    }

    if canonical != filename {
        let canonical_path = stage::resolve_in_dir(dir, &canonical, target)?;
        if fs::rename(&path, &canonical_path).is_ok() {
            return Ok((canonical, canonical_path));
        }
    }
    Ok((canonical, path))
}

fn require_extractor(state: &AppState) -> Result<Arc<dyn DocumentExtractor>, ApiError> {
    state.extractor.clone().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "extraction service not configured",
        )
    })
}

fn require_generator(state: &AppState) -> Result<&InvoiceGenerator, ApiError> {
    state.generator.as_ref().ok_or_else(|| {
        error_response(StatusCode::SERVICE_UNAVAILABLE, "LLM provider not configured")
    })
}

fn require_pg(state: &AppState) -> Result<&PgPool, ApiError> {
    state.pg_pool.as_ref().ok_or_else(|| {
        error_response(StatusCode::SERVICE_UNAVAILABLE, "PostgreSQL not configured")
    })
}

// ── Root & health ───────────────────────────────────────────────

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "PDF capture pipeline running.",
        "hint": "Use /split?filename=<doc.pdf> to page a PDF, \
                 /extract?filename=<doc_page_N.pdf> to extract chunks to Excel, \
                 /generate?filename=<doc_page_N.xlsx> to reconcile invoice rows, \
                 /insert?filename=<doc_page_N_generated.xlsx> to load them into PostgreSQL.",
        "status": "ok",
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Stage: split ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub message: String,
    pub pages: usize,
    pub output_dir: String,
}

pub async fn split(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilenameQuery>,
) -> ApiResult<SplitResponse> {
    let filename = params.filename;
    info!("split requested for '{}'", filename);

    let files_dir = state.config.dirs.files_dir();
    let (_canonical, input) = resolve_stage_input(&files_dir, &filename, Stage::Split)
        .map_err(|e| stage_error(Stage::Split, &filename, e))?;

    let pages_dir = state.config.dirs.pages_dir();
    let pages = split_to_pages(&input, &pages_dir).map_err(|e| paginate_error(&filename, e))?;

    info!("'{}' split into {} pages", filename, pages);
    Ok(Json(SplitResponse {
        message: "page split completed".to_string(),
        pages,
        output_dir: pages_dir.display().to_string(),
    }))
}

// ── Stage: extract ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub message: String,
    pub filename: String,
    pub original_pdf: String,
    pub page: u32,
    pub rows: usize,
    pub excel_path: String,
}

pub async fn extract(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilenameQuery>,
) -> ApiResult<ExtractResponse> {
    let filename = params.filename;
    info!("extract requested for '{}'", filename);

    let pages_dir = state.config.dirs.pages_dir();
    let (canonical, input) = resolve_stage_input(&pages_dir, &filename, Stage::Extract)
        .map_err(|e| stage_error(Stage::Extract, &filename, e))?;

    let (base, page) = stage::parse_page_name(&canonical)
        .map_err(|e| stage_error(Stage::Extract, &filename, e))?;
    let original_pdf = format!("{base}.pdf");

    let output = state
        .config
        .dirs
        .results_dir()
        .join(stage::page_file_name(&base, page, "xlsx"));

    // Duplicate invocation on an unchanged page is a no-op.
    if storage::is_up_to_date(&input, &output) {
        let rows = storage::read_results(&output)
            .map_err(|e| artifact_error(Stage::Extract, &filename, e))?;
        info!("'{}' already extracted, skipping", filename);
        return Ok(Json(ExtractResponse {
            message: "results artifact up to date, extraction skipped".to_string(),
            filename: canonical,
            original_pdf,
            page,
            rows: rows.len(),
            excel_path: output.display().to_string(),
        }));
    }

    let extractor = require_extractor(&state)?;
    let chunks = extractor
        .parse_page(&input)
        .await
        .map_err(|e| extract_error(&filename, e))?;

    let meta = PageMeta::stamp(
        &original_pdf,
        &state.config.capture.file_url(&original_pdf),
        page,
        &state.config.capture.subject_label,
    );
    let records =
        build_records(chunks, &meta).map_err(|e| extract_error(&filename, e))?;

    storage::write_results(&output, &records)
        .map_err(|e| artifact_error(Stage::Extract, &filename, e))?;

    info!("extraction of '{}' completed, {} chunks", filename, records.len());
    Ok(Json(ExtractResponse {
        message: "extraction completed and saved to Excel".to_string(),
        filename: canonical,
        original_pdf,
        page,
        rows: records.len(),
        excel_path: output.display().to_string(),
    }))
}

// ── Stage: generate ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub input_results: String,
    pub rows: usize,
    pub output_tables: String,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilenameQuery>,
) -> ApiResult<GenerateResponse> {
    let filename = params.filename;
    info!("generate requested for '{}'", filename);

    if stage::is_generated(&filename) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("'{filename}' already carries the _generated suffix"),
        ));
    }

    let results_dir = state.config.dirs.results_dir();
    let (canonical, input) = resolve_stage_input(&results_dir, &filename, Stage::Generate)
        .map_err(|e| stage_error(Stage::Generate, &filename, e))?;

    let output = state
        .config
        .dirs
        .tables_dir()
        .join(stage::generated_name(&canonical));

    // One LLM call per fresh artifact; a newer output means a duplicate poll.
    if storage::is_up_to_date(&input, &output) {
        let table = storage::read_generated(&output)
            .map_err(|e| artifact_error(Stage::Generate, &filename, e))?;
        info!("'{}' already generated, skipping", filename);
        return Ok(Json(GenerateResponse {
            message: "generated artifact up to date, generation skipped".to_string(),
            input_results: input.display().to_string(),
            rows: table.rows.len(),
            output_tables: output.display().to_string(),
        }));
    }

    let records = storage::read_results(&input)
        .map_err(|e| artifact_error(Stage::Generate, &filename, e))?;

    let document_text = records
        .iter()
        .map(|r| r.clean_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let generator = require_generator(&state)?;
    let items = generator
        .generate_items(&document_text)
        .await
        .map_err(|e| reconcile_error(&filename, e))?;

    let rows = storage::enrich(&records, items)
        .map_err(|e| artifact_error(Stage::Generate, &filename, e))?;

    storage::write_generated(&output, &rows)
        .map_err(|e| artifact_error(Stage::Generate, &filename, e))?;

    info!("generated table for '{}', {} rows", filename, rows.len());
    Ok(Json(GenerateResponse {
        message: "generation completed and saved to Excel".to_string(),
        input_results: input.display().to_string(),
        rows: rows.len(),
        output_tables: output.display().to_string(),
    }))
}

// ── Stage: insert ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub message: String,
    pub filename: String,
    #[serde(flatten)]
    pub report: LoadReport,
}

pub async fn insert(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilenameQuery>,
) -> ApiResult<InsertResponse> {
    let filename = params.filename;
    info!("insert requested for '{}'", filename);

    let tables_dir = state.config.dirs.tables_dir();
    let (canonical, input) = resolve_stage_input(&tables_dir, &filename, Stage::Insert)
        .map_err(|e| stage_error(Stage::Insert, &filename, e))?;

    let table = storage::read_generated(&input)
        .map_err(|e| artifact_error(Stage::Insert, &filename, e))?;

    let pool = require_pg(&state)?;
    let report = loader::load_table(pool, &state.config.loader, &table).await;

    let message = if report.failures.is_empty() {
        "insert completed".to_string()
    } else {
        format!(
            "insert partially completed: {}/{} rows failed",
            report.failures.len(),
            report.rows_attempted
        )
    };

    info!(
        "insert of '{}': {}/{} rows into {}",
        filename, report.rows_inserted, report.rows_attempted, report.table
    );
    Ok(Json(InsertResponse {
        message,
        filename: canonical,
        report,
    }))
}
