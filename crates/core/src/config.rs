use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key).map(|v| v == "true" || v == "1").unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub dirs: DirsConfig,
    pub capture: CaptureConfig,
    pub extractor: ExtractorConfig,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub postgres: PostgresConfig,
    pub loader: LoaderConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            dirs: DirsConfig::from_env(),
            capture: CaptureConfig::from_env(),
            extractor: ExtractorConfig::from_env(),
            llm: LlmConfig::from_env(),
            ollama: OllamaConfig::from_env(),
            postgres: PostgresConfig::from_env(),
            loader: LoaderConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:     {}:{}", self.server.host, self.server.port);
        tracing::info!("  dirs:       data_dir={}", self.dirs.data_dir.display());
        tracing::info!("  extractor:  url={}, configured={}", self.extractor.base_url, self.extractor.is_configured());
        tracing::info!("  llm:        provider={}, configured={}", self.llm.provider, self.llm.is_configured());
        tracing::info!("  postgres:   host={}, db={}, configured={}", self.postgres.host, self.postgres.database, self.postgres.is_configured());
        tracing::info!("  loader:     table={}, sql_null={}", self.loader.dest_table, self.loader.use_sql_null);
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8000),
            cors_origin: env_or("CORS_ORIGIN", "*"),
        }
    }
}

// ── Stage directories ─────────────────────────────────────────

/// The four stage directories under `data_dir`. Stages hand off work purely
/// through these directories; an artifact named for stage N must exist before
/// stage N+1 can read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirsConfig {
    pub data_dir: PathBuf,
}

impl DirsConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
        }
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.data_dir.join("pages")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.data_dir.join("tables")
    }

    pub fn all(&self) -> [PathBuf; 4] {
        [self.files_dir(), self.pages_dir(), self.results_dir(), self.tables_dir()]
    }
}

// ── Capture metadata ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Base URL under which original documents are published.
    pub public_base_url: String,
    /// Subject label stamped onto every record.
    pub subject_label: String,
}

impl CaptureConfig {
    fn from_env() -> Self {
        Self {
            public_base_url: env_or("PUBLIC_BASE_URL", "https://files.localhost/files"),
            subject_label: env_or("SUBJECT_LABEL", "captura"),
        }
    }

    /// Public URL for an original document name.
    pub fn file_url(&self, name_file: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), name_file)
    }
}

// ── Document extraction service ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u32,
}

impl ExtractorConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_or("EXTRACTOR_BASE_URL", "https://api.va.landing.ai"),
            api_key: env_opt("EXTRACTOR_API_KEY"),
            timeout_secs: env_u32("EXTRACTOR_TIMEOUT_SECS", 300),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ── LLM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env() -> Self {
        Self {
            provider: env_or("LLM_PROVIDER", "openai"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "o4-mini"),
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            temperature: env_or("LLM_TEMPERATURE", "1.0").parse().unwrap_or(1.0),
            max_tokens: env_u32("LLM_MAX_TOKENS", 32000),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env() -> Self {
        Self {
            url: env_or("OLLAMA_URL", "http://localhost:11434"),
            model: env_or("OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("PG_HOST", "localhost"),
            port: env_u16("PG_PORT", 5432),
            database: env_or("PG_DATABASE", "captura"),
            username: env_opt("PG_USERNAME"),
            password: env_opt("PG_PASSWORD"),
            ssl_mode: env_or("PG_SSL_MODE", "prefer"),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Table loader ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Destination table for the insert stage.
    pub dest_table: String,
    /// Literal substituted for empty cells when `use_sql_null` is false.
    pub null_sentinel: String,
    /// When true, empty cells are bound as SQL NULL instead of the sentinel.
    pub use_sql_null: bool,
}

impl LoaderConfig {
    fn from_env() -> Self {
        Self {
            dest_table: env_or("DEST_TABLE", "tbl_captura_ia"),
            null_sentinel: env_or("NULL_SENTINEL", "NULL"),
            use_sql_null: env_bool("USE_SQL_NULL", false),
        }
    }
}
