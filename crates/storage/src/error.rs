use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read spreadsheet {path}: {reason}")]
    Spreadsheet { path: String, reason: String },

    #[error("failed to write spreadsheet {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("artifact {path} is missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("artifact {path} contains no rows")]
    Empty { path: String },

    #[error("metadata mismatch: {0}")]
    MetadataMismatch(String),
}
