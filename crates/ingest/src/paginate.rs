use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;
use tracing::info;

use crate::stage::page_file_name;

#[derive(Debug, Error)]
pub enum PaginateError {
    #[error("corrupt document {path}: {reason}")]
    CorruptDocument { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split one PDF into per-page PDFs named `<base>_page_<N>.pdf`, 1-based.
///
/// Every single-page document is materialized in memory before anything is
/// written, so an unreadable or zero-page source never leaves partial output
/// behind. Creates `out_dir` if absent. Returns the page count.
pub fn split_to_pages(input: &Path, out_dir: &Path) -> Result<usize, PaginateError> {
    let corrupt = |reason: String| PaginateError::CorruptDocument {
        path: input.display().to_string(),
        reason,
    };

    let doc = Document::load(input).map_err(|e| corrupt(e.to_string()))?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(corrupt("document has no pages".to_string()));
    }

    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| corrupt("input has no usable file stem".to_string()))?;

    let mut singles: Vec<(PathBuf, Document)> = Vec::with_capacity(page_numbers.len());
    for &page_no in &page_numbers {
        let mut single = doc.clone();
        let others: Vec<u32> = page_numbers.iter().copied().filter(|&p| p != page_no).collect();
        single.delete_pages(&others);
        single.prune_objects();
        single.renumber_objects();
        singles.push((out_dir.join(page_file_name(base, page_no, "pdf")), single));
    }

    fs::create_dir_all(out_dir)?;
    for (path, mut single) in singles {
        single.save(&path).map_err(|e| PaginateError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    info!("split {} into {} pages under {}", input.display(), page_numbers.len(), out_dir.display());
    Ok(page_numbers.len())
}
