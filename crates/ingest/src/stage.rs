//! Filename-encoded stage state.
//!
//! The pipeline records where a file sits in the flow entirely in its name:
//! `<base>.pdf` → `<base>_page_<N>.pdf` → `<base>_page_<N>.xlsx` →
//! `<base>_page_<N>_generated.xlsx`. These are pure functions; the only I/O
//! the codec ever does is a path-shape check.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported extension for {stage} stage (expected .{expected}): {filename}")]
    UnsupportedExtension {
        stage: Stage,
        expected: &'static str,
        filename: String,
    },

    #[error("malformed page name (expected <base>_page_<N>.<ext>): {0}")]
    MalformedPageName(String),

    #[error("invalid filename outside the {stage} stage directory: {filename}")]
    OutsideStageDir { stage: Stage, filename: String },
}

/// One of the four independently triggerable transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Split,
    Extract,
    Generate,
    Insert,
}

impl Stage {
    /// Extension the stage accepts as input (canonical lowercase form).
    pub fn expected_extension(&self) -> &'static str {
        match self {
            Stage::Split | Stage::Extract => "pdf",
            Stage::Generate | Stage::Insert => "xlsx",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Split => "split",
            Stage::Extract => "extract",
            Stage::Generate => "generate",
            Stage::Insert => "insert",
        };
        f.write_str(s)
    }
}

/// Check the extension is acceptable for the stage (case-insensitively) and
/// return the filename in canonical form, extension lowercased.
pub fn validate_extension(filename: &str, stage: Stage) -> Result<String, StageError> {
    let expected = stage.expected_extension();
    let unsupported = || StageError::UnsupportedExtension {
        stage,
        expected,
        filename: filename.to_string(),
    };

    let (stem, ext) = filename.rsplit_once('.').ok_or_else(unsupported)?;
    if stem.is_empty() || !ext.eq_ignore_ascii_case(expected) {
        return Err(unsupported());
    }
    Ok(format!("{stem}.{expected}"))
}

/// Encode a page filename: `<base>_page_<N>.<ext>`, 1-based, no zero padding.
pub fn page_file_name(base: &str, page: u32, ext: &str) -> String {
    format!("{base}_page_{page}.{ext}")
}

/// Decode a page filename back into `(base, page)`. Exact inverse of
/// [`page_file_name`], including for base names that themselves contain a
/// `_page_` fragment.
pub fn parse_page_name(filename: &str) -> Result<(String, u32), StageError> {
    let malformed = || StageError::MalformedPageName(filename.to_string());

    let (stem, _ext) = filename.rsplit_once('.').ok_or_else(malformed)?;
    let idx = stem.rfind("_page_").ok_or_else(malformed)?;
    let base = &stem[..idx];
    let number = &stem[idx + "_page_".len()..];
    if base.is_empty() || number.is_empty() {
        return Err(malformed());
    }
    let page: u32 = number.parse().map_err(|_| malformed())?;
    Ok((base.to_string(), page))
}

/// Derive the original document name from a page-stage filename:
/// `covalca_3_page_16.pdf` → `covalca_3.pdf`.
pub fn original_document_name(filename: &str) -> Result<String, StageError> {
    let (base, _page) = parse_page_name(filename)?;
    Ok(format!("{base}.pdf"))
}

/// Whether a filename already carries the `_generated` suffix. Used to avoid
/// double-processing in the generate stage.
pub fn is_generated(filename: &str) -> bool {
    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);
    stem.ends_with("_generated")
}

/// Output name for the generate stage: `covalca_1_page_1.xlsx` →
/// `covalca_1_page_1_generated.xlsx`.
pub fn generated_name(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);
    format!("{stem}_generated.xlsx")
}

/// Derive the original PDF from a generated artifact name:
/// `covalca_9_page_3_generated.xlsx` → `covalca_9.pdf`.
pub fn source_pdf_for_generated(filename: &str) -> Result<String, StageError> {
    let malformed = || StageError::MalformedPageName(filename.to_string());

    let stem = filename.rsplit_once('.').map(|(s, _)| s).ok_or_else(malformed)?;
    let stem = stem.strip_suffix("_generated").ok_or_else(malformed)?;
    original_document_name(&format!("{stem}.xlsx"))
}

/// Resolve a client-supplied filename inside a stage directory, rejecting
/// anything that would escape it (separators, `..`, absolute paths).
pub fn resolve_in_dir(dir: &Path, filename: &str, stage: Stage) -> Result<PathBuf, StageError> {
    let candidate = Path::new(filename);
    let is_plain = matches!(
        candidate.components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if !is_plain {
        return Err(StageError::OutsideStageDir {
            stage,
            filename: filename.to_string(),
        });
    }
    Ok(dir.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_name_round_trips() {
        for (base, page) in [("covalca_3", 1), ("covalca_3", 16), ("a", 999), ("x_page_1", 3)] {
            let name = page_file_name(base, page, "pdf");
            assert_eq!(parse_page_name(&name).unwrap(), (base.to_string(), page));
        }
    }

    #[test]
    fn split_accepts_pdf_case_insensitively() {
        assert_eq!(validate_extension("a.pdf", Stage::Split).unwrap(), "a.pdf");
        assert_eq!(validate_extension("a.PDF", Stage::Split).unwrap(), "a.pdf");
        assert_eq!(validate_extension("a.Pdf", Stage::Split).unwrap(), "a.pdf");
    }

    #[test]
    fn split_rejects_non_pdf() {
        assert!(matches!(
            validate_extension("a.docx", Stage::Split),
            Err(StageError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            validate_extension("no_extension", Stage::Split),
            Err(StageError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn generate_requires_xlsx() {
        assert_eq!(
            validate_extension("covalca_1_page_1.XLSX", Stage::Generate).unwrap(),
            "covalca_1_page_1.xlsx"
        );
        assert!(matches!(
            validate_extension("covalca_1_page_1.pdf", Stage::Generate),
            Err(StageError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn parse_rejects_missing_or_non_numeric_page() {
        assert!(matches!(
            parse_page_name("covalca_3.pdf"),
            Err(StageError::MalformedPageName(_))
        ));
        assert!(matches!(
            parse_page_name("covalca_3_page_x.pdf"),
            Err(StageError::MalformedPageName(_))
        ));
        assert!(matches!(
            parse_page_name("_page_3.pdf"),
            Err(StageError::MalformedPageName(_))
        ));
    }

    #[test]
    fn original_name_drops_page_suffix() {
        assert_eq!(
            original_document_name("covalca_3_page_16.pdf").unwrap(),
            "covalca_3.pdf"
        );
    }

    #[test]
    fn generated_suffix_detection() {
        assert!(is_generated("covalca_9_page_3_generated.xlsx"));
        assert!(!is_generated("covalca_9_page_3.xlsx"));
        assert_eq!(
            generated_name("covalca_1_page_1.xlsx"),
            "covalca_1_page_1_generated.xlsx"
        );
    }

    #[test]
    fn generated_name_maps_back_to_source_pdf() {
        assert_eq!(
            source_pdf_for_generated("covalca_9_page_3_generated.xlsx").unwrap(),
            "covalca_9.pdf"
        );
        assert!(source_pdf_for_generated("covalca_9_page_3.xlsx").is_err());
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = Path::new("/srv/pages");
        assert!(resolve_in_dir(dir, "ok.pdf", Stage::Extract).is_ok());
        assert!(resolve_in_dir(dir, "../etc/passwd", Stage::Extract).is_err());
        assert!(resolve_in_dir(dir, "/etc/passwd", Stage::Extract).is_err());
        assert!(resolve_in_dir(dir, "nested/ok.pdf", Stage::Extract).is_err());
    }
}
