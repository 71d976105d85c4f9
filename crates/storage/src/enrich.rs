//! Joins reconciled invoice items back to the page metadata captured during
//! extraction.

use tracing::debug;

use captura_core::{GeneratedRow, InvoiceItem, RawExtractionRecord};

use crate::error::ArtifactError;

/// Copy the page-level metadata from the extraction record set onto every
/// invoice item. One generate-stage invocation processes exactly one source
/// artifact, so the metadata is constant across all items; a record set that
/// disagrees on document identity (or carries none) cannot be enriched from.
pub fn enrich(
    records: &[RawExtractionRecord],
    items: Vec<InvoiceItem>,
) -> Result<Vec<GeneratedRow>, ArtifactError> {
    let first = records.first().ok_or_else(|| {
        ArtifactError::MetadataMismatch("no extraction records to enrich from".to_string())
    })?;

    for record in &records[1..] {
        if record.meta.name_file != first.meta.name_file {
            return Err(ArtifactError::MetadataMismatch(format!(
                "records span documents '{}' and '{}'",
                first.meta.name_file, record.meta.name_file
            )));
        }
        if record.meta.page != first.meta.page {
            return Err(ArtifactError::MetadataMismatch(format!(
                "records span pages {} and {} of '{}'",
                first.meta.page, record.meta.page, first.meta.name_file
            )));
        }
    }

    debug!(
        "enriching {} items with metadata of {} page {}",
        items.len(),
        first.meta.name_file,
        first.meta.page
    );

    Ok(items
        .into_iter()
        .map(|item| GeneratedRow {
            item,
            meta: first.meta.clone(),
        })
        .collect())
}
