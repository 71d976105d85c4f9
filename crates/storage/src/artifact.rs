//! Spreadsheet artifact layer.
//!
//! Stages hand off work as `.xlsx` workbooks with a single header row. Writes
//! publish atomically (temp file + rename) so an artifact only ever appears on
//! full success; a crashed stage leaves nothing behind for the next poll to
//! pick up half-written.

use std::fs;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use tracing::info;

use captura_core::{GeneratedRow, PageMeta, RawExtractionRecord, INVOICE_FIELDS, META_COLUMNS};

use crate::error::ArtifactError;

/// Column order of the results artifact.
pub const RESULTS_COLUMNS: [&str; 11] = [
    "chunk_id",
    "chunk",
    "chunk_type",
    "text_html",
    "clean_text",
    "name_file",
    "url_file",
    "page",
    "active",
    "capture_log",
    "subject_mail",
];

/// Column order of the generated artifact: invoice fields then metadata.
/// The load-time renames (`item_id`→`item`, `page`→`page_number`) are NOT
/// applied here.
pub fn generated_columns() -> Vec<&'static str> {
    INVOICE_FIELDS.iter().chain(META_COLUMNS.iter()).copied().collect()
}

/// A raw spreadsheet: header plus string rows. What the table loader consumes.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// True when `output` already exists and is at least as new as `input`;
/// a duplicate stage invocation can then no-op instead of recomputing.
pub fn is_up_to_date(input: &Path, output: &Path) -> bool {
    let newer = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (newer(input), newer(output)) {
        (Some(i), Some(o)) => o >= i,
        _ => false,
    }
}

fn meta_cell(meta: &PageMeta, column: &str) -> String {
    match column {
        "name_file" => meta.name_file.clone(),
        "url_file" => meta.url_file.clone(),
        "page" => meta.page.to_string(),
        "active" => meta.active.clone(),
        "capture_log" => meta.capture_log.clone(),
        "subject_mail" => meta.subject_mail.clone(),
        _ => String::new(),
    }
}

fn save_atomically(
    workbook: &mut Workbook,
    path: &Path,
) -> Result<(), ArtifactError> {
    let tmp = path.with_extension("xlsx.tmp");
    workbook.save(&tmp).map_err(|e| ArtifactError::Write {
        path: tmp.display().to_string(),
        reason: e.to_string(),
    })?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn write_rows(
    path: &Path,
    columns: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<usize, ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let write_err = |e: rust_xlsxwriter::XlsxError| ArtifactError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name).map_err(write_err)?;
    }

    let mut count = 0usize;
    for (row_idx, row) in rows.enumerate() {
        for (col, cell) in row.iter().enumerate() {
            worksheet
                .write_string((row_idx + 1) as u32, col as u16, cell)
                .map_err(write_err)?;
        }
        count += 1;
    }

    save_atomically(&mut workbook, path)?;
    Ok(count)
}

/// Persist the results artifact: one row per extraction record.
pub fn write_results(path: &Path, records: &[RawExtractionRecord]) -> Result<(), ArtifactError> {
    let rows = records.iter().map(|r| {
        vec![
            r.chunk_id.clone(),
            r.chunk.to_string(),
            r.chunk_type.clone(),
            r.text_html.clone(),
            r.clean_text.clone(),
            meta_cell(&r.meta, "name_file"),
            meta_cell(&r.meta, "url_file"),
            meta_cell(&r.meta, "page"),
            meta_cell(&r.meta, "active"),
            meta_cell(&r.meta, "capture_log"),
            meta_cell(&r.meta, "subject_mail"),
        ]
    });
    let count = write_rows(path, &RESULTS_COLUMNS, rows)?;
    info!("wrote {} extraction records to {}", count, path.display());
    Ok(())
}

/// Persist the generated artifact: one row per enriched invoice item.
pub fn write_generated(path: &Path, rows: &[GeneratedRow]) -> Result<(), ArtifactError> {
    let columns = generated_columns();
    let data = rows.iter().map(|row| {
        columns
            .iter()
            .map(|&column| {
                if column == "item_id" {
                    row.item.item_id.clone()
                } else if let Some(value) = row.item.fields.get(column) {
                    value.clone()
                } else {
                    meta_cell(&row.meta, column)
                }
            })
            .collect()
    });
    let count = write_rows(path, &columns, data)?;
    info!("wrote {} generated rows to {}", count, path.display());
    Ok(())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read any artifact as a raw header + string-rows table.
pub fn read_table(path: &Path) -> Result<Table, ArtifactError> {
    let spreadsheet_err = |reason: String| ArtifactError::Spreadsheet {
        path: path.display().to_string(),
        reason,
    };

    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| spreadsheet_err(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    let first = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| spreadsheet_err("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| spreadsheet_err(e.to_string()))?;

    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(cell_to_string).collect())
        .unwrap_or_default();
    if columns.is_empty() {
        return Err(ArtifactError::Empty {
            path: path.display().to_string(),
        });
    }

    let data: Vec<Vec<String>> = rows
        .map(|row| {
            let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
            cells.resize(columns.len(), String::new());
            cells
        })
        .collect();

    Ok(Table {
        columns,
        rows: data,
    })
}

/// Read the generated artifact for loading; empty artifacts are an error.
pub fn read_generated(path: &Path) -> Result<Table, ArtifactError> {
    let table = read_table(path)?;
    if table.rows.is_empty() {
        return Err(ArtifactError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(table)
}

/// Read the results artifact back into typed extraction records.
pub fn read_results(path: &Path) -> Result<Vec<RawExtractionRecord>, ArtifactError> {
    let table = read_table(path)?;

    let col = |name: &str| -> Result<usize, ArtifactError> {
        table
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ArtifactError::MissingColumn {
                path: path.display().to_string(),
                column: name.to_string(),
            })
    };

    let chunk_id = col("chunk_id")?;
    let chunk = col("chunk")?;
    let chunk_type = col("chunk_type")?;
    let text_html = col("text_html")?;
    let clean_text = col("clean_text")?;
    let name_file = col("name_file")?;
    let url_file = col("url_file")?;
    let page = col("page")?;
    let active = col("active")?;
    let capture_log = col("capture_log")?;
    let subject_mail = col("subject_mail")?;

    table
        .rows
        .iter()
        .map(|row| {
            let page_value: u32 =
                row[page]
                    .parse()
                    .map_err(|_| ArtifactError::Spreadsheet {
                        path: path.display().to_string(),
                        reason: format!("non-numeric page value '{}'", row[page]),
                    })?;
            Ok(RawExtractionRecord {
                chunk_id: row[chunk_id].clone(),
                chunk: row[chunk].parse().unwrap_or(0),
                chunk_type: row[chunk_type].clone(),
                text_html: row[text_html].clone(),
                clean_text: row[clean_text].clone(),
                meta: PageMeta {
                    name_file: row[name_file].clone(),
                    url_file: row[url_file].clone(),
                    page: page_value,
                    active: row[active].clone(),
                    capture_log: row[capture_log].clone(),
                    subject_mail: row[subject_mail].clone(),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use captura_core::InvoiceItem;
    use indexmap::IndexMap;

    fn meta(page: u32) -> PageMeta {
        PageMeta {
            name_file: "covalca_3.pdf".into(),
            url_file: "https://files.example.com/covalca_3.pdf".into(),
            page,
            active: "1".into(),
            capture_log: "2026-08-06 12:00:00".into(),
            subject_mail: "captura".into(),
        }
    }

    fn record(chunk: u32) -> RawExtractionRecord {
        RawExtractionRecord {
            chunk_id: format!("c{chunk}"),
            chunk,
            chunk_type: "table".into(),
            text_html: "<table><tr><td>a</td></tr></table>".into(),
            clean_text: r#"[("a")]"#.into(),
            meta: meta(16),
        }
    }

    #[test]
    fn results_round_trip_is_row_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("covalca_3_page_16.xlsx");

        let records = vec![record(1), record(2)];
        write_results(&path, &records).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("xlsx.tmp").exists(), "temp file must not remain");

        let back = read_results(&path).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in records.iter().zip(&back) {
            assert_eq!(a.chunk_id, b.chunk_id);
            assert_eq!(a.chunk, b.chunk);
            assert_eq!(a.clean_text, b.clean_text);
            assert_eq!(a.meta, b.meta);
        }
    }

    #[test]
    fn generated_artifact_keeps_artifact_column_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("covalca_3_page_16_generated.xlsx");

        let mut fields = IndexMap::new();
        fields.insert("description".to_string(), "Widget".to_string());
        let rows = vec![GeneratedRow {
            item: InvoiceItem {
                item_id: "1".into(),
                fields,
            },
            meta: meta(16),
        }];
        write_generated(&path, &rows).unwrap();

        let table = read_generated(&path).unwrap();
        // Renames happen at load time, not generate time.
        assert!(table.columns.iter().any(|c| c == "item_id"));
        assert!(table.columns.iter().any(|c| c == "page"));
        assert_eq!(table.rows.len(), 1);

        let item_idx = table.columns.iter().position(|c| c == "item_id").unwrap();
        let page_idx = table.columns.iter().position(|c| c == "page").unwrap();
        assert_eq!(table.rows[0][item_idx], "1");
        assert_eq!(table.rows[0][page_idx], "16");
    }

    #[test]
    fn empty_generated_artifact_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty_generated.xlsx");
        write_generated(&path, &[]).unwrap();
        assert!(matches!(
            read_generated(&path),
            Err(ArtifactError::Empty { .. })
        ));
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "chunk_id").unwrap();
        sheet.write_string(1, 0, "c1").unwrap();
        workbook.save(&path).unwrap();

        match read_results(&path) {
            Err(ArtifactError::MissingColumn { column, .. }) => assert_eq!(column, "chunk"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn freshness_check_tracks_mtimes() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("input.xlsx");
        let output = tmp.path().join("output.xlsx");

        fs::write(&input, b"in").unwrap();
        assert!(!is_up_to_date(&input, &output), "missing output is stale");

        fs::write(&output, b"out").unwrap();
        assert!(is_up_to_date(&input, &output));
    }
}
