//! Maps a finalized generated artifact onto the destination table.
//!
//! Inserts are deliberately per-row rather than one bulk statement or one
//! wrapping transaction: a single malformed row is reported by index and
//! reason while the remaining rows still land.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use captura_core::config::LoaderConfig;
use captura_storage::Table;

/// Load-time column renames applied to the generated artifact.
const RENAMES: [(&str, &str); 2] = [("item_id", "item"), ("page", "page_number")];

#[derive(Debug, Serialize)]
pub struct RowInsertFailure {
    /// 1-based data-row index within the artifact.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows_attempted: usize,
    pub rows_inserted: usize,
    pub failures: Vec<RowInsertFailure>,
}

/// Apply the load-time renames, leaving every other column untouched.
pub fn renamed_columns(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|c| {
            RENAMES
                .iter()
                .find(|(from, _)| c == from)
                .map(|(_, to)| to.to_string())
                .unwrap_or_else(|| c.clone())
        })
        .collect()
}

/// Resolve one cell through the null-sentinel policy. `None` binds as SQL
/// NULL; `Some` binds the text as-is.
pub fn cell_value(cell: &str, config: &LoaderConfig) -> Option<String> {
    if cell.trim().is_empty() {
        if config.use_sql_null {
            None
        } else {
            Some(config.null_sentinel.clone())
        }
    } else {
        Some(cell.to_string())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', ""))
}

/// Insert every artifact row into the destination table, one statement per
/// row, collecting failures instead of aborting.
pub async fn load_table(
    pool: &PgPool,
    config: &LoaderConfig,
    table: &Table,
) -> LoadReport {
    let columns = renamed_columns(&table.columns);
    let cols_sql = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&config.dest_table),
        cols_sql,
        placeholders
    );

    let mut inserted = 0usize;
    let mut failures = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let mut query = sqlx::query(&sql);
        for cell in row {
            query = query.bind(cell_value(cell, config));
        }
        match query.execute(pool).await {
            Ok(_) => inserted += 1,
            Err(e) => {
                warn!("row {} failed to insert into {}: {}", i + 1, config.dest_table, e);
                failures.push(RowInsertFailure {
                    row: i + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "inserted {}/{} rows into {}",
        inserted,
        table.rows.len(),
        config.dest_table
    );

    LoadReport {
        table: config.dest_table.clone(),
        rows_attempted: table.rows.len(),
        rows_inserted: inserted,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(use_sql_null: bool) -> LoaderConfig {
        LoaderConfig {
            dest_table: "tbl_captura_ia".into(),
            null_sentinel: "NULL".into(),
            use_sql_null,
        }
    }

    #[test]
    fn designated_columns_are_renamed() {
        let columns: Vec<String> = ["item_id", "description", "page", "page_number_note"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            renamed_columns(&columns),
            vec!["item", "description", "page_number", "page_number_note"]
        );
    }

    #[test]
    fn rename_is_a_no_op_when_columns_absent() {
        let columns: Vec<String> = vec!["foo".into(), "bar".into()];
        assert_eq!(renamed_columns(&columns), columns);
    }

    #[test]
    fn empty_cells_become_the_sentinel_literal() {
        let cfg = config(false);
        assert_eq!(cell_value("", &cfg), Some("NULL".to_string()));
        assert_eq!(cell_value("   ", &cfg), Some("NULL".to_string()));
        assert_eq!(cell_value("x", &cfg), Some("x".to_string()));
    }

    #[test]
    fn empty_cells_become_sql_null_when_configured() {
        let cfg = config(true);
        assert_eq!(cell_value("", &cfg), None);
        assert_eq!(cell_value("x", &cfg), Some("x".to_string()));
    }

    #[test]
    fn identifiers_are_quoted_and_sanitized() {
        assert_eq!(quote_ident("page_number"), "\"page_number\"");
        assert_eq!(quote_ident("evil\"ident"), "\"evilident\"");
    }
}
