//! Flattens embedded HTML table fragments into plain structured text usable
//! as LLM input.

use captura_core::ChunkType;
use scraper::{Html, Selector};

/// Extract the first `<table>` in an HTML fragment as row-major cell text,
/// column order preserved. No table → empty vec.
pub fn table_to_rows(html: &str) -> Vec<Vec<String>> {
    let table_sel = Selector::parse("table").expect("static selector");
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("th, td").expect("static selector");

    let fragment = Html::parse_fragment(html);
    let Some(table) = fragment.select(&table_sel).next() else {
        return Vec::new();
    };

    table
        .select(&row_sel)
        .map(|row| {
            row.select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect()
        })
        .collect()
}

/// Render rows as a list of tuples, the shape the invoice prompt refers to:
/// `[("Qty", "Description"), ("2", "Widget")]`.
pub fn render_rows(rows: &[Vec<String>]) -> String {
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:?}")).collect();
            format!("({})", cells.join(", "))
        })
        .collect();
    format!("[{}]", tuples.join(", "))
}

/// Derive the `clean_text` field for one chunk: table chunks flatten to cell
/// tuples, everything else passes the raw text through.
pub fn clean_text(chunk_type: ChunkType, text: &str) -> String {
    match chunk_type {
        ChunkType::Table => render_rows(&table_to_rows(text)),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_flattens_row_major() {
        let html = "<table><tr><th>Qty</th><th>Description</th></tr>\
                    <tr><td>2</td><td>Widget</td></tr></table>";
        let rows = table_to_rows(html);
        assert_eq!(
            rows,
            vec![
                vec!["Qty".to_string(), "Description".to_string()],
                vec!["2".to_string(), "Widget".to_string()],
            ]
        );
        assert_eq!(
            render_rows(&rows),
            r#"[("Qty", "Description"), ("2", "Widget")]"#
        );
    }

    #[test]
    fn cell_text_is_trimmed_and_nested_markup_collapsed() {
        let html = "<table><tr><td>  <b>Total</b> USD </td></tr></table>";
        assert_eq!(table_to_rows(html), vec![vec!["Total USD".to_string()]]);
    }

    #[test]
    fn fragment_without_table_yields_nothing() {
        assert!(table_to_rows("<p>no tables here</p>").is_empty());
        assert_eq!(render_rows(&[]), "[]");
    }

    #[test]
    fn clean_text_passes_non_tables_through() {
        assert_eq!(clean_text(ChunkType::Text, "Invoice 42"), "Invoice 42");
        assert_eq!(
            clean_text(ChunkType::Table, "<table><tr><td>a</td></tr></table>"),
            r#"[("a")]"#
        );
    }
}
