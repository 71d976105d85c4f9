//! Offline integration test of the four-stage pipeline core.
//!
//! Since `captura-server` is a binary crate (no lib.rs), the HTTP glue itself
//! is exercised manually; this test drives the underlying stage chain
//! end-to-end through the filesystem handoff: split → extract → generate,
//! with the external extraction and LLM calls stubbed at their seams.

use std::path::Path;

use async_trait::async_trait;

use captura_core::{ChunkType, ExtractedChunk, PageMeta};
use captura_ingest::stage;
use captura_ingest::{build_records, split_to_pages, DocumentExtractor, ExtractError};
use captura_llm::{InvoiceGenerator, LlmError, LlmProvider, Message};
use captura_storage as storage;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

fn build_pdf(pages: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 36.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Extraction seam stub: one text chunk and one table chunk per page.
struct StubExtractor;

#[async_trait]
impl DocumentExtractor for StubExtractor {
    async fn parse_page(&self, _path: &Path) -> Result<Vec<ExtractedChunk>, ExtractError> {
        Ok(vec![
            ExtractedChunk {
                chunk_id: Some("c1".into()),
                chunk_type: ChunkType::Text,
                text: "Invoice INV-9 from Acme Corp".into(),
            },
            ExtractedChunk {
                chunk_id: Some("c2".into()),
                chunk_type: ChunkType::Table,
                text: "<table><tr><th>Item</th><th>Qty</th></tr>\
                       <tr><td>1</td><td>5</td></tr>\
                       <tr><td>2</td><td>3</td></tr></table>"
                    .into(),
            },
        ])
    }
}

/// LLM seam stub: three item ids but only two descriptions, fenced.
struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn complete(
        &self,
        _messages: Vec<Message>,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        Ok("```json\n{\"item_id\": [\"1\", \"2\", \"3\"], \
            \"description\": [\"Widget\", \"Gadget\"], \
            \"invoice\": \"INV-9\"}\n```"
            .to_string())
    }
}

#[tokio::test]
async fn pdf_flows_through_split_extract_generate() {
    let tmp = tempfile::tempdir().unwrap();
    let files_dir = tmp.path().join("files");
    let pages_dir = tmp.path().join("pages");
    let results_dir = tmp.path().join("results");
    let tables_dir = tmp.path().join("tables");
    std::fs::create_dir_all(&files_dir).unwrap();

    // ── split ───────────────────────────────────────────────────
    let input = files_dir.join("covalca_3.pdf");
    build_pdf(3).save(&input).unwrap();

    let pages = split_to_pages(&input, &pages_dir).unwrap();
    assert_eq!(pages, 3);
    for n in 1..=3 {
        assert!(pages_dir.join(format!("covalca_3_page_{n}.pdf")).exists());
    }

    // ── extract (page 2) ────────────────────────────────────────
    let page_name = "covalca_3_page_2.pdf";
    let (base, page) = stage::parse_page_name(page_name).unwrap();
    assert_eq!((base.as_str(), page), ("covalca_3", 2));

    let chunks = StubExtractor
        .parse_page(&pages_dir.join(page_name))
        .await
        .unwrap();
    let meta = PageMeta::stamp(
        "covalca_3.pdf",
        "https://files.example.com/covalca_3.pdf",
        page,
        "captura",
    );
    let records = build_records(chunks, &meta).unwrap();

    let results_path = results_dir.join(stage::page_file_name(&base, page, "xlsx"));
    storage::write_results(&results_path, &records).unwrap();

    let read_back = storage::read_results(&results_path).unwrap();
    assert_eq!(read_back.len(), 2);
    for record in &read_back {
        assert_eq!(record.meta.page, 2);
        assert_eq!(record.meta.name_file, "covalca_3.pdf");
    }
    assert!(read_back[1].clean_text.contains(r#"("Item", "Qty")"#));

    // ── generate ────────────────────────────────────────────────
    let document_text = read_back
        .iter()
        .map(|r| r.clean_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let generator = InvoiceGenerator::new(Box::new(StubProvider), 1.0, 1024);
    let items = generator.generate_items(&document_text).await.unwrap();
    assert_eq!(items.len(), 3, "anchor list governs the item count");
    assert_eq!(items[2].fields["description"], "");
    assert_eq!(items[0].fields["invoice"], "INV-9");

    let rows = storage::enrich(&read_back, items).unwrap();
    let generated_path = tables_dir.join(stage::generated_name("covalca_3_page_2.xlsx"));
    storage::write_generated(&generated_path, &rows).unwrap();

    let table = storage::read_generated(&generated_path).unwrap();
    assert_eq!(table.rows.len(), 3);
    // Pre-rename column names: the item_id → item, page → page_number mapping
    // is applied by the loader, not the generate stage.
    assert!(table.columns.iter().any(|c| c == "item_id"));
    assert!(table.columns.iter().any(|c| c == "page"));

    let page_idx = table.columns.iter().position(|c| c == "page").unwrap();
    let subject_idx = table.columns.iter().position(|c| c == "subject_mail").unwrap();
    for row in &table.rows {
        assert_eq!(row[page_idx], "2");
        assert_eq!(row[subject_idx], "captura");
    }

    // The generated artifact name decodes back to its source document.
    let generated_file = generated_path.file_name().unwrap().to_str().unwrap();
    assert_eq!(
        stage::source_pdf_for_generated(generated_file).unwrap(),
        "covalca_3.pdf"
    );
}
