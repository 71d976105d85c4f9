use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Empty marker written into padded cells. Distinct from the load-time null
/// sentinel, which is only substituted at the database boundary.
pub const EMPTY_MARKER: &str = "";

/// Invoice schema fields in artifact column order. `item_id` anchors the
/// reconciled item count.
pub const INVOICE_FIELDS: [&str; 21] = [
    "description",
    "codigo_1",
    "quantity",
    "unit_price_usd",
    "amount_usd",
    "customer",
    "origin",
    "brand",
    "part_number",
    "invoice",
    "sender",
    "unit",
    "currency",
    "incoterm",
    "item_id",
    "invoice_date",
    "customer_address",
    "codigo_2",
    "invoice_total",
    "subtotal",
    "due_date",
];

/// The field whose list length governs the reconciled item count.
pub const ANCHOR_FIELD: &str = "item_id";

/// Metadata column names shared by the results and generated artifacts,
/// in artifact column order.
pub const META_COLUMNS: [&str; 6] = [
    "name_file",
    "url_file",
    "page",
    "active",
    "capture_log",
    "subject_mail",
];

/// Page-level metadata captured at extraction time. Copied, never referenced,
/// onto every downstream record so each record is self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Original document name, e.g. "covalca_3.pdf".
    pub name_file: String,
    /// Public URL of the original document.
    pub url_file: String,
    /// 1-based page index within the original document.
    pub page: u32,
    /// Active flag, stored as "1".
    pub active: String,
    /// Capture timestamp, "%Y-%m-%d %H:%M:%S" in UTC.
    pub capture_log: String,
    /// Originating subject label.
    pub subject_mail: String,
}

impl PageMeta {
    /// Stamp metadata for one page, capturing the current time.
    pub fn stamp(name_file: &str, url_file: &str, page: u32, subject: &str) -> Self {
        Self {
            name_file: name_file.to_string(),
            url_file: url_file.to_string(),
            page,
            active: "1".to_string(),
            capture_log: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            subject_mail: subject.to_string(),
        }
    }
}

/// Kind of an extracted content chunk. Unknown kinds map to `Other` rather
/// than failing the whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
    Table,
    Figure,
    Marginalia,
    Other,
}

impl<'de> Deserialize<'de> for ChunkType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.to_lowercase().as_str() {
            "text" => ChunkType::Text,
            "table" => ChunkType::Table,
            "figure" => ChunkType::Figure,
            "marginalia" => ChunkType::Marginalia,
            _ => ChunkType::Other,
        })
    }
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Table => "table",
            ChunkType::Figure => "figure",
            ChunkType::Marginalia => "marginalia",
            ChunkType::Other => "other",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "text" => ChunkType::Text,
            "table" => ChunkType::Table,
            "figure" => ChunkType::Figure,
            "marginalia" => ChunkType::Marginalia,
            _ => ChunkType::Other,
        })
    }
}

/// One content chunk as returned by the extraction backend, in extraction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedChunk {
    pub chunk_id: Option<String>,
    pub chunk_type: ChunkType,
    /// Raw fragment: HTML for table chunks, plain text otherwise.
    pub text: String,
}

/// One row of the results artifact: a chunk joined with its page metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtractionRecord {
    pub chunk_id: String,
    /// 1-based chunk ordinal within the page.
    pub chunk: u32,
    pub chunk_type: String,
    pub text_html: String,
    pub clean_text: String,
    pub meta: PageMeta,
}

/// One reconciled invoice line item: the anchor identifier plus the remaining
/// schema fields in declaration order. Every value is a string; padded slots
/// hold `EMPTY_MARKER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item_id: String,
    pub fields: IndexMap<String, String>,
}

/// An `InvoiceItem` enriched with the page metadata it was derived from.
/// The unit stored in the generated artifact and loaded to the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedRow {
    pub item: InvoiceItem,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_type_round_trips_through_str() {
        for ct in [ChunkType::Text, ChunkType::Table, ChunkType::Figure, ChunkType::Marginalia] {
            assert_eq!(ct.as_str().parse::<ChunkType>().unwrap(), ct);
        }
    }

    #[test]
    fn unknown_chunk_type_maps_to_other() {
        assert_eq!("logo".parse::<ChunkType>().unwrap(), ChunkType::Other);
    }

    #[test]
    fn stamped_meta_is_self_describing() {
        let meta = PageMeta::stamp("covalca_3.pdf", "https://files.example.com/covalca_3.pdf", 16, "captura");
        assert_eq!(meta.page, 16);
        assert_eq!(meta.active, "1");
        assert!(!meta.capture_log.is_empty());
    }
}
