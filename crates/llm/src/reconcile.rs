//! Turns one LLM response into a balanced set of invoice line items.
//!
//! The model is asked for equal-length lists but routinely returns scalars
//! for some fields and lists of mismatched length for others. The anchor
//! field (`item_id`) governs the item count; every other field is padded,
//! truncated or broadcast to that length so each item comes out structurally
//! complete. Items are never silently dropped or duplicated.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use captura_core::config::{LlmConfig, OllamaConfig};
use captura_core::{InvoiceItem, ANCHOR_FIELD, EMPTY_MARKER, INVOICE_FIELDS};

use crate::prompt;
use crate::provider::{LlmError, LlmProvider, Message, Role};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("no JSON found in model response")]
    NoJsonFound,

    #[error("malformed JSON in model response: {0}")]
    MalformedJson(String),
}

/// A field value as the model returned it, before balancing.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for FieldShape {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => FieldShape::List(items),
            other => FieldShape::Scalar(other),
        }
    }
}

/// Locate the JSON payload inside a model response that may be wrapped in
/// prose or code fences.
pub fn extract_json(response: &str) -> Result<&str, ReconcileError> {
    let trimmed = response.trim();

    // Handle ```json ... ``` and bare ``` ... ``` blocks.
    if let Some(start) = trimmed.find("```") {
        let after_tick = &trimmed[start + 3..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            let inner = after_tick[content_start..content_start + end].trim();
            if !inner.is_empty() {
                return Ok(inner);
            }
        }
    }

    // First structural opener to last closer.
    let start = ['{', '['].iter().filter_map(|&c| trimmed.find(c)).min();
    let end = ['}', ']'].iter().filter_map(|&c| trimmed.rfind(c)).max();
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(trimmed[s..=e].trim()),
        _ => Err(ReconcileError::NoJsonFound),
    }
}

/// Parse the located JSON into a field → shape map.
pub fn parse_payload(response: &str) -> Result<IndexMap<String, FieldShape>, ReconcileError> {
    let json_str = extract_json(response)?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| ReconcileError::MalformedJson(e.to_string()))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(ReconcileError::MalformedJson(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    Ok(object.into_iter().map(|(k, v)| (k, FieldShape::from(v))).collect())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => EMPTY_MARKER.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Balance one field to exactly `target_len` cells: short lists pad with the
/// empty marker, long lists truncate keeping the first N, scalars broadcast.
fn balance_field(shape: Option<&FieldShape>, target_len: usize) -> Vec<String> {
    match shape {
        None => vec![EMPTY_MARKER.to_string(); target_len],
        Some(FieldShape::Scalar(value)) => vec![value_to_cell(value); target_len],
        Some(FieldShape::List(values)) => {
            let mut cells: Vec<String> =
                values.iter().take(target_len).map(value_to_cell).collect();
            cells.resize(target_len, EMPTY_MARKER.to_string());
            cells
        }
    }
}

/// Apply the anchor-and-pad policy and zip the equal-length columns into one
/// `InvoiceItem` per index.
pub fn balance_items(
    payload: &IndexMap<String, FieldShape>,
) -> Result<Vec<InvoiceItem>, ReconcileError> {
    let anchor = payload
        .get(ANCHOR_FIELD)
        .ok_or_else(|| ReconcileError::MalformedJson(format!("missing '{ANCHOR_FIELD}' field")))?;

    // A scalar anchor still describes one item.
    let item_count = match anchor {
        FieldShape::Scalar(_) => 1,
        FieldShape::List(values) => values.len(),
    };

    let anchor_cells = balance_field(Some(anchor), item_count);
    let columns: Vec<(&str, Vec<String>)> = INVOICE_FIELDS
        .iter()
        .filter(|&&f| f != ANCHOR_FIELD)
        .map(|&field| (field, balance_field(payload.get(field), item_count)))
        .collect();

    let items = (0..item_count)
        .map(|i| InvoiceItem {
            item_id: anchor_cells[i].clone(),
            fields: columns
                .iter()
                .map(|(field, cells)| (field.to_string(), cells[i].clone()))
                .collect(),
        })
        .collect();

    Ok(items)
}

/// Converts concatenated page text into balanced invoice items via an LLM,
/// with exactly one completion call per invocation.
pub struct InvoiceGenerator {
    provider: Box<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl InvoiceGenerator {
    pub fn new(provider: Box<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    /// Build from config, creating the appropriate provider.
    pub fn from_config(
        llm_config: &LlmConfig,
        ollama_config: &OllamaConfig,
    ) -> Result<Self, LlmError> {
        let provider = crate::providers::create_provider(llm_config, ollama_config)?;
        Ok(Self::new(provider, llm_config.temperature, llm_config.max_tokens))
    }

    pub async fn generate_items(
        &self,
        document_text: &str,
    ) -> Result<Vec<InvoiceItem>, ReconcileError> {
        info!("Generating invoice items from {} chars of text", document_text.len());

        let messages = vec![
            Message {
                role: Role::System,
                content: prompt::SYSTEM_PROMPT.to_string(),
            },
            Message {
                role: Role::User,
                content: prompt::user_prompt(document_text),
            },
        ];

        let response = self
            .provider
            .complete(messages, self.temperature, self.max_tokens)
            .await?;

        debug!("LLM response: {}", response);

        let payload = parse_payload(&response)?;
        let items = balance_items(&payload)?;

        info!("Reconciled {} invoice items", items.len());
        Ok(items)
    }
}
