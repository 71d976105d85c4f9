//! The invoice-to-JSON prompt.

use std::fmt::Write;

pub use captura_core::{ANCHOR_FIELD, INVOICE_FIELDS};

pub const SYSTEM_PROMPT: &str = "You are an AI invoice → JSON converter.\n\
Your only goal is to transform user-supplied document text into one valid JSON \
object that exactly matches the schema the user provides.\n\
Output ONLY that JSON – no prose, no markdown fences, no explanations.";

/// Render the JSON schema block: every field maps to a list of strings.
fn schema_block() -> String {
    let mut schema = String::from("{\n");
    for (i, field) in INVOICE_FIELDS.iter().enumerate() {
        let comma = if i + 1 < INVOICE_FIELDS.len() { "," } else { "" };
        let _ = writeln!(schema, "  \"{field}\": [<str>, …]{comma}");
    }
    schema.push('}');
    schema
}

/// Build the user prompt around the concatenated clean text of one page.
pub fn user_prompt(document_text: &str) -> String {
    format!(
        "## TASK\n\
         Convert the text in **INPUT** into a single JSON object that follows the \
         schema in **SCHEMA**.\n\
         The number of rows equals the count of unique `{ANCHOR_FIELD}` values.\n\
         Ensure every list has that same length.\n\
         \n\
         ## INPUT\n\
         {document_text}\n\
         \n\
         ## SCHEMA\n\
         {schema}\n\
         \n\
         ## RULES\n\
         1. Return **only** the JSON object above; no extra keys, commentary or markdown.\n\
         2. Number the items yourself if the invoice does not carry a numeric `{ANCHOR_FIELD}`.\n\
         3. Use valid UTF-8, standard double quotes, no trailing commas.\n\
         4. Extract only the customer's postal address; ignore email, phone and fax lines.",
        schema = schema_block(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_every_field_once() {
        let schema = schema_block();
        for field in INVOICE_FIELDS {
            assert_eq!(schema.matches(&format!("\"{field}\"")).count(), 1);
        }
    }

    #[test]
    fn user_prompt_embeds_document_and_schema() {
        let prompt = user_prompt("Invoice 42 from Acme");
        assert!(prompt.contains("Invoice 42 from Acme"));
        assert!(prompt.contains("\"item_id\""));
        assert!(prompt.contains("\"due_date\": [<str>, …]\n}"), "last field carries no comma");
    }

    #[test]
    fn anchor_is_part_of_the_schema() {
        assert!(INVOICE_FIELDS.contains(&ANCHOR_FIELD));
    }
}
