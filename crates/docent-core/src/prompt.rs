use docent_index::RetrievalResult;

use crate::catalog::Catalog;

/// Returned when the model produces no usable text.
pub const NO_ANSWER: &str = "No answer generated.";

pub const ANSWER_INSTRUCTION: &str = "Answer the question using only the context above.";

pub const DEFAULT_ROUTER_INSTRUCTIONS: &str = "\
You answer questions about the product using its official documents only.
For every user question, call the `get_answer_from_collection` tool exactly once. Pick the single
most relevant collection from the list below as `collection_name` and pass the user's question,
rewritten to stand on its own, as `query`. Never answer from your own knowledge.";

/// Grounded prompt: retrieved chunks verbatim, then the question, then the instruction.
#[must_use]
pub fn build_answer_prompt(context: &RetrievalResult, query: &str) -> String {
    let context = context.texts().collect::<Vec<_>>().join("\n\n");
    format!("Context:\n{context}\n\nQuestion:\n{query}\n\n{ANSWER_INSTRUCTION}")
}

/// Router system prompt: configured instructions followed by the collection list.
#[must_use]
pub fn build_router_prompt(instructions: &str, catalog: &Catalog) -> String {
    format!(
        "{}\n\nThe available document collections are:\n{}\nIf no collection fits, use {}.",
        instructions.trim_end(),
        catalog.describe(),
        catalog.default_collection
    )
}
