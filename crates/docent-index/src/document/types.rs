use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
}

/// Stable id of the `index`-th chunk of a collection: `{collection}_doc_{index}`.
#[must_use]
pub fn chunk_id(collection: &str, index: usize) -> String {
    format!("{collection}_doc_{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_format() {
        assert_eq!(chunk_id("Pricing_Plan", 0), "Pricing_Plan_doc_0");
        assert_eq!(chunk_id("About_Us", 12), "About_Us_doc_12");
    }
}
