pub mod error;
pub mod loader;
pub mod pipeline;
pub mod splitter;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use error::{DocumentError, IngestError};
pub use loader::TextLoader;
pub use pipeline::{DocumentOutcome, IngestReport, IngestStatus, IngestionPipeline};
pub use splitter::{SplitterConfig, TextSplitter, split_text};
pub use types::{Chunk, Document, DocumentMetadata, chunk_id};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>;

    fn supported_extensions(&self) -> &[&str];
}

/// Collection a source file is indexed into: its file stem, verbatim.
///
/// `data/Pricing_Plan.txt` -> `Pricing_Plan`.
#[must_use]
pub fn collection_name_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
