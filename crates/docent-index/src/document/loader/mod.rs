#[cfg(feature = "pdf")]
mod pdf;
mod text;

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::DocumentLoader;

/// Loaders available in this build: text always, PDF with the `pdf` feature.
#[must_use]
pub fn default_loaders(max_file_size: u64) -> Vec<Box<dyn DocumentLoader>> {
    #[allow(unused_mut)]
    let mut loaders: Vec<Box<dyn DocumentLoader>> = vec![Box::new(TextLoader { max_file_size })];
    #[cfg(feature = "pdf")]
    loaders.push(Box::new(PdfLoader { max_file_size }));
    loaders
}
