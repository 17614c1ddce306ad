use super::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks.
    pub chunk_overlap: usize,
    /// Prefer ending chunks at paragraph, line, sentence or word boundaries.
    pub boundary_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundary_aware: true,
        }
    }
}

pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        split_chars(
            &document.content,
            self.config.chunk_size,
            self.config.chunk_overlap,
            self.config.boundary_aware,
        )
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk {
            content,
            metadata: document.metadata.clone(),
            chunk_index: i,
        })
        .collect()
    }
}

/// Split `text` into chunks of at most `max_size` characters where each chunk after the first
/// starts with the last `overlap` characters of its predecessor.
///
/// Dropping the first `overlap` characters of every chunk but the first and concatenating
/// reproduces `text`. `overlap` is clamped to `max_size - 1`; a `max_size` of 0 is treated as 1.
#[must_use]
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    split_chars(text, max_size, overlap, true)
}

fn split_chars(text: &str, max_size: usize, overlap: usize, boundary_aware: bool) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let max_size = max_size.max(1);
    let overlap = overlap.min(max_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        if chars.len() - start <= max_size {
            chunks.push(chars[start..].iter().collect());
            break;
        }
        let hard_end = start + max_size;
        // end > start + overlap guarantees the next start advances.
        let end = if boundary_aware {
            find_boundary(&chars, start + overlap + 1, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };
        chunks.push(chars[start..end].iter().collect());
        start = end - overlap;
    }
    chunks
}

/// Latest cut position in `lo..=hi` (exclusive chunk end) at the strongest boundary available.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    let is_terminator = |c: char| matches!(c, '.' | '?' | '!');
    let rules: [&dyn Fn(usize) -> bool; 4] = [
        &|e| e >= 2 && chars[e - 2] == '\n' && chars[e - 1] == '\n',
        &|e| chars[e - 1] == '\n',
        &|e| e >= 2 && is_terminator(chars[e - 2]) && chars[e - 1].is_whitespace(),
        &|e| chars[e - 1].is_whitespace(),
    ];
    rules
        .iter()
        .find_map(|rule| (lo..=hi).rev().find(|&e| rule(e)))
}
