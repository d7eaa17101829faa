use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::types::TextChunk;

/// Splits combined note text into bounded chunks
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk text into consecutive, non-overlapping slices of at most
    /// `max_chunk_chars` characters.
    ///
    /// Never returns an empty list: text within the bound (including the
    /// empty string) comes back as a single chunk.
    pub fn chunk_str(&self, content: &str) -> Vec<TextChunk> {
        let limit = self.config.max_chunk_chars;

        // Byte offset of every `limit`-th character boundary.
        let cuts: Vec<usize> = content
            .char_indices()
            .map(|(byte, _)| byte)
            .step_by(limit)
            .skip(1)
            .collect();

        if cuts.is_empty() {
            return vec![TextChunk::new(0, 0, content.to_string())];
        }

        let mut chunks = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for end in cuts.into_iter().chain(std::iter::once(content.len())) {
            let index = chunks.len();
            chunks.push(TextChunk::new(
                index,
                index * limit,
                content[start..end].to_string(),
            ));
            start = end;
        }

        log::debug!(
            "Split {} chars into {} chunks (max {limit})",
            content.chars().count(),
            chunks.len()
        );
        chunks
    }

    /// Same as [`Chunker::chunk_str`] but returns plain strings.
    pub fn chunk_texts(&self, content: &str) -> Vec<String> {
        self.chunk_str(content)
            .into_iter()
            .map(|chunk| chunk.content)
            .collect()
    }
}
