use serde::{Deserialize, Serialize};

/// A bounded slice of the combined note text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in production order (0-indexed)
    pub index: usize,

    /// Offset of the first character within the combined text
    pub start_char: usize,

    /// The chunk text
    pub content: String,
}

impl TextChunk {
    #[must_use]
    pub const fn new(index: usize, start_char: usize, content: String) -> Self {
        Self {
            index,
            start_char,
            content,
        }
    }

    /// Length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Offset one past the last character
    #[must_use]
    pub fn end_char(&self) -> usize {
        self.start_char + self.char_len()
    }
}
