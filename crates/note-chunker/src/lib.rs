//! # notelens chunker
//!
//! Turns an ordered list of notes into text the analysis service can consume.
//!
//! ## Architecture
//!
//! ```text
//! Notes (ascending by creation time)
//!     │
//!     ├──> Assembly
//!     │    ├─> `[YYYY-MM-DD HH:MM]` header per note
//!     │    ├─> optional `[tags: a,b]` on the same line
//!     │    └─> blank line between blocks
//!     │
//!     └──> Chunking
//!          ├─> whole text when it fits the bound
//!          └─> otherwise fixed-length slices, remainder last
//! ```
//!
//! Slicing is length-based only, so a note may be split across two chunks.
//!
//! ## Example
//!
//! ```rust
//! use notelens_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig { max_chunk_chars: 4 }).unwrap();
//! let chunks = chunker.chunk_str("abcdefghij");
//! let pieces: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
//! assert_eq!(pieces, ["abcd", "efgh", "ij"]);
//! ```

mod assembler;
mod chunker;
mod config;
mod error;
mod types;

pub use assembler::{assemble, format_header};
pub use chunker::Chunker;
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use types::TextChunk;
