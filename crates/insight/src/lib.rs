//! Local writing-pattern statistics, merging of per-chunk analyses and the
//! request-scoped pipeline that ties them to a note source and an analyser.

pub mod aggregate;
pub mod compose;
mod error;
pub mod pattern;
mod pipeline;

pub use aggregate::merge_chunk_results;
pub use compose::{compose_report, error_envelope};
pub use error::{AnalysisError, PipelineError, SourceError};
pub use pipeline::{ChunkAnalyzer, NoteQuery, NoteSource, Pipeline, DEFAULT_REQUEST_TIMEOUT};
