use crate::aggregate::merge_chunk_results;
use crate::compose::{compose_report, error_envelope};
use crate::error::{AnalysisError, PipelineError, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notelens_chunker::{assemble, Chunker};
use notelens_protocol::{ChunkAnalysis, ContentSection, Note, ReportEnvelope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default end-to-end budget for one run (note fetch plus all chunk calls).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Inclusive instant range of notes to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Supplies notes ascending by creation time, each with non-empty text.
#[async_trait]
pub trait NoteSource: Send + Sync {
    async fn fetch_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, SourceError>;
}

/// Analyses one chunk of combined text.
#[async_trait]
pub trait ChunkAnalyzer: Send + Sync {
    async fn analyze(&self, chunk: &str) -> Result<ChunkAnalysis, AnalysisError>;
}

/// Request-scoped report pipeline. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    chunker: Chunker,
    timeout: Duration,
}

impl Pipeline {
    pub const fn new(chunker: Chunker, timeout: Duration) -> Self {
        Self { chunker, timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the pipeline and fold any failure into an error envelope.
    pub async fn run(
        &self,
        source: &dyn NoteSource,
        analyzer: &dyn ChunkAnalyzer,
        query: &NoteQuery,
    ) -> ReportEnvelope {
        match self.try_run(source, analyzer, query).await {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("Report run failed ({}): {err}", err.kind());
                error_envelope(&err)
            }
        }
    }

    /// Fetch, analyse and compose under the end-to-end timeout. Returns a
    /// success or empty envelope; failures abort the whole run.
    pub async fn try_run(
        &self,
        source: &dyn NoteSource,
        analyzer: &dyn ChunkAnalyzer,
        query: &NoteQuery,
    ) -> Result<ReportEnvelope, PipelineError> {
        let analysis_started = AtomicBool::new(false);
        let work = self.fetch_and_analyze(source, analyzer, query, &analysis_started);

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                budget: self.timeout,
                analysis_started: analysis_started.load(Ordering::SeqCst),
            }),
        }
    }

    async fn fetch_and_analyze(
        &self,
        source: &dyn NoteSource,
        analyzer: &dyn ChunkAnalyzer,
        query: &NoteQuery,
        analysis_started: &AtomicBool,
    ) -> Result<ReportEnvelope, PipelineError> {
        let notes = source.fetch_notes(query).await?;
        log::info!(
            "Fetched {} notes for {} .. {}",
            notes.len(),
            query.from.to_rfc3339(),
            query.to.to_rfc3339()
        );
        if notes.is_empty() {
            return Ok(ReportEnvelope::empty());
        }

        let content = self
            .analyze_with_flag(&notes, analyzer, analysis_started)
            .await?;
        Ok(ReportEnvelope::success(compose_report(&notes, content)))
    }

    /// Assemble, chunk and analyse notes, then merge the per-chunk results.
    pub async fn analyze_notes(
        &self,
        notes: &[Note],
        analyzer: &dyn ChunkAnalyzer,
    ) -> Result<ContentSection, PipelineError> {
        self.analyze_with_flag(notes, analyzer, &AtomicBool::new(false))
            .await
    }

    async fn analyze_with_flag(
        &self,
        notes: &[Note],
        analyzer: &dyn ChunkAnalyzer,
        started: &AtomicBool,
    ) -> Result<ContentSection, PipelineError> {
        let text = assemble(notes);
        let chunks = self.chunker.chunk_str(&text);
        let total = chunks.len();
        started.store(true, Ordering::SeqCst);

        // One call at a time, in chunk order.
        let mut results = Vec::with_capacity(total);
        for chunk in &chunks {
            log::debug!(
                "Analysing chunk {}/{total} ({} chars)",
                chunk.index + 1,
                chunk.char_len()
            );
            let analysis = analyzer
                .analyze(&chunk.content)
                .await
                .map_err(|source| PipelineError::Analysis {
                    index: chunk.index,
                    total,
                    source,
                })?;
            results.push(analysis);
        }

        Ok(merge_chunk_results(&results))
    }
}
