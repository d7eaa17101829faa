use crate::error::PipelineError;
use crate::pattern;
use notelens_protocol::{ContentSection, Note, Report, ReportEnvelope};

/// Combine the locally computed pattern section with the merged content.
pub fn compose_report(notes: &[Note], content: ContentSection) -> Report {
    Report {
        note_count: notes.len(),
        pattern: pattern::analyze(notes),
        content,
    }
}

/// Error outcome for an aborted run. The collaborator's own text becomes
/// the diagnostic detail.
pub fn error_envelope(err: &PipelineError) -> ReportEnvelope {
    ReportEnvelope::error(err.kind(), Some(err.to_string()))
}
