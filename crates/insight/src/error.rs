use notelens_protocol::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a note source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("note source rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("note source not found: {0}")]
    NotFound(String),

    #[error("note source request failed: {0}")]
    Failed(String),
}

/// Failure reported by the analysis engine for one chunk
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis service rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("analysis service rate limit reached: {0}")]
    RateLimited(String),

    #[error("analysis model {model} is unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("analysis request timed out: {0}")]
    Timeout(String),

    #[error("analysis request failed: {0}")]
    Failed(String),
}

/// Any failure that aborts a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("chunk {index} of {total}: {source}")]
    Analysis {
        index: usize,
        total: usize,
        #[source]
        source: AnalysisError,
    },

    #[error("request exceeded its {}s budget", .budget.as_secs())]
    Timeout {
        budget: Duration,
        analysis_started: bool,
    },
}

impl SourceError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::SourceAuthError,
            Self::NotFound(_) => ErrorKind::SourceNotFound,
            Self::Failed(_) => ErrorKind::GenericServerError,
        }
    }
}

impl AnalysisError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::AnalysisAuthError,
            Self::RateLimited(_) => ErrorKind::AnalysisRateLimited,
            Self::ModelUnavailable { .. } => ErrorKind::AnalysisModelError,
            Self::Timeout(_) => ErrorKind::AnalysisTimeout,
            Self::Failed(_) => ErrorKind::AnalysisGenericFailure,
        }
    }
}

impl PipelineError {
    /// Classification carried into the error envelope.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Source(err) => err.kind(),
            Self::Analysis { source, .. } => source.kind(),
            Self::Timeout {
                analysis_started: true,
                ..
            } => ErrorKind::AnalysisTimeout,
            Self::Timeout { .. } => ErrorKind::GenericServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_passes_through_unchanged() {
        let cases = [
            (
                PipelineError::from(SourceError::Unauthorized("401".into())),
                ErrorKind::SourceAuthError,
            ),
            (
                PipelineError::from(SourceError::NotFound("db".into())),
                ErrorKind::SourceNotFound,
            ),
            (
                PipelineError::from(SourceError::Failed("boom".into())),
                ErrorKind::GenericServerError,
            ),
            (
                PipelineError::Analysis {
                    index: 0,
                    total: 2,
                    source: AnalysisError::RateLimited("429".into()),
                },
                ErrorKind::AnalysisRateLimited,
            ),
            (
                PipelineError::Analysis {
                    index: 1,
                    total: 2,
                    source: AnalysisError::ModelUnavailable {
                        model: "m".into(),
                        message: "gone".into(),
                    },
                },
                ErrorKind::AnalysisModelError,
            ),
            (
                PipelineError::Timeout {
                    budget: Duration::from_secs(60),
                    analysis_started: true,
                },
                ErrorKind::AnalysisTimeout,
            ),
            (
                PipelineError::Timeout {
                    budget: Duration::from_secs(60),
                    analysis_started: false,
                },
                ErrorKind::GenericServerError,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.kind(), expected, "{err}");
        }
    }
}
