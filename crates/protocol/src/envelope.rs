use crate::Report;
use serde::{Deserialize, Serialize};

pub const EMPTY_MESSAGE: &str = "No notes were written in the selected period.";

/// Fine-grained failure classification carried by error envelopes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    SourceAuthError,
    SourceNotFound,
    AnalysisAuthError,
    AnalysisRateLimited,
    AnalysisModelError,
    AnalysisTimeout,
    AnalysisGenericFailure,
    GenericServerError,
}

/// Coarse bucket for an [`ErrorKind`], emitted as the envelope `type`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    SourceAuth,
    AnalysisFailed,
    ServerError,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceAuthError => "source-auth-error",
            Self::SourceNotFound => "source-not-found",
            Self::AnalysisAuthError => "analysis-auth-error",
            Self::AnalysisRateLimited => "analysis-rate-limited",
            Self::AnalysisModelError => "analysis-model-error",
            Self::AnalysisTimeout => "analysis-timeout",
            Self::AnalysisGenericFailure => "analysis-generic-failure",
            Self::GenericServerError => "generic-server-error",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::SourceAuthError | Self::SourceNotFound => ErrorCategory::SourceAuth,
            Self::AnalysisAuthError
            | Self::AnalysisRateLimited
            | Self::AnalysisModelError
            | Self::AnalysisTimeout
            | Self::AnalysisGenericFailure => ErrorCategory::AnalysisFailed,
            Self::GenericServerError => ErrorCategory::ServerError,
        }
    }

    /// User-facing message for this kind.
    pub const fn message(self) -> &'static str {
        match self {
            Self::SourceAuthError => {
                "Note source authentication failed: check the token and database permissions."
            }
            Self::SourceNotFound => "The note database could not be found. Check the database id.",
            Self::AnalysisAuthError => "Analysis request failed: check the analysis API key.",
            Self::AnalysisRateLimited => {
                "Analysis request failed: rate limit reached. Please retry shortly."
            }
            Self::AnalysisModelError => "Analysis model is unavailable.",
            Self::AnalysisTimeout => "Analysis request timed out. Please retry shortly.",
            Self::AnalysisGenericFailure => "Analysis request failed.",
            Self::GenericServerError => "Server error. Check the logs.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pipeline run. Every variant is delivered with a successful
/// transport status; callers discriminate on `status`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportEnvelope {
    Success(Report),
    #[serde(rename_all = "camelCase")]
    Empty { note_count: usize, message: String },
    Error {
        #[serde(rename = "type")]
        category: ErrorCategory,
        kind: ErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl ReportEnvelope {
    pub fn success(report: Report) -> Self {
        Self::Success(report)
    }

    pub fn empty() -> Self {
        Self::Empty {
            note_count: 0,
            message: EMPTY_MESSAGE.to_string(),
        }
    }

    /// Error envelope using the kind's standard message.
    pub fn error(kind: ErrorKind, detail: Option<String>) -> Self {
        Self::error_with_message(kind, kind.message(), detail)
    }

    pub fn error_with_message(
        kind: ErrorKind,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self::Error {
            category: kind.category(),
            kind,
            message: message.into(),
            detail,
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty { .. } => "empty",
            Self::Error { .. } => "error",
        }
    }
}
