use crate::settings::AnalysisSettings;
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use notelens_insight::{AnalysisError, ChunkAnalyzer};
use notelens_protocol::{ChunkAnalysis, Keyword, Sentiment};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const CHUNK_START: &str = "<<<NOTES_CHUNK_START>>>";
const CHUNK_END: &str = "<<<NOTES_CHUNK_END>>>";

/// Chunk analyser backed by an OpenAI-compatible chat completions endpoint.
pub(crate) struct OpenAiAnalyzer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    language: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Model output before required fields are checked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    keywords: Option<Vec<Keyword>>,
    sentiment: Option<Sentiment>,
    content_flow: Option<String>,
    next_actions: Option<Vec<String>>,
}

impl OpenAiAnalyzer {
    pub(crate) fn new(settings: &AnalysisSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            language: settings.language.clone(),
        })
    }

    async fn complete(&self, api_key: &str, chunk: &str) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(&self.language) },
                { "role": "user", "content": user_prompt(chunk) },
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_failure)?;
        if !status.is_success() {
            return Err(classify_failure(status, &text, &self.model));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|err| AnalysisError::Failed(format!("unreadable completion: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalysisError::Failed("empty response from the analysis service".into()))
    }
}

#[async_trait]
impl ChunkAnalyzer for OpenAiAnalyzer {
    async fn analyze(&self, chunk: &str) -> Result<ChunkAnalysis, AnalysisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AnalysisError::Unauthorized(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        };

        let result = self
            .complete(api_key, chunk)
            .await
            .and_then(|content| parse_analysis(&content));
        if let Err(err) = &result {
            log::warn!("Analysis call failed (model {}): {err}", self.model);
        }
        result
    }
}

fn system_prompt(language: &str) -> String {
    format!(
        r#"You are a JSON-only analysis engine for personal diary and memo text.

Input: one text chunk holding several memo entries in time order. Each entry
starts with a header line such as
[YYYY-MM-DD HH:MM][tags: tag1,tag2]
followed by the memo body.

Output: exactly one JSON object with this schema and no other fields:
{{
  "keywords": [{{ "term": string, "desc": string }}],
  "sentiment": {{ "trend": string, "summary": string, "score": number }},
  "contentFlow": string,
  "nextActions": string[]
}}

Rules:
- Write every value in {language}.
- Return only valid JSON, without markdown or commentary.
- keywords: 5 to 10 items. "term" is a topic of at most five words; "desc" is one or two sentences on the context it shows up in.
- sentiment.trend: a one-line emotional tendency. sentiment.summary: 2 to 4 sentences, at most 400 characters. sentiment.score: a number from -1.0 (very negative) through 0 (neutral) to 1.0 (very positive).
- contentFlow: 3 to 5 sentences on how the concerns move across the notes, at most 500 characters.
- nextActions: 3 to 5 concrete, immediately doable suggestions grounded in the notes, each at most 120 characters.
- Short or repetitive input still gets the full schema."#
    )
}

fn user_prompt(chunk: &str) -> String {
    format!(
        "Below is part of the notes a user wrote over a period. Entries follow the \
         [YYYY-MM-DD HH:MM][tags: ...] header format and may run back to back.\n\
         Analyse the text according to the JSON schema described earlier.\n\n\
         {CHUNK_START}\n\n{chunk}\n\n{CHUNK_END}"
    )
}

/// Validate model output and clamp the score into [-1, 1].
fn parse_analysis(content: &str) -> Result<ChunkAnalysis, AnalysisError> {
    let raw: RawAnalysis = serde_json::from_str(content)
        .map_err(|err| AnalysisError::Failed(format!("response is not valid JSON: {err}")))?;

    let (Some(keywords), Some(mut sentiment), Some(content_flow), Some(next_actions)) = (
        raw.keywords,
        raw.sentiment,
        raw.content_flow.filter(|flow| !flow.is_empty()),
        raw.next_actions,
    ) else {
        return Err(AnalysisError::Failed(
            "invalid response structure from the analysis service".to_string(),
        ));
    };

    sentiment.score = sentiment.score.clamp(-1.0, 1.0);
    Ok(ChunkAnalysis {
        keywords,
        sentiment,
        content_flow,
        next_actions,
    })
}

fn classify_failure(status: StatusCode, body: &str, model: &str) -> AnalysisError {
    let api = serde_json::from_str::<ErrorBody>(body)
        .unwrap_or_default()
        .error;
    let message = if api.message.is_empty() {
        format!("HTTP {status}")
    } else {
        api.message
    };
    let lowered = message.to_ascii_lowercase();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::RateLimited(message),
        _ if api.code.as_deref() == Some("model_not_found") || lowered.contains("model") => {
            AnalysisError::ModelUnavailable {
                model: model.to_string(),
                message,
            }
        }
        _ if lowered.contains("timeout") || lowered.contains("timed out") => {
            AnalysisError::Timeout(message)
        }
        _ => AnalysisError::Failed(format!("{status}: {message}")),
    }
}

fn transport_failure(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Timeout(err.to_string())
    } else {
        AnalysisError::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn valid_output_is_accepted_and_score_clamped() {
        let content = r#"{
            "keywords": [{"term": "sleep", "desc": "late nights before deadlines"}],
            "sentiment": {"trend": "tense", "summary": "Stress peaks midweek.", "score": 1.7},
            "contentFlow": "Work dominates, then rest.",
            "nextActions": ["Sleep before midnight"]
        }"#;
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.keywords[0].term, "sleep");
        assert_eq!(analysis.sentiment.score, 1.0);
        assert_eq!(analysis.content_flow, "Work dominates, then rest.");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let content = r#"{"keywords": [], "sentiment": {"trend": "", "summary": "", "score": 0}, "nextActions": []}"#;
        assert!(matches!(
            parse_analysis(content),
            Err(AnalysisError::Failed(msg)) if msg.contains("invalid response structure")
        ));
        assert!(matches!(
            parse_analysis("not json"),
            Err(AnalysisError::Failed(_))
        ));
    }

    #[test]
    fn http_failures_are_classified() {
        let auth = classify_failure(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
            "gpt-4o-mini",
        );
        assert_eq!(
            auth,
            AnalysisError::Unauthorized("Incorrect API key provided".to_string())
        );

        let limited = classify_failure(StatusCode::TOO_MANY_REQUESTS, "", "gpt-4o-mini");
        assert!(matches!(limited, AnalysisError::RateLimited(_)));

        let model = classify_failure(
            StatusCode::NOT_FOUND,
            r#"{"error":{"message":"The model `gpt-x` does not exist","code":"model_not_found"}}"#,
            "gpt-x",
        );
        assert!(matches!(model, AnalysisError::ModelUnavailable { model, .. } if model == "gpt-x"));

        let timeout = classify_failure(
            StatusCode::GATEWAY_TIMEOUT,
            r#"{"error":{"message":"Request timed out"}}"#,
            "gpt-4o-mini",
        );
        assert!(matches!(timeout, AnalysisError::Timeout(_)));

        let other = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "oops", "gpt-4o-mini");
        assert!(matches!(other, AnalysisError::Failed(_)));
    }

    #[test]
    fn user_prompt_wraps_chunk_in_markers() {
        let prompt = user_prompt("[2025-03-01 09:00]\nhello\n");
        let start = prompt.find(CHUNK_START).unwrap();
        let end = prompt.find(CHUNK_END).unwrap();
        assert!(start < end);
        assert!(prompt[start..end].contains("hello"));
        assert!(system_prompt("Korean").contains("Write every value in Korean."));
    }

    #[tokio::test]
    async fn missing_api_key_is_an_auth_failure() {
        let settings = AnalysisSettings {
            api_key: None,
            ..AnalysisSettings::default()
        };
        let analyzer = OpenAiAnalyzer::new(&settings).unwrap();
        let err = analyzer.analyze("text").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Unauthorized(_)));
    }
}
