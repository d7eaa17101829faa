use crate::settings::{NotionProfile, NotionTarget, Settings};
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use notelens_insight::{NoteQuery, NoteSource, SourceError};
use notelens_protocol::Note;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Notes from a Notion data source (or a legacy database) selected by a profile.
pub(crate) struct NotionSource {
    client: Client,
    base_url: String,
    version: String,
    page_size: usize,
    max_notes: usize,
    profile: NotionProfile,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    created_time: DateTime<Utc>,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<SelectOption>,
    },
    Select {
        select: Option<SelectOption>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Deserialize)]
struct SelectOption {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Which filter dialect a query endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryDialect {
    DataSource,
    LegacyDatabase,
}

impl NotionSource {
    pub(crate) fn new(settings: &Settings, profile: NotionProfile) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.notion.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.notion.base_url.trim_end_matches('/').to_string(),
            version: settings.notion.version.clone(),
            page_size: settings.notion_page_size(),
            max_notes: settings.max_notes,
            profile,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.profile.token)
            .header("Notion-Version", &self.version)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value, SourceError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| SourceError::Failed(format!("{what}: {err}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SourceError::Failed(format!("{what}: {err}")))?;
        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|err| SourceError::Failed(format!("{what}: invalid JSON response: {err}")))
    }

    /// First data source of a database, if the database exposes any.
    async fn resolve_data_source(&self, database_id: &str) -> Result<Option<String>, SourceError> {
        let url = format!("{}/v1/databases/{database_id}", self.base_url);
        let database = self
            .send(self.client.get(url), "database lookup")
            .await
            .map_err(|err| match err {
                SourceError::NotFound(_) => SourceError::NotFound(format!(
                    "database {} could not be found",
                    short_id(database_id)
                )),
                other => other,
            })?;
        Ok(database["data_sources"][0]["id"]
            .as_str()
            .map(str::to_string))
    }

    async fn query(
        &self,
        url: String,
        dialect: QueryDialect,
        query: &NoteQuery,
    ) -> Result<Vec<Note>, SourceError> {
        let body = query_body(dialect, query, self.page_size);
        let value = self
            .send(self.client.post(url).json(&body), "notes query")
            .await?;
        let response: QueryResponse = serde_json::from_value(value)
            .map_err(|err| SourceError::Failed(format!("unexpected query response: {err}")))?;

        let mut notes = parse_pages(
            &response.results,
            &self.profile.property_name,
            self.profile.tag_property_name.as_deref(),
        );
        notes.sort_by_key(|note| note.created);
        notes.truncate(self.max_notes);
        Ok(notes)
    }

    async fn fetch(&self, query: &NoteQuery) -> Result<Vec<Note>, SourceError> {
        match &self.profile.target {
            NotionTarget::DataSource(id) => {
                let url = format!("{}/v1/data_sources/{id}/query", self.base_url);
                self.query(url, QueryDialect::DataSource, query).await
            }
            NotionTarget::Database(db_id) => match self.resolve_data_source(db_id).await? {
                Some(id) => {
                    log::debug!(
                        "Resolved data source {} for database {}",
                        short_id(&id),
                        short_id(db_id)
                    );
                    let url = format!("{}/v1/data_sources/{id}/query", self.base_url);
                    self.query(url, QueryDialect::DataSource, query).await
                }
                None => {
                    log::warn!(
                        "Database {} exposes no data sources; using the legacy query",
                        short_id(db_id)
                    );
                    let url = format!("{}/v1/databases/{db_id}/query", self.base_url);
                    self.query(url, QueryDialect::LegacyDatabase, query).await
                }
            },
        }
    }
}

#[async_trait]
impl NoteSource for NotionSource {
    async fn fetch_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, SourceError> {
        let result = self.fetch(query).await;
        if let Err(err) = &result {
            log::warn!("Notion fetch failed for profile '{}': {err}", self.profile.key);
        }
        result
    }
}

fn query_body(dialect: QueryDialect, query: &NoteQuery, page_size: usize) -> Value {
    let (key, selector) = match dialect {
        QueryDialect::DataSource => ("timestamp", "created_time"),
        QueryDialect::LegacyDatabase => ("property", "created_time"),
    };
    let from = query.from.to_rfc3339_opts(SecondsFormat::Millis, true);
    let to = query.to.to_rfc3339_opts(SecondsFormat::Millis, true);

    json!({
        "filter": {
            "and": [
                { key: selector, "created_time": { "on_or_after": from } },
                { key: selector, "created_time": { "on_or_before": to } },
            ]
        },
        "sorts": [{ key: selector, "direction": "ascending" }],
        "page_size": page_size,
    })
}

/// Pages that fail to parse or carry no text are skipped.
fn parse_pages(results: &[Value], property: &str, tag_property: Option<&str>) -> Vec<Note> {
    results
        .iter()
        .filter_map(|raw| match Page::deserialize(raw) {
            Ok(page) => parse_page(page, property, tag_property),
            Err(err) => {
                log::debug!("Skipping unreadable Notion page: {err}");
                None
            }
        })
        .collect()
}

fn parse_page(page: Page, property: &str, tag_property: Option<&str>) -> Option<Note> {
    let text = match page.properties.get(property)? {
        PropertyValue::RichText { rich_text } => join_plain_text(rich_text),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }

    let tags = tag_property
        .and_then(|name| page.properties.get(name))
        .map(extract_tags)
        .unwrap_or_default();

    Some(Note::from_instant(page.id, page.created_time, text, tags))
}

fn join_plain_text(parts: &[RichText]) -> String {
    parts
        .iter()
        .map(|part| part.plain_text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

fn extract_tags(value: &PropertyValue) -> Vec<String> {
    match value {
        PropertyValue::MultiSelect { multi_select } => {
            multi_select.iter().map(|opt| opt.name.clone()).collect()
        }
        PropertyValue::Select { select } => select.iter().map(|opt| opt.name.clone()).collect(),
        PropertyValue::RichText { rich_text } => {
            let text = join_plain_text(rich_text);
            if text.is_empty() {
                Vec::new()
            } else {
                text.split(',').map(|tag| tag.trim().to_string()).collect()
            }
        }
        PropertyValue::Other => Vec::new(),
    }
}

fn classify_failure(status: StatusCode, body: &str) -> SourceError {
    let api: ApiError = serde_json::from_str(body).unwrap_or_default();
    let message = if api.message.is_empty() {
        format!("HTTP {status}")
    } else {
        api.message
    };

    if status == StatusCode::UNAUTHORIZED || api.code == "unauthorized" {
        SourceError::Unauthorized(message)
    } else if status == StatusCode::NOT_FOUND || api.code == "object_not_found" {
        SourceError::NotFound(message)
    } else {
        SourceError::Failed(format!("{status}: {message}"))
    }
}

fn short_id(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn page(properties: Value) -> Value {
        json!({
            "object": "page",
            "id": "page-1",
            "created_time": "2025-03-02T21:30:00.000Z",
            "properties": properties,
        })
    }

    fn rich_text(parts: &[&str]) -> Value {
        let parts: Vec<Value> = parts.iter().map(|p| json!({ "plain_text": p })).collect();
        json!({ "id": "x", "type": "rich_text", "rich_text": parts })
    }

    #[test]
    fn page_text_is_joined_and_trimmed() {
        let raw = page(json!({ "Body": rich_text(&["  slept ", "late  "]) }));
        let notes = parse_pages(&[raw], "Body", None);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "slept late");
        assert_eq!(notes[0].dow, 7);
        assert_eq!(notes[0].hour, 21);
        assert_eq!(notes[0].tags, None);
    }

    #[test]
    fn pages_without_usable_text_are_skipped() {
        let blank = page(json!({ "Body": rich_text(&["   "]) }));
        let wrong_type = page(json!({ "Body": { "type": "title", "title": [] } }));
        let missing = page(json!({ "Other": rich_text(&["text"]) }));
        let not_a_page = json!({ "object": "list" });

        assert!(parse_pages(&[blank, wrong_type, missing, not_a_page], "Body", None).is_empty());
    }

    #[test]
    fn tags_come_from_select_kinds_and_text() {
        let multi = page(json!({
            "Body": rich_text(&["a"]),
            "Tags": { "type": "multi_select", "multi_select": [{ "name": "work" }, { "name": "health" }] },
        }));
        let select = page(json!({
            "Body": rich_text(&["a"]),
            "Tags": { "type": "select", "select": { "name": "diary" } },
        }));
        let empty_select = page(json!({
            "Body": rich_text(&["a"]),
            "Tags": { "type": "select", "select": null },
        }));
        let text = page(json!({
            "Body": rich_text(&["a"]),
            "Tags": rich_text(&["reading, travel ,music"]),
        }));

        let notes = parse_pages(&[multi, select, empty_select, text], "Body", Some("Tags"));
        let tags: Vec<&[String]> = notes.iter().map(Note::tags).collect();
        assert_eq!(
            tags,
            vec![
                &["work".to_string(), "health".to_string()][..],
                &["diary".to_string()][..],
                &[][..],
                &[
                    "reading".to_string(),
                    "travel".to_string(),
                    "music".to_string()
                ][..],
            ]
        );
    }

    #[test]
    fn query_body_uses_inclusive_created_time_bounds() {
        let query = NoteQuery {
            from: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 3, 7, 23, 59, 59).unwrap(),
        };

        let body = query_body(QueryDialect::DataSource, &query, 100);
        assert_eq!(body["page_size"], 100);
        assert_eq!(body["sorts"][0]["timestamp"], "created_time");
        assert_eq!(body["sorts"][0]["direction"], "ascending");
        assert_eq!(
            body["filter"]["and"][0]["created_time"]["on_or_after"],
            "2025-03-01T00:00:00.000Z"
        );
        assert_eq!(
            body["filter"]["and"][1]["created_time"]["on_or_before"],
            "2025-03-07T23:59:59.000Z"
        );

        let legacy = query_body(QueryDialect::LegacyDatabase, &query, 20);
        assert_eq!(legacy["filter"]["and"][0]["property"], "created_time");
    }

    #[test]
    fn api_failures_are_classified() {
        let unauthorized = classify_failure(
            StatusCode::UNAUTHORIZED,
            r#"{"object":"error","status":401,"code":"unauthorized","message":"API token is invalid."}"#,
        );
        assert_eq!(
            unauthorized,
            SourceError::Unauthorized("API token is invalid.".to_string())
        );

        let not_found = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"code":"object_not_found","message":"Could not find database"}"#,
        );
        assert!(matches!(not_found, SourceError::NotFound(_)));

        let other = classify_failure(StatusCode::BAD_GATEWAY, "<html>");
        assert!(matches!(other, SourceError::Failed(msg) if msg.contains("502")));
    }

    #[test]
    fn short_ids_are_truncated() {
        assert_eq!(short_id("0123456789abcdef"), "01234567...");
    }
}
