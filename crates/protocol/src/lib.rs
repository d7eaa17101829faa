use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

mod envelope;

pub use envelope::{ErrorCategory, ErrorKind, ReportEnvelope};

/// A single timestamped note as delivered by a note source.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub created: DateTime<Utc>,
    /// 1 = Monday .. 7 = Sunday
    pub dow: u8,
    /// 0..=23
    pub hour: u8,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Note {
    /// Build a note, deriving `dow`/`hour` from the UTC instant.
    ///
    /// An empty tag list is stored as `None`.
    pub fn from_instant(
        id: impl Into<String>,
        created: DateTime<Utc>,
        text: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let dow = u8::try_from(created.weekday().number_from_monday()).unwrap_or(1);
        let hour = u8::try_from(created.hour()).unwrap_or(0);
        Self {
            id: id.into(),
            created,
            dow,
            hour,
            text: text.into(),
            tags: if tags.is_empty() { None } else { Some(tags) },
        }
    }

    /// Calendar day of the creation instant (UTC), `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        self.created.date_naive().format("%Y-%m-%d").to_string()
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapCell {
    pub dow: u8,
    pub hour: u8,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

/// Locally computed writing-time statistics. Sparse: empty cells are omitted.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatternSection {
    pub heatmap: Vec<HeatmapCell>,
    pub daily_count: Vec<DailyCount>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub term: String,
    pub desc: String,
}

impl Keyword {
    pub fn new(term: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sentiment {
    pub trend: String,
    pub summary: String,
    pub score: f64,
}

/// Structured result of analysing one chunk of the combined text.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAnalysis {
    pub keywords: Vec<Keyword>,
    pub sentiment: Sentiment,
    pub content_flow: String,
    pub next_actions: Vec<String>,
}

/// Merged semantic section of a report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentSection {
    pub keywords: Vec<Keyword>,
    pub sentiment: Sentiment,
    pub content_flow: String,
    pub next_actions: Vec<String>,
}

impl From<ChunkAnalysis> for ContentSection {
    fn from(chunk: ChunkAnalysis) -> Self {
        Self {
            keywords: chunk.keywords,
            sentiment: chunk.sentiment,
            content_flow: chunk.content_flow,
            next_actions: chunk.next_actions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub note_count: usize,
    pub pattern: PatternSection,
    pub content: ContentSection,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_instant_maps_sunday_to_seven_and_monday_to_one() {
        // 2024-06-02 is a Sunday.
        let sunday = Utc.with_ymd_and_hms(2024, 6, 2, 22, 15, 0).unwrap();
        let note = Note::from_instant("a", sunday, "text", Vec::new());
        assert_eq!(note.dow, 7);
        assert_eq!(note.hour, 22);
        assert_eq!(note.tags, None);

        let monday = Utc.with_ymd_and_hms(2024, 6, 3, 0, 5, 0).unwrap();
        let note = Note::from_instant("b", monday, "text", vec!["work".to_string()]);
        assert_eq!(note.dow, 1);
        assert_eq!(note.hour, 0);
        assert_eq!(note.tags(), &["work".to_string()][..]);
    }

    #[test]
    fn note_roundtrips_iso_timestamps() {
        let raw = r#"{"id":"n1","created":"2025-03-04T09:30:00.000Z","dow":2,"hour":9,"text":"hello"}"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert_eq!(note.date_key(), "2025-03-04");
        assert!(note.tags.is_none());
        let out = serialize_json(&note).unwrap();
        assert!(!out.contains("tags"));
    }

    #[test]
    fn content_section_uses_camel_case_fields() {
        let section = ContentSection {
            keywords: vec![Keyword::new("focus", "appears in work notes")],
            sentiment: Sentiment {
                trend: "neutral".to_string(),
                summary: String::new(),
                score: 0.0,
            },
            content_flow: "flow".to_string(),
            next_actions: vec!["rest".to_string()],
        };
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["contentFlow"], "flow");
        assert_eq!(value["nextActions"][0], "rest");
    }
}
