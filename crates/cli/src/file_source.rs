use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notelens_insight::{NoteQuery, NoteSource, SourceError};
use notelens_protocol::Note;
use serde::Deserialize;
use std::path::Path;

/// One record of a notes file. `dow`/`hour` are recomputed from `created`.
#[derive(Debug, Deserialize)]
struct NoteRecord {
    id: String,
    created: DateTime<Utc>,
    text: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Read a JSON array of notes, dropping blank ones, ascending by creation time.
pub(crate) fn load_notes(path: &Path) -> Result<Vec<Note>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<NoteRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid notes file {}", path.display()))?;

    let mut notes: Vec<Note> = records
        .into_iter()
        .filter_map(|record| {
            let text = record.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Note::from_instant(
                record.id,
                record.created,
                text,
                record.tags.unwrap_or_default(),
            ))
        })
        .collect();
    notes.sort_by_key(|note| note.created);
    Ok(notes)
}

/// Note source over a local notes file, for offline runs.
pub(crate) struct FileNoteSource {
    notes: Vec<Note>,
    max_notes: usize,
}

impl FileNoteSource {
    pub(crate) fn open(path: &Path, max_notes: usize) -> Result<Self> {
        Ok(Self {
            notes: load_notes(path)?,
            max_notes,
        })
    }
}

#[async_trait]
impl NoteSource for FileNoteSource {
    async fn fetch_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, SourceError> {
        Ok(self
            .notes
            .iter()
            .filter(|note| note.created >= query.from && note.created <= query.to)
            .take(self.max_notes)
            .cloned()
            .collect())
    }
}
