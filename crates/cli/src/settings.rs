use anyhow::{Context as AnyhowContext, Result};
use notelens_chunker::ChunkerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Notion returns at most this many pages per query.
pub(crate) const NOTION_PAGE_LIMIT: usize = 100;

pub(crate) const DEFAULT_PROFILE: &str = "default";

/// Environment lookup, injectable so tests never touch the process env.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    /// Chunk bound in characters
    pub chunk_size: usize,
    /// Maximum notes per fetch
    pub max_notes: usize,
    /// Lookback window when a request names no range
    pub default_period_days: u32,
    /// End-to-end budget per report run
    pub request_timeout_secs: u64,
    pub default_profile: String,
    pub analysis: AnalysisSettings,
    pub notion: NotionSettings,
    pub profiles: BTreeMap<String, ProfileFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AnalysisSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Language the analysis is written in
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct NotionSettings {
    pub version: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Profile entry from the settings file. Environment variables override it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ProfileFile {
    pub notion_token: Option<String>,
    pub data_source_id: Option<String>,
    pub database_id: Option<String>,
    pub property_name: Option<String>,
    pub tag_property_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: notelens_chunker::ChunkerConfig::default().max_chunk_chars,
            max_notes: NOTION_PAGE_LIMIT,
            default_period_days: 7,
            request_timeout_secs: notelens_insight::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            default_profile: DEFAULT_PROFILE.to_string(),
            analysis: AnalysisSettings::default(),
            notion: NotionSettings::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            language: "English".to_string(),
        }
    }
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            version: "2025-09-03".to_string(),
            base_url: "https://api.notion.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then environment overrides.
    pub(crate) fn load(path: Option<&Path>, env: EnvLookup<'_>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str::<Self>(&raw)
                    .with_context(|| format!("Invalid settings file {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.apply_env(env)?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self, env: EnvLookup<'_>) -> Result<()> {
        if let Some(v) = first_env(env, &["NOTELENS_CHUNK_SIZE"]) {
            self.chunk_size = parse_env("NOTELENS_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = first_env(env, &["NOTELENS_MAX_NOTES", "MAX_NOTES"]) {
            self.max_notes = parse_env("MAX_NOTES", &v)?;
        }
        if let Some(v) = first_env(env, &["NOTELENS_DEFAULT_PERIOD_DAYS", "DEFAULT_PERIOD_DAYS"]) {
            self.default_period_days = parse_env("DEFAULT_PERIOD_DAYS", &v)?;
        }
        if let Some(v) = first_env(env, &["NOTELENS_REQUEST_TIMEOUT_SECS"]) {
            self.request_timeout_secs = parse_env("NOTELENS_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = first_env(env, &["NOTELENS_PROFILE"]) {
            self.default_profile = v;
        }
        if let Some(v) = first_env(env, &["INSIGHT_MODEL"]) {
            self.analysis.model = v;
        }
        if let Some(v) = first_env(env, &["OPENAI_API_KEY"]) {
            self.analysis.api_key = Some(v);
        }
        if let Some(v) = first_env(env, &["OPENAI_BASE_URL"]) {
            self.analysis.base_url = v;
        }
        if let Some(v) = first_env(env, &["NOTELENS_ANALYSIS_LANGUAGE"]) {
            self.analysis.language = v;
        }
        if let Some(v) = first_env(env, &["NOTION_VERSION"]) {
            self.notion.version = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.chunker_config()
            .validate()
            .context("Invalid chunk_size")?;
        if self.max_notes == 0 {
            anyhow::bail!("max_notes must be > 0");
        }
        if self.default_period_days == 0 {
            anyhow::bail!("default_period_days must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }
        Ok(())
    }

    pub(crate) const fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::with_max_chunk_chars(self.chunk_size)
    }

    pub(crate) const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Page size actually requested from Notion.
    pub(crate) fn notion_page_size(&self) -> usize {
        self.max_notes.min(NOTION_PAGE_LIMIT)
    }
}

/// Note-source credentials selected by a request's profile key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileConfig {
    pub key: String,
    pub notion_token: Option<String>,
    pub data_source_id: Option<String>,
    pub database_id: Option<String>,
    pub property_name: Option<String>,
    pub tag_property_name: Option<String>,
}

/// A profile with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotionProfile {
    pub key: String,
    pub token: String,
    pub target: NotionTarget,
    pub property_name: String,
    pub tag_property_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NotionTarget {
    DataSource(String),
    Database(String),
}

impl ProfileConfig {
    /// Resolve `key` from the settings file, overridden by `{KEY}_*` env vars.
    pub(crate) fn resolve(key: &str, settings: &Settings, env: EnvLookup<'_>) -> Self {
        let file = settings.profiles.get(key).cloned().unwrap_or_default();
        let prefix = env_prefix(key);
        let var = |suffix: &str| env(&format!("{prefix}_{suffix}"));

        Self {
            key: key.to_string(),
            notion_token: var("NOTION_TOKEN").or(file.notion_token),
            data_source_id: var("NOTION_DATA_SOURCE_ID").or(file.data_source_id),
            database_id: var("NOTION_DB_ID").or(file.database_id),
            property_name: var("PROPERTY_NAME").or(file.property_name),
            tag_property_name: var("TAG_PROPERTY_NAME").or(file.tag_property_name),
        }
    }

    pub(crate) fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.notion_token.is_none() {
            missing.push("notionToken");
        }
        if self.data_source_id.is_none() && self.database_id.is_none() {
            missing.push("notionDataSourceId");
        }
        if self.property_name.is_none() {
            missing.push("propertyName");
        }
        missing
    }

    /// Environment variable names consulted for this profile.
    pub(crate) fn expected_env(&self) -> Vec<String> {
        let prefix = env_prefix(&self.key);
        [
            "NOTION_TOKEN",
            "NOTION_DATA_SOURCE_ID",
            "NOTION_DB_ID",
            "PROPERTY_NAME",
            "TAG_PROPERTY_NAME",
        ]
        .iter()
        .map(|suffix| format!("{prefix}_{suffix}"))
        .collect()
    }

    pub(crate) fn complete(self) -> Option<NotionProfile> {
        let target = match (self.data_source_id, self.database_id) {
            (Some(id), _) => NotionTarget::DataSource(id),
            (None, Some(id)) => NotionTarget::Database(id),
            (None, None) => return None,
        };
        Some(NotionProfile {
            key: self.key,
            token: self.notion_token?,
            target,
            property_name: self.property_name?,
            tag_property_name: self.tag_property_name,
        })
    }
}

fn env_prefix(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn first_env(env: EnvLookup<'_>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env(key))
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| anyhow::anyhow!("Invalid {key}={raw}: {err}"))
}
