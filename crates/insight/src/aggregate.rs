use notelens_protocol::{ChunkAnalysis, ContentSection, Keyword, Sentiment};
use std::collections::{HashMap, HashSet};

pub const MAX_KEYWORDS: usize = 10;
pub const MAX_NEXT_ACTIONS: usize = 3;
pub const MAX_SUMMARY_CHARS: usize = 400;
pub const MAX_CONTENT_FLOW_CHARS: usize = 500;

const ELLIPSIS: &str = "...";

const NO_DATA_TREND: &str = "no data";
const NO_SUMMARY: &str = "No sentiment analysis available.";
const NO_CONTENT_FLOW: &str = "No content flow analysis available.";
const SUMMARY_TAIL: &str = "Overall, varied emotions appeared across different topics.";
const CONTENT_FLOW_TAIL: &str = "Overall, concerns and interests show an evolving trend over time.";

/// Merge per-chunk analyses, in chunk order, into one bounded section.
pub fn merge_chunk_results(chunks: &[ChunkAnalysis]) -> ContentSection {
    match chunks {
        [] => empty_section(),
        [only] => single_section(only),
        _ => merged_section(chunks),
    }
}

fn empty_section() -> ContentSection {
    ContentSection {
        keywords: Vec::new(),
        sentiment: Sentiment {
            trend: NO_DATA_TREND.to_string(),
            summary: String::new(),
            score: 0.0,
        },
        content_flow: String::new(),
        next_actions: Vec::new(),
    }
}

fn single_section(chunk: &ChunkAnalysis) -> ContentSection {
    let mut section = ContentSection::from(chunk.clone());
    section.keywords.truncate(MAX_KEYWORDS);
    section.next_actions.truncate(MAX_NEXT_ACTIONS);
    section
}

fn merged_section(chunks: &[ChunkAnalysis]) -> ContentSection {
    let avg = chunks.iter().map(|c| c.sentiment.score).sum::<f64>() / chunks.len() as f64;

    let summary = join_with_tail(
        chunks.iter().map(|c| c.sentiment.summary.as_str()),
        SUMMARY_TAIL,
        NO_SUMMARY,
    );
    let content_flow = join_with_tail(
        chunks.iter().map(|c| c.content_flow.as_str()),
        CONTENT_FLOW_TAIL,
        NO_CONTENT_FLOW,
    );

    ContentSection {
        keywords: merge_keywords(chunks),
        sentiment: Sentiment {
            trend: trend_for_score(avg).to_string(),
            summary: truncate_chars(&summary, MAX_SUMMARY_CHARS),
            score: round_score(avg),
        },
        content_flow: truncate_chars(&content_flow, MAX_CONTENT_FLOW_CHARS),
        next_actions: merge_next_actions(chunks),
    }
}

struct KeywordTally {
    term: String,
    desc: String,
    count: usize,
}

/// Rank terms by how many chunks mention them. Identity is exact string
/// equality; the longest description wins and ties keep the first seen.
pub fn merge_keywords(chunks: &[ChunkAnalysis]) -> Vec<Keyword> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<KeywordTally> = Vec::new();

    for keyword in chunks.iter().flat_map(|c| &c.keywords) {
        match slots.get(keyword.term.as_str()) {
            Some(&slot) => {
                let tally = &mut tallies[slot];
                tally.count += 1;
                if keyword.desc.chars().count() > tally.desc.chars().count() {
                    tally.desc.clone_from(&keyword.desc);
                }
            }
            None => {
                slots.insert(keyword.term.as_str(), tallies.len());
                tallies.push(KeywordTally {
                    term: keyword.term.clone(),
                    desc: keyword.desc.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable: equal counts stay in first-seen order.
    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|t| Keyword {
            term: t.term,
            desc: t.desc,
        })
        .collect()
}

/// Deduplicate actions by exact string, first-seen order, capped.
pub fn merge_next_actions(chunks: &[ChunkAnalysis]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    chunks
        .iter()
        .flat_map(|c| &c.next_actions)
        .filter(|action| seen.insert(action.as_str()))
        .take(MAX_NEXT_ACTIONS)
        .cloned()
        .collect()
}

/// Label for an averaged score. Checks run in order and the first match wins.
pub fn trend_for_score(avg: f64) -> &'static str {
    if avg > 0.2 {
        "positive"
    } else if avg > 0.05 {
        "slightly positive"
    } else if avg < -0.2 {
        "negative"
    } else if avg < -0.05 {
        "slightly negative"
    } else {
        "neutral"
    }
}

/// Round to 2 decimals, halves toward positive infinity.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0 + 0.5).floor() / 100.0
}

fn join_with_tail<'a>(parts: impl Iterator<Item = &'a str>, tail: &str, placeholder: &str) -> String {
    let parts: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    match parts.len() {
        0 => placeholder.to_string(),
        1 => parts[0].to_string(),
        _ => format!("{} {tail}", parts.join(" ")),
    }
}

/// Cut `text` to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => {
            let mut out = String::with_capacity(byte + ELLIPSIS.len());
            out.push_str(&text[..byte]);
            out.push_str(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}
