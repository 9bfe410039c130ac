//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (the closed set of memory kinds), [`Scope`] (global or
//! one project), [`Memory`] (a full record), and the content normalization used
//! for duplicate detection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// The kinds of memory an agent can keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Always injected into context, never truncated.
    Rule,
    Decision,
    Fact,
    #[default]
    Note,
    /// A reusable how-to the agent can apply.
    Skill,
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        Self::Rule,
        Self::Decision,
        Self::Fact,
        Self::Note,
        Self::Skill,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Decision => "decision",
            Self::Fact => "fact",
            Self::Note => "note",
            Self::Skill => "skill",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Self::Rule),
            "decision" => Ok(Self::Decision),
            "fact" => Ok(Self::Fact),
            "note" => Ok(Self::Note),
            "skill" => Ok(Self::Skill),
            _ => Err(MemoryError::validation(format!(
                "unknown memory type: {s} (expected rule, decision, fact, note, or skill)"
            ))),
        }
    }
}

/// Which scope a stored memory belongs to. Exactly one, always.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Project(String),
}

impl Scope {
    /// Value of the `scope` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project(_) => "project",
        }
    }

    /// Value of the `project_id` column.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Project(id) => Some(id),
        }
    }

    /// Rebuild from the two stored columns.
    pub fn from_columns(kind: &str, project_id: Option<String>) -> Result<Self, MemoryError> {
        match (kind, project_id) {
            ("global", None) => Ok(Self::Global),
            ("project", Some(id)) => Ok(Self::Project(id)),
            (kind, id) => Err(MemoryError::validation(format!(
                "inconsistent stored scope: {kind} / {id:?}"
            ))),
        }
    }
}

/// Renders as `global` or `project:<id>`; that is also the export format.
impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Project(id) => write!(f, "project:{id}"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "global" => Ok(Self::Global),
            other => match other.strip_prefix("project:") {
                Some(id) if !id.trim().is_empty() => Ok(Self::Project(id.trim().to_string())),
                _ => Err(MemoryError::validation(format!("unknown scope: {s}"))),
            },
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Memory {
    /// UUID v7 (time-sortable) identifier.
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub scope: Scope,
    /// Sorted, de-duplicated.
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Glob patterns; stored metadata only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    pub has_embedding: bool,
    /// RFC 3339 timestamps.
    pub created_at: String,
    pub updated_at: String,
}

impl Memory {
    pub fn is_rule(&self) -> bool {
        self.memory_type == MemoryType::Rule
    }
}

/// Fixed-width RFC 3339 UTC timestamp, so string order is time order.
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

const TRAILING_PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

/// Normalize content for duplicate detection.
///
/// Lowercase, collapse whitespace runs to one space, trim, drop any trailing
/// run of `. , ; : ! ?` (with interleaved spaces), trim again.
pub fn normalize_content(content: &str) -> String {
    let collapsed = content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(|c: char| TRAILING_PUNCTUATION.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Canonical tag set: trimmed, comma-split, blanks dropped, sorted.
pub fn canonical_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    tags.iter()
        .flat_map(|t| t.as_ref().split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Storage encoding for tags (comma-joined).
pub fn encode_tags(tags: &[String]) -> String {
    tags.join(",")
}

pub fn decode_tags(stored: &str) -> Vec<String> {
    canonical_tags(&[stored])
}

/// Embeddings are stored as little-endian `f32` bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
