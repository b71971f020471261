use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unprocessed record from the content backend.
///
/// The shape changes between releases, so it is kept as an untyped JSON value and every field
/// is probed through [`crate::parsers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RawPost(pub Value);

impl RawPost {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Top-level field lookup. Non-object records have no fields.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }
}

impl From<Value> for RawPost {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReport {
    pub id: i64,
    pub title: String,
    pub content_text: String,
    pub excerpt_text: Option<String>,
    /// RFC 3339, UTC.
    pub occurred_at: Option<String>,
    pub location: Option<Location>,
    /// Negative values are passed through untouched.
    pub participant_count: Option<i64>,
    pub categories: Vec<String>,
    pub organization: Option<String>,
    /// Reference into the external media store; never resolved here.
    pub thumbnail_media_id: Option<i64>,
}

impl NormalizedReport {
    /// Content cut to at most `max_chars` characters, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content_text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => format!("{}...", &self.content_text[..byte_idx]),
            None => self.content_text.clone(),
        }
    }

    /// Short text for popups: the excerpt if the backend sent one, else the content.
    pub fn summary_text(&self) -> &str {
        self.excerpt_text.as_deref().unwrap_or(&self.content_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySegment {
    pub name: String,
    pub count: u64,
    pub color: String,
}

/// Chart-facing view of a [`CategorySegment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDatum {
    pub name: String,
    pub value: u64,
    pub color: String,
}

impl From<&CategorySegment> for ChartDatum {
    fn from(segment: &CategorySegment) -> Self {
        Self {
            name: segment.name.clone(),
            value: segment.count,
            color: segment.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub total_participants: i64,
    pub total_drills: u64,
    pub category_breakdown: Vec<CategorySegment>,
}

impl AggregateSnapshot {
    pub fn chart_data(&self) -> Vec<ChartDatum> {
        self.category_breakdown.iter().map(ChartDatum::from).collect()
    }
}

/// One complete pipeline result. Replaced whole on every fetch, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub reports: Vec<NormalizedReport>,
    pub aggregate: AggregateSnapshot,
}
