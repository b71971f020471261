use serde_json::Value;

use crate::model::{Location, NormalizedReport, RawPost};
use crate::parsers::{
    normalize_categories, parse_coordinate, parse_count, parse_timestamp, rendered_text,
    FieldSource, CATEGORY_ALIASES, LAT_ALIASES, LNG_ALIASES, OCCURRED_AT_ALIASES,
    ORGANIZATION_ALIASES, PARTICIPANT_ALIASES,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map one post to its canonical report. Never fails; a post without an id gets `0`.
pub fn normalize(raw: &RawPost) -> NormalizedReport {
    normalize_with_fallback_id(raw, 0)
}

/// Normalize a fetch batch in order. Posts without an id get `-(position + 1)`.
#[cfg(feature = "parallel")]
pub fn normalize_all(raws: &[RawPost]) -> Vec<NormalizedReport> {
    // indexed collect keeps input order
    raws.par_iter()
        .enumerate()
        .map(|(i, raw)| normalize_with_fallback_id(raw, synthetic_id(i)))
        .collect()
}

/// Normalize a fetch batch in order. Posts without an id get `-(position + 1)`.
#[cfg(not(feature = "parallel"))]
pub fn normalize_all(raws: &[RawPost]) -> Vec<NormalizedReport> {
    raws.iter()
        .enumerate()
        .map(|(i, raw)| normalize_with_fallback_id(raw, synthetic_id(i)))
        .collect()
}

fn synthetic_id(position: usize) -> i64 {
    -(position as i64) - 1
}

fn normalize_with_fallback_id(raw: &RawPost, fallback_id: i64) -> NormalizedReport {
    let fields = FieldSource::new(raw);

    let lat = parse_coordinate(fields.resolve(LAT_ALIASES));
    let lng = parse_coordinate(fields.resolve(LNG_ALIASES));
    // both or nothing
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Location { lat, lng }),
        _ => None,
    };

    let excerpt = rendered_text(fields.top("excerpt"));

    NormalizedReport {
        id: parse_count(fields.top("id")).unwrap_or(fallback_id),
        title: rendered_text(fields.top("title")),
        content_text: rendered_text(fields.top("content")),
        excerpt_text: (!excerpt.is_empty()).then_some(excerpt),
        occurred_at: parse_timestamp(fields.resolve(OCCURRED_AT_ALIASES)),
        location,
        participant_count: parse_count(fields.resolve(PARTICIPANT_ALIASES)),
        categories: normalize_categories(fields.resolve(CATEGORY_ALIASES)),
        organization: fields
            .resolve(ORGANIZATION_ALIASES)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        thumbnail_media_id: parse_count(fields.top("featured_media")).filter(|id| *id > 0),
    }
}
