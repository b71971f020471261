use serde_json::json;

use crate::model::RawPost;

/// Built-in sample posts published when the live fetch fails or comes back empty.
/// Shaped like real backend records so they go through the normal pipeline.
pub fn fallback_posts() -> Vec<RawPost> {
    vec![
        RawPost::new(json!({
            "id": 1,
            "date": "2025-09-01T10:00:00",
            "title": {"rendered": "サンプル: シェイクアウト"},
            "content": {"rendered": "サンプルデータ"},
            "acf": {
                "participants_count": 100,
                "drill_types": "シェイクアウト",
                "location_lat": 34.697,
                "location_lng": 135.216
            }
        })),
        RawPost::new(json!({
            "id": 2,
            "date": "2025-09-01T11:00:00",
            "title": {"rendered": "サンプル: 炊き出し"},
            "content": {"rendered": "サンプルデータ2"},
            "acf": {
                "participants_count": 50,
                "drill_types": "炊き出し",
                "location_lat": 34.698,
                "location_lng": 135.217
            }
        })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_all;

    #[test]
    fn fallback_normalizes_cleanly() {
        let reports = normalize_all(&fallback_posts());
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.location.is_some()));
        assert_eq!(reports[0].participant_count, Some(100));
        assert_eq!(reports[1].categories, vec!["炊き出し"]);
    }
}
