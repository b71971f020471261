use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// `{rendered: "..."}` wrappers and plain strings; markup is kept verbatim.
pub fn rendered_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => match map.get("rendered") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Comma-joined strings or lists, trimmed, empty tokens dropped. Order is kept, duplicates too.
pub fn normalize_categories(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => split_tokens(s),
        Some(Value::Array(items)) => items.iter().filter_map(category_entry).collect(),
        _ => Vec::new(),
    }
}

fn split_tokens(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn category_entry(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        // checkbox fields configured to return both value and label
        Value::Object(map) => {
            let text_of = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };
            text_of("label").or_else(|| text_of("value"))?.to_string()
        }
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (read as UTC), `YYYY-MM-DD` and `YYYYMMDD`.
pub fn parse_timestamp(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    let parsed = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        naive.and_utc()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        naive.and_utc()
    } else {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
            .ok()?;
        date.and_hms_opt(0, 0, 0)?.and_utc()
    };
    Some(parsed.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rendered_wrapper_and_plain() {
        assert_eq!(
            rendered_text(Some(&json!({"rendered": "<p>訓練</p>"}))),
            "<p>訓練</p>"
        );
        assert_eq!(rendered_text(Some(&json!("plain"))), "plain");
        assert_eq!(rendered_text(Some(&json!({"raw": "x"}))), "");
        assert_eq!(rendered_text(Some(&json!(42))), "");
        assert_eq!(rendered_text(None), "");
    }

    #[test]
    fn categories_from_string() {
        assert_eq!(
            normalize_categories(Some(&json!("シェイクアウト, 炊き出し ,避難訓練"))),
            vec!["シェイクアウト", "炊き出し", "避難訓練"]
        );
        assert_eq!(normalize_categories(Some(&json!(" , ,"))), Vec::<String>::new());
    }

    #[test]
    fn categories_from_array() {
        assert_eq!(
            normalize_categories(Some(&json!(["a", "", " b "]))),
            vec!["a", "b"]
        );
        assert_eq!(
            normalize_categories(Some(&json!([{"value": "v", "label": "炊き出し"}, 3, null]))),
            vec!["炊き出し", "3"]
        );
    }

    #[test]
    fn category_object_falls_back_to_value() {
        assert_eq!(
            normalize_categories(Some(&json!([
                {"label": 5, "value": "x"},
                {"label": "  ", "value": "y"},
                {"label": null}
            ]))),
            vec!["x", "y"]
        );
    }

    #[test]
    fn categories_absent() {
        assert!(normalize_categories(None).is_empty());
        assert!(normalize_categories(Some(&json!(12))).is_empty());
    }

    #[test]
    fn timestamps() {
        assert_eq!(
            parse_timestamp(Some(&json!("2025-09-01T10:30:00"))).as_deref(),
            Some("2025-09-01T10:30:00Z")
        );
        assert_eq!(
            parse_timestamp(Some(&json!("2025-09-01T10:30:00+09:00"))).as_deref(),
            Some("2025-09-01T01:30:00Z")
        );
        assert_eq!(
            parse_timestamp(Some(&json!("20250901"))).as_deref(),
            Some("2025-09-01T00:00:00Z")
        );
        assert_eq!(parse_timestamp(Some(&json!("yesterday"))), None);
        assert_eq!(parse_timestamp(Some(&json!(1))), None);
    }
}
