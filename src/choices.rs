use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::fetch::source::{get_json, SessionContext};

pub const FALLBACK_CATEGORY_CHOICES: &[&str] = &[
    "シェイクアウト訓練",
    "炊き出し訓練",
    "安否確認訓練",
    "避難誘導訓練",
    "AED・救命講習",
    "その他",
];

/// Selectable values for a custom field. Tries the field-group listing, the field listing,
/// recent posts, then the built-in list. Never empty.
pub async fn load_category_choices(
    client: &reqwest::Client,
    config: &Config,
    session: &SessionContext,
    field: &str,
) -> Vec<String> {
    match get_json(client, &config.endpoint(&config.field_groups_path), session).await {
        Ok(groups) => {
            if let Some(found) = choices_from_groups(&groups, field) {
                return found;
            }
        }
        Err(e) => debug!(error = %e, "field groups unavailable"),
    }

    match get_json(client, &config.endpoint("/acf/v3/fields"), session).await {
        Ok(fields) => {
            if let Some(found) = choices_from_fields(&fields, field) {
                return found;
            }
        }
        Err(e) => debug!(error = %e, "field listing unavailable"),
    }

    let recent = format!("{}?per_page=5&acf_format=standard", config.posts_url());
    match get_json(client, &recent, session).await {
        Ok(posts) => {
            if let Some(found) = choices_from_posts(&posts, field) {
                return found;
            }
        }
        Err(e) => debug!(error = %e, "recent posts unavailable"),
    }

    FALLBACK_CATEGORY_CHOICES.iter().map(|s| s.to_string()).collect()
}

/// Listings come either as a bare array or wrapped in `{data: [...]}`.
fn listing(value: &Value) -> &[Value] {
    value
        .as_array()
        .or_else(|| value.get("data").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn choices_from_groups(groups: &Value, field: &str) -> Option<Vec<String>> {
    listing(groups).iter().find_map(|group| {
        let fields = ["fields", "acf_fields", "acf"]
            .iter()
            .find_map(|key| group.get(*key).and_then(Value::as_array))?;
        find_choices(fields, field, &["name", "key", "field_name"])
    })
}

pub fn choices_from_fields(fields: &Value, field: &str) -> Option<Vec<String>> {
    find_choices(listing(fields), field, &["name", "key"])
}

fn find_choices(fields: &[Value], field: &str, name_keys: &[&str]) -> Option<Vec<String>> {
    let def = fields.iter().find(|f| {
        name_keys
            .iter()
            .find_map(|key| f.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
            == Some(field)
    })?;
    let choices = def.get("choices")?.as_object()?;
    non_empty(choices.values().map(display).collect())
}

/// Infer choices from values already stored on recent posts.
pub fn choices_from_posts(posts: &Value, field: &str) -> Option<Vec<String>> {
    posts.as_array()?.iter().find_map(|post| {
        match post.get("acf")?.get(field)? {
            Value::Array(items) => non_empty(items.iter().map(display).collect()),
            Value::Object(map) => non_empty(labels(map)),
            _ => None,
        }
    })
}

fn labels(map: &Map<String, Value>) -> Vec<String> {
    map.iter()
        .map(|(key, value)| match value {
            Value::Null => key.clone(),
            other => display(other),
        })
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    (!v.is_empty()).then_some(v)
}
