pub mod numeric;
pub mod text;

pub use numeric::{parse_coordinate, parse_count};
pub use text::{normalize_categories, parse_timestamp, rendered_text};

use serde_json::{Map, Value};

use crate::model::RawPost;

/// Keys the custom-field bag has been published under, most recent first.
pub const FIELD_BAG_KEYS: &[&str] = &["acf", "custom_fields", "meta"];

pub const LAT_ALIASES: &[&str] = &["location_lat", "lat", "latitude"];
pub const LNG_ALIASES: &[&str] = &["location_lng", "lng", "longitude"];
pub const PARTICIPANT_ALIASES: &[&str] = &["participants_count", "participant_count", "participants"];
pub const CATEGORY_ALIASES: &[&str] = &["drill_types", "drill_type"];
pub const OCCURRED_AT_ALIASES: &[&str] = &["drill_date", "date_gmt", "date"];
pub const ORGANIZATION_ALIASES: &[&str] = &["organization", "organization_name"];

/// Value under the first alias that is set. Null and `""` count as unset.
pub fn resolve_first_present<'a>(
    record: &'a Map<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Read-only view over a post: its custom-field bag first, then the top-level record.
pub struct FieldSource<'a> {
    bag: Option<&'a Map<String, Value>>,
    root: Option<&'a Map<String, Value>>,
}

impl<'a> FieldSource<'a> {
    pub fn new(raw: &'a RawPost) -> Self {
        let root = raw.as_value().as_object();
        let bag = root.and_then(|map| {
            FIELD_BAG_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(Value::as_object)
        });
        Self { bag, root }
    }

    pub fn resolve(&self, aliases: &[&str]) -> Option<&'a Value> {
        self.bag
            .and_then(|bag| resolve_first_present(bag, aliases))
            .or_else(|| self.root.and_then(|root| resolve_first_present(root, aliases)))
    }

    /// Top-level field only, for keys that never live in the bag.
    pub fn top(&self, key: &str) -> Option<&'a Value> {
        self.root.and_then(|root| root.get(key))
    }
}
