use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn non_numeric_re() -> &'static Regex {
    static NON_NUMERIC_RE: OnceLock<Regex> = OnceLock::new();
    NON_NUMERIC_RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("valid numeric cleaning regex"))
}

/// Numbers pass through; strings are stripped down to digits, `.` and `-` and then parsed.
fn clean_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned = non_numeric_re().replace_all(s, "");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    clean_number(value?)
}

/// Fractions are truncated toward zero. Negative counts are kept as-is.
pub fn parse_count(value: Option<&Value>) -> Option<i64> {
    let n = clean_number(value?)?.trunc();
    if n < i64::MIN as f64 || n > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}
