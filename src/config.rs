use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://hitobou.com/allhat/drill/wpcms/wp-json";

/// Where and how the live dataset is fetched.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub posts_path: String,
    pub media_path: String,
    pub field_groups_path: String,
    pub per_page: u32,
    pub max_pages: u32,
    pub timeout: Duration,
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            posts_path: "/wp/v2/posts".to_string(),
            media_path: "/wp/v2/media".to_string(),
            field_groups_path: "/acf/v3/field-groups".to_string(),
            per_page: 100,
            max_pages: 10,
            timeout: Duration::from_secs(8),
            auth_token: None,
        }
    }
}

impl Config {
    /// Load configuration from `DRILL_*` environment variables, defaulting anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_base: env_or_default("DRILL_API_BASE", &defaults.api_base),
            posts_path: env_or_default("DRILL_POSTS_PATH", &defaults.posts_path),
            media_path: env_or_default("DRILL_MEDIA_PATH", &defaults.media_path),
            field_groups_path: env_or_default("DRILL_FIELD_GROUPS_PATH", &defaults.field_groups_path),
            per_page: parse_env_u32("DRILL_PER_PAGE", defaults.per_page)?,
            max_pages: parse_env_u32("DRILL_MAX_PAGES", defaults.max_pages)?,
            timeout: Duration::from_secs(parse_env_u64(
                "DRILL_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            auth_token: optional_env("DRILL_AUTH_TOKEN"),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the configuration cannot produce a working fetch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(invalid("DRILL_API_BASE", "cannot be empty"));
        }
        // the posts endpoint caps per_page at 100
        if self.per_page == 0 || self.per_page > 100 {
            return Err(invalid("DRILL_PER_PAGE", "must be between 1 and 100"));
        }
        if self.max_pages == 0 {
            return Err(invalid("DRILL_MAX_PAGES", "must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("DRILL_TIMEOUT_SECS", "must be at least 1"));
        }
        Ok(())
    }

    pub fn posts_url(&self) -> String {
        join_url(&self.api_base, &self.posts_path)
    }

    pub fn media_url(&self, id: i64) -> String {
        format!("{}/{id}", join_url(&self.api_base, &self.media_path))
    }

    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.api_base, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
