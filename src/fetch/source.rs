use std::path::{Path, PathBuf};

use async_trait::async_trait;
use memchr::memchr_iter;
use memmap2::Mmap;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::model::RawPost;

/// Caller identity for backend requests. Passed explicitly, never read from ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub token: Option<String>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Supplier of raw post records.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_posts(&self, session: &SessionContext) -> Result<Vec<RawPost>, FetchError>;
}

/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn http_client(config: &Config) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(concat!("drillnorm/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::from_reqwest(&config.api_base, e))
}

/// GET a JSON document.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    session: &SessionContext,
) -> Result<Value, FetchError> {
    let response = session
        .authorize(client.get(url))
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;
    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;
    serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
        origin: url.to_string(),
        source,
    })
}

/// Paginated posts collection over HTTP.
pub struct HttpPostSource {
    client: reqwest::Client,
    url: String,
    per_page: u32,
    max_pages: u32,
}

impl HttpPostSource {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            url: config.posts_url(),
            per_page: config.per_page,
            max_pages: config.max_pages,
        }
    }
}

#[async_trait]
impl PostSource for HttpPostSource {
    async fn fetch_posts(&self, session: &SessionContext) -> Result<Vec<RawPost>, FetchError> {
        let mut posts = Vec::new();

        for page in 1..=self.max_pages {
            let request = self.client.get(&self.url).query(&[
                ("per_page", self.per_page.to_string()),
                ("page", page.to_string()),
                ("acf_format", "standard".to_string()),
            ]);
            let response = session
                .authorize(request)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&self.url, e))?;

            let status = response.status();
            // out-of-range pages answer 400
            if page > 1 && status == StatusCode::BAD_REQUEST {
                debug!(page, "page past the end of the collection");
                break;
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: self.url.clone(),
                    status: status.as_u16(),
                });
            }

            let total_pages = response
                .headers()
                .get("x-wp-totalpages")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::from_reqwest(&self.url, e))?;
            let value: Value =
                serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                    origin: self.url.clone(),
                    source,
                })?;

            let batch = match value {
                Value::Array(items) => items,
                other => {
                    warn!(page, kind = json_kind(&other), "posts response is not an array");
                    Vec::new()
                }
            };
            let count = batch.len();
            debug!(page, count, "fetched posts page");
            posts.extend(batch.into_iter().map(RawPost::from));

            if count < self.per_page as usize || total_pages.is_some_and(|total| page >= total) {
                break;
            }
        }

        Ok(posts)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Posts read from a local dump: a JSON array, or JSON Lines for `.jsonl`/`.ndjson`.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PostSource for FileSource {
    async fn fetch_posts(&self, _session: &SessionContext) -> Result<Vec<RawPost>, FetchError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_dump(&path))
            .await
            .map_err(|e| FetchError::Io {
                path: self.path.display().to_string(),
                source: std::io::Error::other(e),
            })?
    }
}

fn read_dump(path: &Path) -> Result<Vec<RawPost>, FetchError> {
    let io_err = |source: std::io::Error| FetchError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    // SAFETY: the dump is only read, and only for the duration of this call
    let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

    let is_lines = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "jsonl" | "ndjson"));
    if is_lines {
        return Ok(parse_lines(&mmap));
    }

    match serde_json::from_slice(&mmap) {
        Ok(Value::Array(items)) => Ok(items.into_iter().map(RawPost::from).collect()),
        Ok(other) => {
            warn!(path = %path.display(), kind = json_kind(&other), "dump is not an array");
            Ok(Vec::new())
        }
        Err(source) => Err(FetchError::Decode {
            origin: path.display().to_string(),
            source,
        }),
    }
}

/// One post per line; blank and malformed lines are skipped.
fn parse_lines(bytes: &[u8]) -> Vec<RawPost> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for (line_no, end) in ends.enumerate() {
        let line = bytes[start..end].trim_ascii();
        start = end + 1;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(value) => out.push(RawPost::from(value)),
            Err(e) => warn!(line = line_no + 1, error = %e, "skipping malformed line"),
        }
    }
    out
}
