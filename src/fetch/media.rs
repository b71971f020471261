use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;
use crate::fetch::source::{get_json, SessionContext};

/// Maps a media id to the URL of its source image.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, id: i64, session: &SessionContext) -> Result<String, FetchError>;
}

pub struct HttpMediaResolver {
    client: reqwest::Client,
    config: Config,
}

impl HttpMediaResolver {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl MediaResolver for HttpMediaResolver {
    async fn resolve(&self, id: i64, session: &SessionContext) -> Result<String, FetchError> {
        let media = get_json(&self.client, &self.config.media_url(id), session).await?;
        media
            .get("source_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or(FetchError::MissingSource { id })
    }
}

/// Resolved thumbnail URLs keyed by media id. `None` marks an id that failed to resolve.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: RwLock<HashMap<i64, Option<String>>>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .flatten()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Resolve every distinct id not seen before, concurrently. Returns how many resolved.
    pub async fn resolve_missing<R>(
        &self,
        resolver: &R,
        session: &SessionContext,
        ids: impl IntoIterator<Item = i64>,
    ) -> usize
    where
        R: MediaResolver + ?Sized,
    {
        let pending: BTreeSet<i64> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            ids.into_iter()
                .filter(|id| *id > 0 && !entries.contains_key(id))
                .collect()
        };
        if pending.is_empty() {
            return 0;
        }

        let lookups = pending.iter().map(|&id| async move {
            (id, resolver.resolve(id, session).await)
        });
        let results = join_all(lookups).await;

        let mut resolved = 0;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (id, result) in results {
            match result {
                Ok(url) => {
                    resolved += 1;
                    entries.insert(id, Some(url));
                }
                Err(e) => {
                    debug!(id, error = %e, "thumbnail unresolved");
                    entries.insert(id, None);
                }
            }
        }
        resolved
    }
}
