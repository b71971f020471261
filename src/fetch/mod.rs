pub mod fallback;
pub mod media;
pub mod source;

pub use fallback::fallback_posts;
pub use media::{HttpMediaResolver, MediaResolver, ThumbnailCache};
pub use source::{http_client, FileSource, HttpPostSource, PostSource, SessionContext};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::error::FetchError;
use crate::model::{ChartDatum, NormalizedReport, RawPost, Snapshot};
use crate::normalizer::normalize_all;

/// Normalize then aggregate one batch of raw posts.
pub fn run_pipeline(raws: &[RawPost]) -> Snapshot {
    let reports = normalize_all(raws);
    let aggregate = aggregate(&reports);
    Snapshot { reports, aggregate }
}

/// Which result stays published when fetches overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Whichever fetch completes last is published.
    #[default]
    LastWriteWins,
    /// A fetch started before the published one is discarded on completion.
    NewestRequestWins,
}

/// What consumers observe. Every field is replaced together in one update.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub snapshot: Arc<Snapshot>,
    /// Set only when the live fetch failed; the fallback snapshot is published alongside.
    pub error: Option<Arc<FetchError>>,
    pub used_fallback: bool,
    pub is_loading: bool,
    in_flight: usize,
    published_seq: u64,
}

impl DashboardState {
    pub fn reports(&self) -> &[NormalizedReport] {
        &self.snapshot.reports
    }

    pub fn total_participants(&self) -> i64 {
        self.snapshot.aggregate.total_participants
    }

    pub fn total_drills(&self) -> u64 {
        self.snapshot.aggregate.total_drills
    }

    pub fn chart_data(&self) -> Vec<ChartDatum> {
        self.snapshot.aggregate.chart_data()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_deref()
    }
}

/// Fetch -> normalize -> aggregate, published as a whole-value state.
pub struct Dashboard {
    source: Arc<dyn PostSource>,
    session: SessionContext,
    policy: PublishPolicy,
    next_seq: AtomicU64,
    state: watch::Sender<DashboardState>,
    thumbnails: ThumbnailCache,
}

impl Dashboard {
    pub fn new(source: impl PostSource + 'static, session: SessionContext) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            source: Arc::new(source),
            session,
            policy: PublishPolicy::default(),
            next_seq: AtomicU64::new(0),
            state,
            thumbnails: ThumbnailCache::new(),
        }
    }

    pub fn with_policy(mut self, policy: PublishPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Run the whole pipeline and publish its result. Never fails: a broken or empty live
    /// fetch publishes the fallback dataset, with the error recorded in the state.
    ///
    /// Returns the snapshot this run produced, whether or not it stayed published.
    pub async fn refetch(&self) -> Arc<Snapshot> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = InFlight::enter(&self.state);

        let (snapshot, error, used_fallback) = match self.source.fetch_posts(&self.session).await {
            Ok(posts) if !posts.is_empty() => {
                info!(seq, posts = posts.len(), "fetched live posts");
                (run_pipeline(&posts), None, false)
            }
            Ok(_) => {
                warn!(seq, "live fetch returned no posts, publishing fallback dataset");
                (run_pipeline(&fallback_posts()), None, true)
            }
            Err(e) => {
                warn!(seq, error = %e, "live fetch failed, publishing fallback dataset");
                (run_pipeline(&fallback_posts()), Some(Arc::new(e)), true)
            }
        };
        let snapshot = Arc::new(snapshot);

        in_flight.finish(|state| {
            if self.policy == PublishPolicy::NewestRequestWins && seq < state.published_seq {
                debug!(seq, published = state.published_seq, "discarding stale fetch result");
                return;
            }
            state.snapshot = Arc::clone(&snapshot);
            state.error = error;
            state.used_fallback = used_fallback;
            state.published_seq = seq;
        });

        snapshot
    }

    /// Fill the thumbnail cache for the published reports. Runs after publication and never
    /// touches the snapshot; failed lookups just leave the id unresolved.
    pub async fn resolve_thumbnails<R>(&self, resolver: &R) -> usize
    where
        R: MediaResolver + ?Sized,
    {
        let ids: Vec<i64> = self
            .state
            .borrow()
            .reports()
            .iter()
            .filter_map(|r| r.thumbnail_media_id)
            .collect();
        self.thumbnails
            .resolve_missing(resolver, &self.session, ids)
            .await
    }
}

/// One fetch counted in `in_flight`. Dropping it unfinished (a cancelled `refetch`) still
/// releases the count, so `is_loading` cannot stay set.
struct InFlight<'a> {
    state: &'a watch::Sender<DashboardState>,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a watch::Sender<DashboardState>) -> Self {
        state.send_modify(|state| {
            state.in_flight += 1;
            state.is_loading = true;
        });
        Self { state, done: false }
    }

    /// Release the count and publish in the same update.
    fn finish(mut self, publish: impl FnOnce(&mut DashboardState)) {
        self.done = true;
        self.state.send_modify(|state| {
            release(state);
            publish(state);
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!("fetch dropped before completion");
            self.state.send_modify(release);
        }
    }
}

fn release(state: &mut DashboardState) {
    state.in_flight = state.in_flight.saturating_sub(1);
    state.is_loading = state.in_flight > 0;
}
