//! Fixed-interval polling loop that fetches the latest posts and reports keyword hits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, FetchErrorPolicy};
use crate::fetcher::{FetchError, Fetcher, PostSource};
use crate::notify::HitSink;
use crate::post::{Hit, LatestPosts};

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Callback invoked with fetch errors that do not stop the loop.
pub type ErrorReporter = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// How the checker reacts to a failed fetch.
#[derive(Clone)]
pub enum ErrorPolicy {
    /// Stop and return the error.
    FailFast,
    /// Hand the error to the callback and keep polling.
    Report(ErrorReporter),
}

impl ErrorPolicy {
    /// Policy for the configured mode. `Continue` logs errors through tracing.
    #[must_use]
    pub fn from_config(policy: FetchErrorPolicy) -> Self {
        match policy {
            FetchErrorPolicy::FailFast => Self::FailFast,
            FetchErrorPolicy::Continue => Self::Report(Arc::new(|e: &FetchError| {
                error!("Fetch failed, will retry on next tick: {e}");
            })),
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => f.write_str("FailFast"),
            Self::Report(_) => f.write_str("Report(..)"),
        }
    }
}

/// Highest post ID seen in earlier cycles. Lives only as long as the process.
#[derive(Debug, Default)]
struct SeenPosts {
    highest_id: Option<u64>,
}

impl SeenPosts {
    fn is_new(&self, id: u64) -> bool {
        self.highest_id.map_or(true, |highest| id > highest)
    }

    fn record(&mut self, batch: &LatestPosts) {
        let batch_max = batch.latest_posts.iter().map(|p| p.id).max();
        self.highest_id = self.highest_id.max(batch_max);
    }
}

/// Polls a [`PostSource`] and sends posts matching the keyword filter to a [`HitSink`].
pub struct Checker<S = Fetcher> {
    source: S,
    keywords: String,
    interval: Duration,
    policy: ErrorPolicy,
    sink: Box<dyn HitSink>,
    seen: Option<SeenPosts>,
}

impl Checker<Fetcher> {
    /// Build a checker, and the fetcher behind it, from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the forum URL cannot be turned into an endpoint or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &Config, sink: Box<dyn HitSink>) -> Result<Self, CheckerError> {
        let fetcher = Fetcher::new(&config.discourse_url, config.request_timeout)?;
        let checker = Self::new(
            fetcher,
            config.filter_keywords.clone(),
            config.poll_interval,
            sink,
        )
        .with_error_policy(ErrorPolicy::from_config(config.fetch_error_policy))
        .with_deduplication(config.deduplicate_posts);
        Ok(checker)
    }
}

impl<S: PostSource> Checker<S> {
    /// Create a fail-fast checker without deduplication.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn new(source: S, keywords: String, interval: Duration, sink: Box<dyn HitSink>) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        Self {
            source,
            keywords,
            interval,
            policy: ErrorPolicy::FailFast,
            sink,
            seen: None,
        }
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Skip posts whose ID is not above the highest ID seen in an earlier cycle.
    #[must_use]
    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.seen = enabled.then(SeenPosts::default);
        self
    }

    /// Run until `shutdown` is cancelled or a fetch fails fatally, then send the
    /// outcome on `done`.
    pub async fn run(
        self,
        shutdown: CancellationToken,
        done: oneshot::Sender<Result<(), CheckerError>>,
    ) {
        let result = self.run_until_cancelled(shutdown).await;
        if done.send(result).is_err() {
            debug!("Checker result receiver dropped");
        }
    }

    /// Run the polling loop.
    ///
    /// The first fetch happens one interval after the call. Cycles never overlap.
    ///
    /// # Errors
    ///
    /// Returns the fetch error that stopped the loop. Cancellation is `Ok(())`.
    pub async fn run_until_cancelled(mut self, shutdown: CancellationToken) -> Result<(), CheckerError> {
        info!(
            interval_secs = self.interval.as_secs(),
            sink = self.sink.name(),
            policy = ?self.policy,
            deduplicate = self.seen.is_some(),
            "Starting post checker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // Skip the first immediate tick

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Post checker shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.source.latest_posts(&shutdown).await {
                        Ok(batch) => self.process(&batch).await,
                        Err(FetchError::Cancelled) => {
                            info!("Post checker shutting down");
                            return Ok(());
                        }
                        Err(e) => self.handle_fetch_error(e)?,
                    }
                }
            }
        }
    }

    fn handle_fetch_error(&self, err: FetchError) -> Result<(), CheckerError> {
        match (&self.policy, err) {
            (_, err @ FetchError::InvalidUrl { .. }) | (ErrorPolicy::FailFast, err) => {
                Err(err.into())
            }
            (ErrorPolicy::Report(report), err) => {
                report(&err);
                Ok(())
            }
        }
    }

    async fn process(&mut self, batch: &LatestPosts) {
        let mut hits = 0usize;

        for post in &batch.latest_posts {
            if let Some(seen) = &self.seen {
                if !seen.is_new(post.id) {
                    continue;
                }
            }
            if !post.contains_keywords(&self.keywords) {
                continue;
            }

            hits += 1;
            let hit = Hit::from(post);
            if let Err(e) = self.sink.send(&hit).await {
                warn!(post_id = hit.id, sink = self.sink.name(), "Failed to send hit: {e:#}");
            }
        }

        if let Some(seen) = &mut self.seen {
            seen.record(batch);
        }

        debug!(posts = batch.latest_posts.len(), hits, "Checked latest posts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Post;

    fn batch(ids: &[u64]) -> LatestPosts {
        LatestPosts {
            latest_posts: ids
                .iter()
                .map(|&id| Post {
                    id,
                    ..Post::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_seen_posts_first_cycle_is_all_new() {
        let seen = SeenPosts::default();
        assert!(seen.is_new(0));
        assert!(seen.is_new(100));
    }

    #[test]
    fn test_seen_posts_tracks_highest_id() {
        let mut seen = SeenPosts::default();
        seen.record(&batch(&[30, 10, 20]));

        assert!(!seen.is_new(10));
        assert!(!seen.is_new(30));
        assert!(seen.is_new(31));

        // An empty or older batch never lowers the mark.
        seen.record(&batch(&[]));
        seen.record(&batch(&[5]));
        assert!(!seen.is_new(30));
        assert!(seen.is_new(31));
    }

    #[test]
    fn test_error_policy_from_config() {
        assert!(matches!(
            ErrorPolicy::from_config(FetchErrorPolicy::FailFast),
            ErrorPolicy::FailFast
        ));
        assert!(matches!(
            ErrorPolicy::from_config(FetchErrorPolicy::Continue),
            ErrorPolicy::Report(_)
        ));
    }
}
