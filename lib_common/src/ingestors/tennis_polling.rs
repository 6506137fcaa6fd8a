//! # Tennis Polling Ingestor
//!
//! A self-scheduling ingestor for the tennis live feed, which only offers a
//! REST endpoint. Every cycle it fetches the full match list, groups each
//! match's markets, replaces the live set, refreshes the snapshot cache and
//! hands the result to the dispatcher.
//!
//! ## Lifecycle:
//! - **Initializing**: try the primary URL, then each fallback in order. The
//!   first that answers becomes the active source. If none does, the live set
//!   is seeded with a single placeholder record so readers always have
//!   something to show.
//! - **Polling**: fetch from the active source under a bounded timeout.
//!   A failed fetch leaves the live set exactly as the last good cycle left it.
//! - **Sleeping**: after a success, sleep `max(1s, cycle_target - fetch_time)`;
//!   after a failure, sleep the fixed failure backoff.
//!
//! Every successful cycle publishes, even when nothing changed. The dispatcher
//! decides per subscriber whether that publish becomes an update, a heartbeat
//! or nothing.
//!
//! Shutdown is cooperative: the loop only stops between cycles, so a cycle in
//! progress always finishes applying its data.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::configs::PipelineConfig;
use crate::core::{match_id_of, Dispatcher, LiveState, MatchLookup, PublishReport, SnapshotCache};
use crate::errors::{BootstrapError, FeedError};
use crate::markets::tennis::process_matches;
use crate::retrieve::ky_http::ApiClient;

/// `match_id` of the record seeded when no source answers at startup.
pub const PLACEHOLDER_MATCH_ID: &str = "placeholder";

/// Shortest pause between two successful cycles.
const MIN_CYCLE_SLEEP: Duration = Duration::from_secs(1);

/// Where match lists come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches the raw JSON body served at `url`.
    ///
    /// Non-2xx answers must be reported as `FeedError::Status`.
    async fn fetch(&self, url: &str) -> Result<Value, FeedError>;
}

/// `FeedSource` over HTTP GET.
pub struct HttpFeedSource {
    client: ApiClient,
}

impl HttpFeedSource {
    /// Creates a source whose requests time out after `timeout`.
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, FeedError> {
        Ok(Self {
            client: ApiClient::new(timeout, max_retries)?,
        })
    }

    /// Creates a source using the fetch options of `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FeedError> {
        Self::new(config.fetch_timeout(), config.fetch_max_retries)
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Value, FeedError> {
        let response = self.client.get_json::<Value>(url).await?;
        if !response.success {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: response.status,
                body: response.error_body,
            });
        }
        response
            .data
            .ok_or_else(|| FeedError::Malformed("response carried no body".to_string()))
    }
}

/// Extracts the match list from a feed body.
///
/// Accepts a bare array or an object with a `matches` array. An empty list is
/// `FeedError::EmptyFeed` unless `accept_empty` is set.
pub fn parse_feed_body(body: Value, accept_empty: bool) -> Result<Vec<Value>, FeedError> {
    let matches = match body {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove("matches") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(FeedError::Malformed("`matches` is not an array".to_string())),
            None => return Err(FeedError::Malformed("object body has no `matches`".to_string())),
        },
        _ => {
            return Err(FeedError::Malformed(
                "expected an array or an object with `matches`".to_string(),
            ))
        }
    };

    if matches.is_empty() && !accept_empty {
        return Err(FeedError::EmptyFeed);
    }
    Ok(matches)
}

/// The record served while no source has answered yet.
pub fn placeholder_match() -> Value {
    json!({
        "match_id": PLACEHOLDER_MATCH_ID,
        "placeholder": true,
        "status": "feed_unavailable",
        "message": "Live feed unavailable, waiting for the first successful poll",
    })
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Bootstrap fetch in progress.
    Initializing,
    /// A cycle's fetch and apply in progress.
    Polling,
    /// Waiting for the next cycle.
    Sleeping,
    /// The loop has exited.
    Stopped,
}

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The live set was replaced and published.
    Success {
        /// Records in the new live set.
        matches: usize,
        /// What the dispatcher did with the publish.
        report: PublishReport,
        /// Pause before the next cycle.
        next_delay: Duration,
    },
    /// The fetch failed; live state is unchanged.
    Failure {
        /// Why the fetch failed.
        error: FeedError,
        /// Pause before the next cycle.
        next_delay: Duration,
    },
}

impl CycleOutcome {
    /// Pause before the next cycle.
    pub fn next_delay(&self) -> Duration {
        match self {
            CycleOutcome::Success { next_delay, .. } | CycleOutcome::Failure { next_delay, .. } => {
                *next_delay
            }
        }
    }
}

/// # Tennis Polling Plugin
///
/// Owns the pipeline state (live set, snapshot cache, dispatcher) and is its
/// only writer. Readers get at it through `lookup()` and `dispatcher()`.
pub struct TennisPollingPlugin {
    config: PipelineConfig,
    source: Arc<dyn FeedSource>,
    live: Arc<LiveState>,
    cache: Arc<SnapshotCache>,
    dispatcher: Arc<Dispatcher>,
    active_url: RwLock<String>,
    phase: RwLock<PollPhase>,
}

impl TennisPollingPlugin {
    /// Builds the plugin and fresh pipeline state from `config`.
    pub fn new(config: PipelineConfig, source: Arc<dyn FeedSource>) -> Self {
        let cache = Arc::new(SnapshotCache::new(config.cache_ttl()));
        let dispatcher = Arc::new(Dispatcher::with_queue_capacity(
            config.heartbeat(),
            config.subscriber_queue_capacity,
        ));
        let active_url = RwLock::new(config.primary_url.clone());
        Self {
            config,
            source,
            live: Arc::new(LiveState::new()),
            cache,
            dispatcher,
            active_url,
            phase: RwLock::new(PollPhase::Initializing),
        }
    }

    /// Point lookups over the live set and cache.
    pub fn lookup(&self) -> MatchLookup {
        MatchLookup::new(Arc::clone(&self.live), Arc::clone(&self.cache))
    }

    /// The dispatcher subscribers register with.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// The snapshot cache.
    pub fn cache(&self) -> Arc<SnapshotCache> {
        Arc::clone(&self.cache)
    }

    /// The current live set.
    pub fn live_matches(&self) -> Arc<Vec<Value>> {
        self.live.snapshot()
    }

    /// The URL polled by each cycle.
    pub fn active_url(&self) -> String {
        self.active_url.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Where the loop currently is.
    pub fn phase(&self) -> PollPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// # Main Execution Loop
    ///
    /// Bootstraps, then polls until `shutdown` is cancelled. Cancellation is
    /// only observed while sleeping, never in the middle of a cycle.
    pub async fn run(&self, shutdown: CancellationToken) {
        log::info!("Tennis polling started against {}", self.config.primary_url);

        let mut next_delay = match self.bootstrap().await {
            Ok(_) => self.config.cycle_target(),
            Err(_) => self.config.failure_backoff(),
        };

        loop {
            self.set_phase(PollPhase::Sleeping);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(next_delay) => {}
            }

            next_delay = self.run_cycle().await.next_delay();
        }

        self.set_phase(PollPhase::Stopped);
        log::info!("Tennis polling stopped");
    }

    /// Initial fetch: primary first, then each fallback in order.
    ///
    /// On success the answering URL becomes the active source. When every
    /// source fails the live set is seeded with `placeholder_match()`.
    pub async fn bootstrap(&self) -> Result<usize, BootstrapError> {
        self.set_phase(PollPhase::Initializing);
        let urls = self.config.source_urls();
        let mut last_error = None;

        for url in &urls {
            match self.fetch_matches(url).await {
                Ok(matches) => {
                    *self.active_url.write().unwrap_or_else(PoisonError::into_inner) = url.clone();
                    let (count, _) = self.apply(matches, Instant::now());
                    log::info!("Bootstrapped {} matches from {}", count, url);
                    return Ok(count);
                }
                Err(e) => {
                    log::warn!("Bootstrap fetch from {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        let err = BootstrapError::AllSourcesFailed {
            attempts: urls.len(),
            last: last_error.unwrap_or_else(|| FeedError::Transport {
                url: String::new(),
                reason: "no feed sources configured".to_string(),
            }),
        };
        log::error!("{}. Serving placeholder record until the feed recovers.", err);

        let seeded = self.live.replace(vec![placeholder_match()]);
        self.dispatcher.publish(&seeded);
        Err(err)
    }

    /// One poll: fetch, group, replace, cache, publish.
    ///
    /// Never fails: a fetch error is logged and returned as
    /// `CycleOutcome::Failure` with live state untouched.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.set_phase(PollPhase::Polling);
        let url = self.active_url();
        let started = Instant::now();

        match self.fetch_matches(&url).await {
            Ok(matches) => {
                let fetch_time = started.elapsed();
                let (count, report) = self.apply(matches, Instant::now());
                log::info!(
                    "Processed {} tennis matches ({} sent, {} skipped, {} dropped)",
                    count,
                    report.sent,
                    report.skipped,
                    report.dropped
                );
                CycleOutcome::Success {
                    matches: count,
                    report,
                    next_delay: self
                        .config
                        .cycle_target()
                        .saturating_sub(fetch_time)
                        .max(MIN_CYCLE_SLEEP),
                }
            }
            Err(error) => {
                log::error!("Failed to fetch tennis data from {}: {}", url, error);
                CycleOutcome::Failure {
                    error,
                    next_delay: self.config.failure_backoff(),
                }
            }
        }
    }

    async fn fetch_matches(&self, url: &str) -> Result<Vec<Value>, FeedError> {
        let attempts = self.config.fetch_max_retries.saturating_add(1);
        let deadline = self.config.fetch_timeout().saturating_mul(attempts);

        let body = tokio::time::timeout(deadline, self.source.fetch(url))
            .await
            .map_err(|_| FeedError::Timeout {
                url: url.to_string(),
            })??;

        let matches = parse_feed_body(body, self.config.accept_empty_feed)?;
        log::debug!("Fetched {} raw matches from {}", matches.len(), url);
        Ok(matches)
    }

    fn apply(&self, matches: Vec<Value>, now: Instant) -> (usize, PublishReport) {
        let processed = process_matches(&matches);
        let snapshot = self.live.replace(processed);

        for record in snapshot.iter() {
            if let Some(match_id) = match_id_of(record) {
                self.cache.put(match_id, record.clone(), now);
            }
        }
        self.cache.sweep(now);

        let report = self.dispatcher.publish_at(&snapshot, now);
        (snapshot.len(), report)
    }

    fn set_phase(&self, phase: PollPhase) {
        let mut current = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        if *current != phase {
            log::debug!("Poll phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameKind;
    use crate::errors::LookupError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of fetch results and records the URLs asked for.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Value, FeedError>>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Value, FeedError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch(&self, url: &str) -> Result<Value, FeedError> {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(FeedError::Transport {
                    url: url.to_string(),
                    reason: "script exhausted".to_string(),
                })
            })
        }
    }

    fn down(url: &str) -> Result<Value, FeedError> {
        Err(FeedError::Status {
            url: url.to_string(),
            status: 502,
            body: None,
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            primary_url: "http://primary/api/tennis".to_string(),
            fallback_urls: vec!["http://backup/api/tennis".to_string()],
            ..Default::default()
        }
    }

    fn plugin(source: Arc<ScriptedSource>) -> TennisPollingPlugin {
        TennisPollingPlugin::new(config(), source)
    }

    #[test]
    fn feed_body_shapes() {
        assert_eq!(parse_feed_body(json!([{"match_id": "a"}]), false).unwrap().len(), 1);
        assert_eq!(
            parse_feed_body(json!({"matches": [{"match_id": "a"}], "count": 1}), false)
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(parse_feed_body(json!({"data": []}), false), Err(FeedError::Malformed(_))));
        assert!(matches!(parse_feed_body(json!({"matches": {}}), false), Err(FeedError::Malformed(_))));
        assert!(matches!(parse_feed_body(json!("text"), false), Err(FeedError::Malformed(_))));
        assert_eq!(parse_feed_body(json!([]), false), Err(FeedError::EmptyFeed));
        assert_eq!(parse_feed_body(json!({"matches": []}), true), Ok(vec![]));
    }

    #[tokio::test]
    async fn bootstrap_walks_fallbacks_and_adopts_the_one_that_answers() {
        let source = Arc::new(ScriptedSource::new(vec![
            down("http://primary/api/tennis"),
            Ok(json!({"matches": [{"match_id": "m1"}]})),
        ]));
        let plugin = plugin(Arc::clone(&source));

        assert_eq!(plugin.bootstrap().await, Ok(1));

        assert_eq!(source.calls(), vec!["http://primary/api/tennis", "http://backup/api/tennis"]);
        assert_eq!(plugin.active_url(), "http://backup/api/tennis");
        assert!(plugin.lookup().lookup("m1").is_ok());
    }

    #[tokio::test]
    async fn bootstrap_seeds_placeholder_when_every_source_fails() {
        let source = Arc::new(ScriptedSource::new(vec![
            down("http://primary/api/tennis"),
            down("http://backup/api/tennis"),
        ]));
        let plugin = plugin(source);

        let err = plugin.bootstrap().await.unwrap_err();

        assert!(matches!(err, BootstrapError::AllSourcesFailed { attempts: 2, .. }));
        assert_eq!(*plugin.live_matches(), vec![placeholder_match()]);
        assert_eq!(plugin.active_url(), "http://primary/api/tennis");
        assert!(plugin.cache().is_empty());

        let mut sub = plugin.dispatcher().subscribe().unwrap();
        let first = sub.frames.try_recv().unwrap();
        assert_eq!(first.kind(), FrameKind::Snapshot);
        assert!(first.payload().contains(PLACEHOLDER_MATCH_ID));
    }

    #[tokio::test]
    async fn successful_cycle_groups_caches_and_publishes() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(json!([{
            "match_id": "m1",
            "rapid_data": {"raw_odds_data": {"markets": [
                {"group": "Match Winner", "sel": "A"},
                {"group": "Match Winner", "sel": "B"},
                {"nogroup": "x"}
            ]}}
        }]))]));
        let plugin = plugin(source);
        let mut sub = plugin.dispatcher().subscribe().unwrap();

        let outcome = plugin.run_cycle().await;

        let CycleOutcome::Success { matches, report, next_delay } = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(matches, 1);
        assert_eq!(report.sent, 1);
        assert!(next_delay <= Duration::from_secs(10) && next_delay >= MIN_CYCLE_SLEEP);

        let live = plugin.live_matches();
        assert_eq!(
            live[0]["grouped_markets"],
            json!({"Match Winner": [
                {"group": "Match Winner", "sel": "A"},
                {"group": "Match Winner", "sel": "B"}
            ]})
        );
        assert_eq!(plugin.cache().get("m1", Instant::now()), Some(live[0].clone()));
        assert_eq!(sub.frames.try_recv().unwrap().kind(), FrameKind::Update);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_live_set() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(json!([{"match_id": "m1"}, {"match_id": "m2"}])),
            Err(FeedError::Timeout {
                url: "http://primary/api/tennis".to_string(),
            }),
            Ok(json!([{"match_id": "m3"}])),
        ]));
        let plugin = plugin(source);

        plugin.run_cycle().await;
        let before = plugin.live_matches();

        let outcome = plugin.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Failure { error: FeedError::Timeout { .. }, .. }));
        assert_eq!(outcome.next_delay(), Duration::from_secs(10));
        assert_eq!(plugin.live_matches(), before);

        assert!(matches!(plugin.run_cycle().await, CycleOutcome::Success { matches: 1, .. }));
        // m1 rotated out of the live set but is still served from the cache.
        assert!(plugin.lookup().lookup("m1").is_ok());
        assert_eq!(
            plugin.lookup().lookup("zz"),
            Err(LookupError::NotFound("zz".to_string()))
        );
    }

    #[tokio::test]
    async fn malformed_and_empty_bodies_are_failures() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(json!([{"match_id": "m1"}])),
            Ok(json!({"unexpected": true})),
            Ok(json!([])),
        ]));
        let plugin = plugin(source);
        plugin.run_cycle().await;

        assert!(matches!(plugin.run_cycle().await, CycleOutcome::Failure { error: FeedError::Malformed(_), .. }));
        assert!(matches!(plugin.run_cycle().await, CycleOutcome::Failure { error: FeedError::EmptyFeed, .. }));
        assert_eq!(plugin.live_matches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_shortens_sleep_to_the_floor() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(7)),
            ..ScriptedSource::new(vec![Ok(json!([{"match_id": "m1"}]))])
        });
        let seven_seconds = plugin(source);

        assert_eq!(seven_seconds.run_cycle().await.next_delay(), Duration::from_secs(3));

        let patient = PipelineConfig {
            fetch_timeout_secs: 30,
            ..config()
        };
        for delay in [Duration::from_millis(9_500), Duration::from_secs(12)] {
            let source = Arc::new(ScriptedSource {
                delay: Some(delay),
                ..ScriptedSource::new(vec![Ok(json!([{"match_id": "m1"}]))])
            });
            let slow = TennisPollingPlugin::new(patient.clone(), source);

            let outcome = slow.run_cycle().await;

            assert!(matches!(outcome, CycleOutcome::Success { .. }), "got {:?}", outcome);
            assert_eq!(outcome.next_delay(), MIN_CYCLE_SLEEP);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_is_cut_off_by_the_fetch_timeout() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(600)),
            ..ScriptedSource::new(vec![Ok(json!([{"match_id": "m1"}]))])
        });
        let plugin = plugin(source);

        let outcome = plugin.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failure { error: FeedError::Timeout { .. }, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_cancelled() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(json!([{"match_id": "m1"}])),
            Err(FeedError::EmptyFeed),
            Ok(json!([{"match_id": "m2"}])),
        ]));
        let plugin = Arc::new(plugin(Arc::clone(&source)));
        let shutdown = CancellationToken::new();

        let task = {
            let plugin = Arc::clone(&plugin);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { plugin.run(shutdown).await })
        };

        // bootstrap, +10s failed cycle, +10s backoff then successful cycle.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(source.calls().len(), 3);
        assert_eq!(plugin.live_matches()[0]["match_id"], "m2");
        assert_eq!(plugin.phase(), PollPhase::Sleeping);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(plugin.phase(), PollPhase::Stopped);
    }

    #[tokio::test]
    async fn http_source_reports_status_errors() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let body = "bad gateway";
                let response = format!(
                    "HTTP/1.1 502 Bad Gateway\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        let url = format!("http://127.0.0.1:{}/api/tennis", port);
        let source = HttpFeedSource::new(Duration::from_secs(5), 0).unwrap();

        let err = source.fetch(&url).await.unwrap_err();

        assert_eq!(
            err,
            FeedError::Status {
                url,
                status: 502,
                body: Some("bad gateway".to_string()),
            }
        );
    }
}
