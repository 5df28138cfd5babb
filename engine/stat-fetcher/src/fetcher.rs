use crate::config::FetcherConfig;
use crate::error::{FetchError, Result};
use crate::models::{Page, PlayerRef};
use crate::quota::{QuotaGate, API_BUCKET};
use crate::source::{GameLogSource, StatsQuery};
use futures::stream::{self, StreamExt};
use stat_store::{MergeSummary, PlayerId, RawRecord, RawStore};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// A player whose logs could not be fetched this run
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPlayer {
    pub player_id: PlayerId,
    pub name: String,
    pub error: String,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Players attempted
    pub players: usize,
    /// Records received that were newer than each player's last-seen date
    pub fetched: usize,
    /// Result of merging them into the raw store
    pub merged: MergeSummary,
    pub failed: Vec<FailedPlayer>,
}

/// Incremental game-log fetcher
///
/// Only records newer than each player's last-seen date are requested.
/// Players are fetched with bounded concurrency; a failure for one player is
/// logged and skipped. Merged records are persisted once at the end of a run.
pub struct Fetcher {
    config: FetcherConfig,
    source: Arc<dyn GameLogSource>,
    store: Arc<RawStore>,
    gate: QuotaGate,
}

impl Fetcher {
    /// Create a new fetcher
    pub fn new(config: FetcherConfig, source: Arc<dyn GameLogSource>, store: Arc<RawStore>) -> Result<Self> {
        config.validate().map_err(FetchError::config)?;
        Ok(Self { config, source, store, gate: QuotaGate::new() })
    }

    /// Share an existing quota gate (e.g. with another fetcher on the same key)
    pub fn with_gate(mut self, gate: QuotaGate) -> Self {
        self.gate = gate;
        self
    }

    /// Discover players, then fetch and merge everyone's new game logs
    pub async fn run(&self) -> Result<FetchReport> {
        let players = self.discover_players().await?;
        self.run_for(&players).await
    }

    /// Fetch and merge new game logs for the given players, then persist
    pub async fn run_for(&self, players: &[PlayerRef]) -> Result<FetchReport> {
        info!("Fetching game logs for {} players", players.len());

        let mut report = FetchReport { players: players.len(), ..Default::default() };

        let mut results = stream::iter(players)
            .map(|player| async move { (player, self.fetch_player(player).await) })
            .buffer_unordered(self.config.max_concurrency);

        while let Some((player, result)) = results.next().await {
            match result {
                Ok(records) => {
                    report.fetched += records.len();
                    let summary = self.store.merge(records);
                    debug!(
                        "Player {} ({}): {} new, {} duplicate",
                        player.id, player.name, summary.inserted, summary.duplicates
                    );
                    report.merged.absorb(summary);
                }
                Err(e) => {
                    warn!("Skipping player {} ({}): {}", player.id, player.name, e);
                    report.failed.push(FailedPlayer {
                        player_id: player.id,
                        name: player.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.store.persist()?;

        info!(
            "Fetch complete: {} records fetched, {} inserted, {} duplicates, {} players failed",
            report.fetched,
            report.merged.inserted,
            report.merged.duplicates,
            report.failed.len()
        );
        Ok(report)
    }

    /// List the players to ingest, following the directory's pagination
    pub async fn discover_players(&self) -> Result<Vec<PlayerRef>> {
        let mut players = Vec::new();
        let mut seen = BTreeSet::new();
        let mut skipped = 0;
        let mut cursor: Option<String> = None;
        let mut trail = CursorTrail::new(self.config.max_pages);

        loop {
            let page: Page<_> = self
                .request("players", || self.source.players_page(cursor.as_deref()))
                .await?;

            for player in &page.data {
                if self.config.active_only && !player.is_active() {
                    skipped += 1;
                    continue;
                }
                if seen.insert(player.id) {
                    players.push(player.to_ref());
                }
            }

            match trail.advance(page.next_cursor())? {
                Some(next) => {
                    cursor = Some(next);
                    self.page_pause().await;
                }
                None => break,
            }
        }

        info!("Discovered {} players ({} inactive skipped)", players.len(), skipped);
        Ok(players)
    }

    /// Fetch one player's records newer than their last-seen date
    pub async fn fetch_player(&self, player: &PlayerRef) -> Result<Vec<RawRecord>> {
        let last_seen = self.store.last_seen(player.id);
        let query = StatsQuery {
            player_id: player.id,
            start_date: last_seen,
            seasons: self.config.seasons.clone(),
        };
        debug!("Fetching player {} since {:?}", player.id, last_seen);

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut trail = CursorTrail::new(self.config.max_pages);

        loop {
            let page = self
                .request("stats", || self.source.stats_page(&query, cursor.as_deref()))
                .await?;

            for line in &page.data {
                let record = line.to_record(player)?;
                if last_seen.map_or(true, |seen| record.game_date > seen) {
                    records.push(record);
                }
            }

            match trail.advance(page.next_cursor())? {
                Some(next) => {
                    cursor = Some(next);
                    self.page_pause().await;
                }
                None => break,
            }
        }

        Ok(records)
    }

    async fn page_pause(&self) {
        let delay = self.config.page_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    /// Issue one request through the quota gate.
    ///
    /// Rate-limit responses close the gate for the hinted duration (or the
    /// configured default), capped by `max_rate_limit_secs`, and the same
    /// request is retried. Transient failures
    /// are retried with exponential backoff. Anything else is returned as is.
    async fn request<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut delay = Duration::from_secs(retry.initial_delay_secs);
        let mut failures = 0;
        let mut rate_limit_waits = 0;

        loop {
            if let Some(until) = self.gate.blocked_until(API_BUCKET).await {
                let remaining = until.saturating_duration_since(Instant::now());
                debug!("{} waiting {:?} for the quota to reopen", what, remaining);
            }
            self.gate.wait(API_BUCKET).await;

            match call().await {
                Ok(value) => return Ok(value),
                Err(FetchError::RateLimited { retry_after }) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.config.max_rate_limit_waits {
                        return Err(FetchError::RateLimited { retry_after });
                    }
                    let pause = self.config.rate_limit_pause(retry_after);
                    warn!("Rate limited on {}, pausing {:?}", what, pause);
                    self.gate.block_for(API_BUCKET, pause).await;
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures > retry.max_retries {
                        return Err(e);
                    }
                    warn!("Attempt {} on {} failed: {}, retrying in {:?}", failures, what, e, delay);
                    sleep(delay).await;
                    delay = retry.next_delay(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Guards one paginated listing against cursors that repeat or never end
struct CursorTrail {
    seen: HashSet<String>,
    pages: u32,
    max_pages: u32,
}

impl CursorTrail {
    fn new(max_pages: u32) -> Self {
        Self { seen: HashSet::new(), pages: 0, max_pages }
    }

    /// Record a received page and return the cursor to follow, if any
    fn advance(&mut self, next: Option<String>) -> Result<Option<String>> {
        self.pages += 1;
        let Some(next) = next else {
            return Ok(None);
        };

        if self.pages >= self.max_pages {
            return Err(FetchError::decode(format!("pagination exceeded {} pages", self.max_pages)));
        }
        if !self.seen.insert(next.clone()) {
            return Err(FetchError::decode(format!("cursor {next:?} was already followed")));
        }
        Ok(Some(next))
    }
}
