//! Remote game-log sources
//!
//! [`GameLogSource`] is the seam between the fetcher and the outside world.
//! [`HttpGameLogSource`] talks to the real paginated API. With the `testing`
//! feature, `MemorySource` serves a fixed data set with the same paging
//! semantics.

use crate::config::FetcherConfig;
use crate::error::{FetchError, Result};
use crate::models::{ApiPlayer, ApiStatLine, Page};
#[cfg(any(test, feature = "testing"))]
use crate::models::PageMeta;
use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(any(test, feature = "testing"))]
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use stat_store::{PlayerId, DATE_FORMAT};
#[cfg(any(test, feature = "testing"))]
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Filter for one player's game logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub player_id: PlayerId,
    /// Only games on or after this date
    pub start_date: Option<NaiveDate>,
    /// Only games in these seasons (empty means all)
    pub seasons: Vec<i32>,
}

/// A paginated source of players and their game logs
#[async_trait]
pub trait GameLogSource: Send + Sync {
    /// One page of the player directory
    async fn players_page(&self, cursor: Option<&str>) -> Result<Page<ApiPlayer>>;

    /// One page of a player's game logs
    async fn stats_page(&self, query: &StatsQuery, cursor: Option<&str>) -> Result<Page<ApiStatLine>>;
}

/// Parse a `Retry-After` header given in seconds.
///
/// Values a `Duration` cannot hold are treated as absent.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// HTTP client for the stats API
pub struct HttpGameLogSource {
    client: Client,
    base_url: String,
    api_key: String,
    per_page: u32,
}

impl HttpGameLogSource {
    /// Create a source, reading the API key from the environment
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &FetcherConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            per_page: config.per_page,
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Page<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.api_key)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            return Err(FetchError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(FetchError::transient(format!("{endpoint} returned {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::fatal(format!("{endpoint} returned {status}")));
        }

        response
            .json::<Page<T>>()
            .await
            .map_err(|e| FetchError::decode(format!("{endpoint}: {e}")))
    }
}

#[async_trait]
impl GameLogSource for HttpGameLogSource {
    async fn players_page(&self, cursor: Option<&str>) -> Result<Page<ApiPlayer>> {
        let mut params = vec![("per_page", self.per_page.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.get_page("players", params).await
    }

    async fn stats_page(&self, query: &StatsQuery, cursor: Option<&str>) -> Result<Page<ApiStatLine>> {
        let mut params = vec![
            ("player_ids[]", query.player_id.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(start) = query.start_date {
            params.push(("start_date", start.format(DATE_FORMAT).to_string()));
        }
        for season in &query.seasons {
            params.push(("seasons[]", season.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.get_page("stats", params).await
    }
}

/// In-memory source with cursor paging over fixed data
#[cfg(any(test, feature = "testing"))]
pub struct MemorySource {
    players: Vec<ApiPlayer>,
    stats: BTreeMap<PlayerId, Vec<ApiStatLine>>,
    per_page: usize,
    requests: Mutex<usize>,
}

#[cfg(any(test, feature = "testing"))]
impl MemorySource {
    pub fn new(per_page: usize) -> Self {
        Self {
            players: Vec::new(),
            stats: BTreeMap::new(),
            per_page: per_page.max(1),
            requests: Mutex::new(0),
        }
    }

    pub fn with_player(mut self, player: ApiPlayer, lines: Vec<ApiStatLine>) -> Self {
        self.stats.insert(player.id, lines);
        self.players.push(player);
        self
    }

    /// Requests served so far
    pub fn request_count(&self) -> usize {
        *self.requests.lock()
    }

    fn page_of<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> Result<Page<T>> {
        *self.requests.lock() += 1;

        let start = match cursor {
            Some(c) => c.parse::<usize>().map_err(|_| FetchError::fatal(format!("bad cursor {c:?}")))?,
            None => 0,
        };
        let end = (start + self.per_page).min(items.len());
        let data = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
        let next_cursor = (end < items.len()).then(|| serde_json::Value::from(end as u64));

        Ok(Page { data, meta: PageMeta { next_cursor } })
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl GameLogSource for MemorySource {
    async fn players_page(&self, cursor: Option<&str>) -> Result<Page<ApiPlayer>> {
        self.page_of(&self.players, cursor)
    }

    async fn stats_page(&self, query: &StatsQuery, cursor: Option<&str>) -> Result<Page<ApiStatLine>> {
        let lines: Vec<ApiStatLine> = self
            .stats
            .get(&query.player_id)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|line| match (query.start_date, line.game_date()) {
                        (Some(start), Ok(date)) => date >= start,
                        _ => true,
                    })
                    .filter(|line| {
                        query.seasons.is_empty()
                            || line.game.season.is_some_and(|s| query.seasons.contains(&s))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.page_of(&lines, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiGame;

    fn line(date: &str, pts: f64) -> ApiStatLine {
        ApiStatLine {
            pts: Some(pts),
            reb: None,
            ast: None,
            fg3m: None,
            stl: None,
            blk: None,
            min: None,
            game: ApiGame { date: date.to_string(), season: Some(2025) },
        }
    }

    fn player(id: PlayerId) -> ApiPlayer {
        ApiPlayer { id, first_name: "Test".to_string(), last_name: id.to_string(), team: None }
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("NaN"), None);
    }

    #[test]
    fn test_out_of_range_retry_after_is_ignored() {
        assert_eq!(parse_retry_after("1e20"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert!(parse_retry_after("1e19").is_some());
    }

    #[tokio::test]
    async fn test_memory_source_pages_by_cursor() {
        let source = MemorySource::new(2).with_player(
            player(7),
            vec![line("2025-11-01", 1.0), line("2025-11-02", 2.0), line("2025-11-03", 3.0)],
        );
        let query = StatsQuery { player_id: 7, start_date: None, seasons: vec![] };

        let first = source.stats_page(&query, None).await.unwrap();
        assert_eq!(first.data.len(), 2);
        let cursor = first.next_cursor().unwrap();

        let second = source.stats_page(&query, Some(&cursor)).await.unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.next_cursor(), None);
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_source_honours_start_date() {
        let source = MemorySource::new(10)
            .with_player(player(7), vec![line("2025-11-01", 1.0), line("2025-11-05", 2.0)]);
        let query = StatsQuery {
            player_id: 7,
            start_date: NaiveDate::from_ymd_opt(2025, 11, 3),
            seasons: vec![],
        };

        let page = source.stats_page(&query, None).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].pts, Some(2.0));
    }
}
