//! Derived feature table and its store
//!
//! The feature table is always regenerated wholesale from the raw table and
//! replaced in one swap. It is never edited in place.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::io::{format_value, write_atomic, DATE_FORMAT};
use crate::types::{FeatureRow, PlayerId};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const IDENTITY_COLUMNS: [&str; 4] = ["game_date", "player_id", "player_name", "season"];

/// Feature table: ordered numeric columns plus rows sorted by player then date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Build a table. Rows are sorted by (player, date).
    pub fn new(columns: Vec<String>, mut rows: Vec<FeatureRow>) -> Self {
        rows.sort_by(|a, b| (a.player_id, a.game_date).cmp(&(b.player_id, b.game_date)));
        Self { columns, rows }
    }

    /// Numeric column names in output order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One player's rows in chronological order
    pub fn history_for(&self, player_id: PlayerId) -> &[FeatureRow] {
        let start = self.rows.partition_point(|row| row.player_id < player_id);
        let end = self.rows.partition_point(|row| row.player_id <= player_id);
        &self.rows[start..end]
    }

    /// Most recent row for a player
    pub fn latest_for(&self, player_id: PlayerId) -> Option<&FeatureRow> {
        self.history_for(player_id).last()
    }

    /// Up to `count` most recent rows for a player, oldest first
    pub fn recent_for(&self, player_id: PlayerId, count: usize) -> &[FeatureRow] {
        let history = self.history_for(player_id);
        &history[history.len().saturating_sub(count)..]
    }

    /// Sorted, deduplicated player names
    pub fn player_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rows.iter().map(|row| row.player_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolve a player name (case-insensitive). When several ids share the
    /// name, the one with the most recent game wins.
    pub fn find_player(&self, name: &str) -> Option<PlayerId> {
        let wanted = name.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.player_name.to_lowercase() == wanted)
            .max_by_key(|row| (row.game_date, row.player_id))
            .map(|row| row.player_id)
    }

    /// Write the table as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = IDENTITY_COLUMNS.to_vec();
        header.extend(self.columns.iter().map(String::as_str));
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.game_date.format(DATE_FORMAT).to_string(),
                row.player_id.to_string(),
                row.player_name.clone(),
                row.season.to_string(),
            ];
            record.extend(
                self.columns.iter().map(|column| format_value(row.get(column).unwrap_or(0.0))),
            );
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Read a table from CSV. Every non-identity column is a numeric feature.
    pub fn read_csv<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut csv_reader =
            csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| StoreError::corrupt(source, format!("missing column {name}")))
        };
        let date_col = position("game_date")?;
        let id_col = position("player_id")?;
        let name_col = position("player_name")?;
        let season_col = position("season")?;

        let feature_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !IDENTITY_COLUMNS.contains(name))
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        let mut rows = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            let line = index + 2;
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let bad = |what: &str, value: &str| {
                StoreError::corrupt(source, format!("line {line}: bad {what} {value:?}"))
            };

            let game_date = NaiveDate::parse_from_str(field(date_col), DATE_FORMAT)
                .map_err(|_| bad("game_date", field(date_col)))?;
            let player_id =
                field(id_col).parse::<PlayerId>().map_err(|_| bad("player_id", field(id_col)))?;
            let season = field(season_col).parse::<i32>().map_err(|_| bad("season", field(season_col)))?;

            let mut features = BTreeMap::new();
            for (idx, name) in &feature_cols {
                let value = field(*idx).parse::<f64>().map_err(|_| bad(name.as_str(), field(*idx)))?;
                features.insert(name.clone(), value);
            }

            rows.push(FeatureRow {
                player_id,
                player_name: field(name_col).to_string(),
                game_date,
                season,
                features,
            });
        }

        let columns = feature_cols.into_iter().map(|(_, name)| name).collect();
        Ok(Self::new(columns, rows))
    }
}

/// Store holding the current feature table
pub struct FeatureStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<FeatureTable>>,
    persist_lock: Mutex<()>,
}

impl FeatureStore {
    /// Open the feature store described by the configuration
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::config)?;
        Self::open_path(config.features_path())
    }

    /// Open a feature store at an explicit path.
    ///
    /// A missing file is an empty table. So is an unreadable or corrupt one:
    /// the table is derived, and the next rebuild overwrites it.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let table = if path.exists() {
            match Self::load(&path) {
                Ok(table) => {
                    tracing::info!("Loaded {} feature rows from {:?}", table.len(), path);
                    table
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable feature table {:?}: {}", path, e);
                    FeatureTable::default()
                }
            }
        } else {
            tracing::info!("No feature table at {:?}, starting empty", path);
            FeatureTable::default()
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(table)),
            persist_lock: Mutex::new(()),
        })
    }

    fn load(path: &Path) -> Result<FeatureTable> {
        let file = File::open(path)?;
        FeatureTable::read_csv(BufReader::new(file), &path.display().to_string())
    }

    /// Create an in-memory store seeded with a table
    pub fn with_table(table: FeatureTable) -> Self {
        Self { path: None, current: RwLock::new(Arc::new(table)), persist_lock: Mutex::new(()) }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current table
    pub fn snapshot(&self) -> Arc<FeatureTable> {
        Arc::clone(&self.current.read())
    }

    /// Persist a freshly built table, then make it current
    pub fn replace(&self, table: FeatureTable) -> Result<()> {
        let _guard = self.persist_lock.lock();

        if let Some(path) = &self.path {
            write_atomic(path, |writer| table.write_csv(writer))?;
            tracing::info!("Persisted {} feature rows to {:?}", table.len(), path);
        }

        *self.current.write() = Arc::new(table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(player_id: PlayerId, name: &str, date: &str, points: f64) -> FeatureRow {
        let mut features = BTreeMap::new();
        features.insert("points".to_string(), points);
        features.insert("points_rolling5".to_string(), points / 2.0);
        FeatureRow {
            player_id,
            player_name: name.to_string(),
            game_date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            season: 2025,
            features,
        }
    }

    fn sample_table() -> FeatureTable {
        FeatureTable::new(
            vec!["points".to_string(), "points_rolling5".to_string()],
            vec![
                row(2, "Bam Adebayo", "2025-11-02", 18.0),
                row(1, "Jalen Brunson", "2025-11-03", 30.0),
                row(1, "Jalen Brunson", "2025-11-01", 25.0),
                row(1, "Jalen Brunson", "2025-11-05", 28.0),
            ],
        )
    }

    #[test]
    fn test_latest_and_recent_rows() {
        let table = sample_table();

        let latest = table.latest_for(1).unwrap();
        assert_eq!(latest.game_date.to_string(), "2025-11-05");
        assert!(table.latest_for(99).is_none());

        let recent: Vec<f64> =
            table.recent_for(1, 2).iter().map(|r| r.get("points").unwrap()).collect();
        assert_eq!(recent, vec![30.0, 28.0]);
        assert_eq!(table.recent_for(2, 10).len(), 1);
    }

    #[test]
    fn test_player_directory() {
        let table = sample_table();
        assert_eq!(table.player_names(), vec!["Bam Adebayo", "Jalen Brunson"]);
        assert_eq!(table.find_player("jalen brunson"), Some(1));
        assert_eq!(table.find_player("Nobody"), None);
    }

    #[test]
    fn test_csv_round_trip_preserves_table() {
        let table = sample_table();
        let mut bytes = Vec::new();
        table.write_csv(&mut bytes).unwrap();

        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("game_date,player_id,player_name,season,points,points_rolling5\n"));

        let reread = FeatureTable::read_csv(bytes.as_slice(), "inline").unwrap();
        assert_eq!(reread, table);
    }

    #[test]
    fn test_replace_persists_and_swaps() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path());

        let store = FeatureStore::open(&config).unwrap();
        let before = store.snapshot();
        assert!(before.is_empty());

        store.replace(sample_table()).unwrap();
        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 4);

        let reopened = FeatureStore::open(&config).unwrap();
        assert_eq!(*reopened.snapshot(), sample_table());
    }

    #[test]
    fn test_corrupt_table_opens_empty_and_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path());
        std::fs::write(config.features_path(), "garbage\nx\n").unwrap();

        let store = FeatureStore::open(&config).unwrap();
        assert!(store.snapshot().is_empty());

        store.replace(sample_table()).unwrap();
        let reopened = FeatureStore::open(&config).unwrap();
        assert_eq!(*reopened.snapshot(), sample_table());
    }
}
