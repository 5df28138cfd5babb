//! Raw game-log table and its durable store
//!
//! The raw table is keyed by (player, game date). Records are immutable once
//! stored: merging a record whose key is already present discards the newcomer.
//! That makes merges idempotent, and the resulting key set is independent of the
//! order in which batches arrive.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::io::{format_value, write_atomic, DATE_FORMAT};
use crate::types::{season_for_date, BaseStat, PlayerId, RawRecord, RecordKey, StatLine};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity columns of the raw table, followed by one column per base stat
const IDENTITY_COLUMNS: [&str; 4] = ["game_date", "player_id", "player_name", "season"];

/// Outcome of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records whose key was new
    pub inserted: usize,

    /// Records discarded because their key was already stored
    pub duplicates: usize,
}

impl MergeSummary {
    /// Fold another summary into this one
    pub fn absorb(&mut self, other: MergeSummary) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
    }
}

/// In-memory raw table, ordered by player then date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    records: BTreeMap<RecordKey, RawRecord>,
}

impl RawTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from records, applying merge semantics
    pub fn from_records<I: IntoIterator<Item = RawRecord>>(records: I) -> Self {
        let mut table = Self::new();
        table.merge(records);
        table
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by player then date
    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.values()
    }

    /// Look up a single record
    pub fn get(&self, player_id: PlayerId, game_date: NaiveDate) -> Option<&RawRecord> {
        self.records.get(&(player_id, game_date))
    }

    /// One player's records in chronological order
    pub fn history(&self, player_id: PlayerId) -> impl DoubleEndedIterator<Item = &RawRecord> {
        self.records
            .range((player_id, NaiveDate::MIN)..=(player_id, NaiveDate::MAX))
            .map(|(_, record)| record)
    }

    /// Date of a player's most recent stored game
    pub fn last_seen(&self, player_id: PlayerId) -> Option<NaiveDate> {
        self.history(player_id).next_back().map(|record| record.game_date)
    }

    /// Distinct players with at least one record, ascending
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.records.keys().map(|(id, _)| *id).collect();
        ids.dedup();
        ids
    }

    /// Merge records, discarding any whose key is already present
    pub fn merge<I: IntoIterator<Item = RawRecord>>(&mut self, records: I) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for record in records {
            match self.records.entry(record.key()) {
                std::collections::btree_map::Entry::Occupied(_) => summary.duplicates += 1,
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(record);
                    summary.inserted += 1;
                }
            }
        }

        summary
    }

    /// Write the table as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = IDENTITY_COLUMNS.to_vec();
        header.extend(BaseStat::ALL.iter().map(|stat| stat.name()));
        csv_writer.write_record(&header)?;

        for record in self.iter() {
            let mut row = vec![
                record.game_date.format(DATE_FORMAT).to_string(),
                record.player_id.to_string(),
                record.player_name.clone(),
                record.season.to_string(),
            ];
            row.extend(BaseStat::ALL.iter().map(|stat| format_value(record.stats.get(*stat))));
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Read a table from CSV.
    ///
    /// Stat columns that are absent, or cells that are empty, read as zero. A
    /// missing season is inferred from the game date. Anything unparseable is
    /// reported as corruption of `source`.
    pub fn read_csv<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut csv_reader =
            csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let required = |name: &str| {
            column(name).ok_or_else(|| StoreError::corrupt(source, format!("missing column {name}")))
        };
        let date_col = required("game_date")?;
        let id_col = required("player_id")?;
        let name_col = required("player_name")?;
        let season_col = column("season");
        let stat_cols: Vec<(BaseStat, usize)> = BaseStat::ALL
            .iter()
            .filter_map(|stat| column(stat.name()).map(|idx| (*stat, idx)))
            .collect();

        let mut table = RawTable::new();
        for (index, row) in csv_reader.records().enumerate() {
            let row = row?;
            let line = index + 2;
            let field = |idx: usize| row.get(idx).unwrap_or("");
            let bad = |what: &str, value: &str| {
                StoreError::corrupt(source, format!("line {line}: bad {what} {value:?}"))
            };

            let game_date = NaiveDate::parse_from_str(field(date_col), DATE_FORMAT)
                .map_err(|_| bad("game_date", field(date_col)))?;
            let player_id = field(id_col)
                .parse::<PlayerId>()
                .map_err(|_| bad("player_id", field(id_col)))?;

            let season = match season_col.map(field).filter(|raw| !raw.is_empty()) {
                Some(raw) => raw.parse::<i32>().map_err(|_| bad("season", raw))?,
                None => season_for_date(game_date),
            };

            let mut stats = StatLine::default();
            for (stat, idx) in &stat_cols {
                let raw = field(*idx);
                if !raw.is_empty() {
                    stats.set(*stat, raw.parse::<f64>().map_err(|_| bad(stat.name(), raw))?);
                }
            }

            table.merge([RawRecord {
                player_id,
                player_name: field(name_col).to_string(),
                game_date,
                season,
                stats,
            }]);
        }

        Ok(table)
    }
}

/// Durable raw store.
///
/// Readers take cheap point-in-time snapshots; writers mutate copy-on-write
/// under the lock, so a snapshot held by a long batch job never changes
/// underneath it.
pub struct RawStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<RawTable>>,
    persist_lock: Mutex<()>,
}

impl RawStore {
    /// Open the raw store described by the configuration
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::config)?;
        Self::open_path(config.raw_path())
    }

    /// Open a raw store at an explicit path. A missing file is an empty store.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let table = if path.exists() {
            let file = File::open(&path)?;
            let table = RawTable::read_csv(BufReader::new(file), &path.display().to_string())?;
            tracing::info!("Loaded {} raw records from {:?}", table.len(), path);
            table
        } else {
            tracing::info!("No raw store at {:?}, starting empty", path);
            RawTable::new()
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(table)),
            persist_lock: Mutex::new(()),
        })
    }

    /// Create a store that is never written to disk
    pub fn in_memory() -> Self {
        Self::with_table(RawTable::new())
    }

    /// Create an in-memory store seeded with a table
    pub fn with_table(table: RawTable) -> Self {
        Self { path: None, current: RwLock::new(Arc::new(table)), persist_lock: Mutex::new(()) }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Consistent point-in-time view of the table
    pub fn snapshot(&self) -> Arc<RawTable> {
        Arc::clone(&self.current.read())
    }

    /// Most recent stored game date for a player
    pub fn last_seen(&self, player_id: PlayerId) -> Option<NaiveDate> {
        self.current.read().last_seen(player_id)
    }

    /// Merge records into the live table without persisting
    pub fn merge(&self, records: Vec<RawRecord>) -> MergeSummary {
        if records.is_empty() {
            return MergeSummary::default();
        }

        let mut current = self.current.write();
        Arc::make_mut(&mut *current).merge(records)
    }

    /// Write the current table to the backing file
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock();
        let table = self.snapshot();
        write_atomic(path, |writer| table.write_csv(writer))?;

        tracing::info!("Persisted {} raw records to {:?}", table.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(player_id: PlayerId, date: &str, points: f64) -> RawRecord {
        let game_date = NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap();
        RawRecord {
            player_id,
            player_name: format!("Player {player_id}"),
            game_date,
            season: season_for_date(game_date),
            stats: StatLine { points, ..Default::default() },
        }
    }

    #[test]
    fn test_overlapping_merge_is_idempotent() {
        let page = vec![record(1, "2025-11-01", 10.0), record(1, "2025-11-03", 20.0)];

        let mut table = RawTable::new();
        let first = table.merge(page.clone());
        let second = table.merge(page);

        assert_eq!(first, MergeSummary { inserted: 2, duplicates: 0 });
        assert_eq!(second, MergeSummary { inserted: 0, duplicates: 2 });
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicates_never_overwrite() {
        let mut table = RawTable::from_records([record(1, "2025-11-01", 10.0)]);
        table.merge([record(1, "2025-11-01", 99.0)]);

        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert_eq!(table.get(1, date).unwrap().stats.points, 10.0);
    }

    #[test]
    fn test_merge_order_does_not_change_result() {
        let a = vec![record(1, "2025-11-01", 10.0), record(2, "2025-11-02", 5.0)];
        let b = vec![record(2, "2025-11-02", 5.0), record(1, "2025-11-04", 12.0)];

        let mut ab = RawTable::new();
        ab.merge(a.clone());
        ab.merge(b.clone());

        let mut ba = RawTable::new();
        ba.merge(b);
        ba.merge(a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_last_seen_and_history() {
        let table = RawTable::from_records([
            record(7, "2025-11-05", 1.0),
            record(7, "2025-11-01", 2.0),
            record(8, "2025-12-01", 3.0),
        ]);

        assert_eq!(table.last_seen(7), NaiveDate::from_ymd_opt(2025, 11, 5));
        assert_eq!(table.last_seen(9), None);
        let dates: Vec<_> = table.history(7).map(|r| r.game_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-11-01", "2025-11-05"]);
        assert_eq!(table.player_ids(), vec![7, 8]);
    }

    #[test]
    fn test_missing_stat_cells_read_as_zero() {
        let csv = "game_date,player_id,player_name,points,assists\n\
                   2025-11-01,3,Jane Doe,21,\n";
        let table = RawTable::read_csv(csv.as_bytes(), "inline").unwrap();

        let row = table.iter().next().unwrap();
        assert_eq!(row.stats.points, 21.0);
        assert_eq!(row.stats.assists, 0.0);
        assert_eq!(row.stats.rebounds, 0.0);
        assert_eq!(row.season, 2025);
    }

    #[test]
    fn test_corrupt_rows_are_fatal() {
        let csv = "game_date,player_id,player_name\nnot-a-date,3,Jane Doe\n";
        let err = RawTable::read_csv(csv.as_bytes(), "inline").unwrap_err();
        assert!(err.is_fatal());

        let csv = "player_id,player_name\n3,Jane Doe\n";
        assert!(matches!(
            RawTable::read_csv(csv.as_bytes(), "inline"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_store_persists_and_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path());

        let store = RawStore::open(&config).unwrap();
        assert!(store.snapshot().is_empty());

        let summary = store.merge(vec![record(1, "2025-11-01", 10.0), record(1, "2025-11-03", 20.0)]);
        assert_eq!(summary.inserted, 2);
        store.persist().unwrap();

        let reopened = RawStore::open(&config).unwrap();
        assert_eq!(*reopened.snapshot(), *store.snapshot());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_merges() {
        let store = RawStore::with_table(RawTable::from_records([record(1, "2025-11-01", 10.0)]));
        let before = store.snapshot();

        store.merge(vec![record(1, "2025-11-02", 11.0)]);

        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }
}
