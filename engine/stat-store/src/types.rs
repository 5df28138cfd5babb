//! Core record types shared by every stage of the pipeline

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Remote identity of a player
pub type PlayerId = u64;

/// Unique key of a raw record
pub type RecordKey = (PlayerId, NaiveDate);

/// Per-game box score statistic tracked by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseStat {
    Points,
    Rebounds,
    Assists,
    ThreeptFg,
    Steals,
    Blocks,
    Minutes,
}

impl BaseStat {
    /// All base stats in column order
    pub const ALL: [BaseStat; 7] = [
        BaseStat::Points,
        BaseStat::Rebounds,
        BaseStat::Assists,
        BaseStat::ThreeptFg,
        BaseStat::Steals,
        BaseStat::Blocks,
        BaseStat::Minutes,
    ];

    /// Column name of the stat
    pub fn name(self) -> &'static str {
        match self {
            BaseStat::Points => "points",
            BaseStat::Rebounds => "rebounds",
            BaseStat::Assists => "assists",
            BaseStat::ThreeptFg => "threept_fg",
            BaseStat::Steals => "steals",
            BaseStat::Blocks => "blocks",
            BaseStat::Minutes => "minutes",
        }
    }

    /// Look a stat up by its column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.name() == name)
    }
}

impl fmt::Display for BaseStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BaseStat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown stat: {s}"))
    }
}

/// One game's worth of base stats. Absent values are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLine {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threept_fg: f64,
    pub steals: f64,
    pub blocks: f64,
    pub minutes: f64,
}

impl StatLine {
    /// Read a single stat
    pub fn get(&self, stat: BaseStat) -> f64 {
        match stat {
            BaseStat::Points => self.points,
            BaseStat::Rebounds => self.rebounds,
            BaseStat::Assists => self.assists,
            BaseStat::ThreeptFg => self.threept_fg,
            BaseStat::Steals => self.steals,
            BaseStat::Blocks => self.blocks,
            BaseStat::Minutes => self.minutes,
        }
    }

    /// Overwrite a single stat
    pub fn set(&mut self, stat: BaseStat, value: f64) {
        let slot = match stat {
            BaseStat::Points => &mut self.points,
            BaseStat::Rebounds => &mut self.rebounds,
            BaseStat::Assists => &mut self.assists,
            BaseStat::ThreeptFg => &mut self.threept_fg,
            BaseStat::Steals => &mut self.steals,
            BaseStat::Blocks => &mut self.blocks,
            BaseStat::Minutes => &mut self.minutes,
        };
        *slot = value;
    }
}

/// One player's performance in one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub player_id: PlayerId,
    pub player_name: String,
    pub game_date: NaiveDate,
    pub season: i32,
    pub stats: StatLine,
}

impl RawRecord {
    /// Store key of this record
    pub fn key(&self) -> RecordKey {
        (self.player_id, self.game_date)
    }
}

/// Season a game date belongs to when the source does not say.
///
/// Seasons tip off in October, so games from October onward count toward
/// that calendar year and earlier games toward the previous one.
pub fn season_for_date(date: NaiveDate) -> i32 {
    if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// A derived sum of base stats (e.g. points + rebounds + assists)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combination {
    pub name: &'static str,
    pub components: &'static [BaseStat],
}

/// Combination columns in output order
pub const COMBINATIONS: [Combination; 4] = [
    Combination { name: "points_assists", components: &[BaseStat::Points, BaseStat::Assists] },
    Combination { name: "points_rebounds", components: &[BaseStat::Points, BaseStat::Rebounds] },
    Combination {
        name: "rebounds_assists",
        components: &[BaseStat::Rebounds, BaseStat::Assists],
    },
    Combination {
        name: "points_rebounds_assists",
        components: &[BaseStat::Points, BaseStat::Rebounds, BaseStat::Assists],
    },
];

impl Combination {
    /// Sum the components of a stat line
    pub fn sum(&self, stats: &StatLine) -> f64 {
        self.components.iter().map(|stat| stats.get(*stat)).sum()
    }
}

/// One player, one game date, plus every derived feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub player_id: PlayerId,
    pub player_name: String,
    pub game_date: NaiveDate,
    pub season: i32,
    /// Numeric columns by name, including the base stats themselves
    pub features: BTreeMap<String, f64>,
}

impl FeatureRow {
    /// Read a feature by column name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}
