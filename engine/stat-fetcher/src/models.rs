use crate::error::{FetchError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stat_store::{season_for_date, PlayerId, RawRecord, StatLine, DATE_FORMAT};

/// One page of a paginated response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Continuation token for the following page, if any
    pub fn next_cursor(&self) -> Option<String> {
        self.meta.next_cursor()
    }
}

/// Pagination metadata. The cursor is opaque; numbers and strings are both accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_cursor: Option<Value>,
}

impl PageMeta {
    pub fn next_cursor(&self) -> Option<String> {
        match self.next_cursor.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiTeam {
    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Player as listed by the players endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiPlayer {
    pub id: PlayerId,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    pub team: Option<ApiTeam>,
}

impl ApiPlayer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
    }

    /// A player is active when they have a named current team
    pub fn is_active(&self) -> bool {
        self.team
            .as_ref()
            .and_then(|team| team.full_name.as_deref())
            .is_some_and(|name| !name.trim().is_empty())
    }

    pub fn to_ref(&self) -> PlayerRef {
        PlayerRef { id: self.id, name: self.full_name() }
    }
}

/// Entity being ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiGame {
    pub date: String,

    #[serde(default)]
    pub season: Option<i32>,
}

/// One box score line from the stats endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiStatLine {
    #[serde(default)]
    pub pts: Option<f64>,
    #[serde(default)]
    pub reb: Option<f64>,
    #[serde(default)]
    pub ast: Option<f64>,
    #[serde(default)]
    pub fg3m: Option<f64>,
    #[serde(default)]
    pub stl: Option<f64>,
    #[serde(default)]
    pub blk: Option<f64>,
    #[serde(default)]
    pub min: Option<Value>,
    pub game: ApiGame,
}

impl ApiStatLine {
    /// Game date. The source may append a time component, which is ignored.
    pub fn game_date(&self) -> Result<NaiveDate> {
        let day = self.game.date.split('T').next().unwrap_or_default();
        NaiveDate::parse_from_str(day.trim(), DATE_FORMAT)
            .map_err(|_| FetchError::decode(format!("bad game date {:?}", self.game.date)))
    }

    /// Convert into a store record for the given player
    pub fn to_record(&self, player: &PlayerRef) -> Result<RawRecord> {
        let game_date = self.game_date()?;
        let stats = StatLine {
            points: self.pts.unwrap_or(0.0),
            rebounds: self.reb.unwrap_or(0.0),
            assists: self.ast.unwrap_or(0.0),
            threept_fg: self.fg3m.unwrap_or(0.0),
            steals: self.stl.unwrap_or(0.0),
            blocks: self.blk.unwrap_or(0.0),
            minutes: parse_minutes(self.min.as_ref()),
        };

        Ok(RawRecord {
            player_id: player.id,
            player_name: player.name.clone(),
            game_date,
            season: self.game.season.unwrap_or_else(|| season_for_date(game_date)),
            stats,
        })
    }
}

/// Whole minutes played. Accepts `"MM:SS"`, `"MM"` or a number; anything else is 0.
pub fn parse_minutes(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(f64::trunc).unwrap_or(0.0),
        Some(Value::String(s)) => s
            .split(':')
            .next()
            .and_then(|whole| whole.trim().parse::<f64>().ok())
            .map(f64::trunc)
            .unwrap_or(0.0),
        _ => 0.0,
    }
}
