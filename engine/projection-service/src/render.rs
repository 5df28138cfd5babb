//! Plain-text rendering for the command line

use projection_engine::PredictionResult;
use stat_store::{BaseStat, FeatureRow};
use std::fmt::Write;

/// Render a projection as an aligned table
pub fn render_projection(result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (id {}), as of {}", result.player_name, result.player_id, result.as_of);

    for projection in result.stats.values() {
        let detail: Vec<String> = projection
            .outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(v) => format!("{} {:.2}", o.algorithm, v),
                Err(_) => format!("{} failed", o.algorithm),
            })
            .collect();

        let value = match projection.value {
            Some(v) => format!("{v:.2}"),
            None => "n/a".to_string(),
        };
        let _ = write!(out, "{:<24}{:>8}", projection.statistic.name(), value);
        if !detail.is_empty() {
            let _ = write!(out, "  ({})", detail.join(", "));
        }
        out.push('\n');
    }

    for combo in &result.combos {
        let _ = write!(out, "{:<24}{:>8.2}", combo.name, combo.value);
        if combo.degraded {
            let missing: Vec<&str> = combo.missing.iter().map(|s| s.name()).collect();
            let _ = write!(out, "  [degraded: {} unavailable]", missing.join(", "));
        }
        out.push('\n');
    }

    out
}

/// Render recent games, oldest first
pub fn render_recent(rows: &[FeatureRow]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<12}", "date");
    for stat in BaseStat::ALL {
        let _ = write!(out, "{:>12}", stat.name());
    }
    out.push('\n');

    for row in rows {
        let _ = write!(out, "{:<12}", row.game_date.to_string());
        for stat in BaseStat::ALL {
            let _ = write!(out, "{:>12}", row.get(stat.name()).unwrap_or(0.0));
        }
        out.push('\n');
    }
    out
}
