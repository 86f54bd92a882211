use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::extract::{RawExtract, read_local};
use crate::families::{
    GOALIE_COLUMNS, GOALIE_GAME, INDIVIDUAL_COLUMNS, ON_ICE_COLUMNS, SKATER_GAME, SKATER_JOIN_KEY,
};
use crate::game_state::GameState;
use crate::frame::{column_names, date_lit, ensure_unique, rename_columns, union_exact};
use crate::retrieval::list_csv_files;
use crate::schema::{ColumnDef, parse_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Individual,
    OnIce,
    Goalie,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 3] = [
        MetricFamily::Individual,
        MetricFamily::OnIce,
        MetricFamily::Goalie,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            MetricFamily::Individual => "st",
            MetricFamily::OnIce => "oi",
            MetricFamily::Goalie => "goalies",
        }
    }

    pub fn from_suffix(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.suffix() == raw)
    }

    pub fn requested_columns(self) -> &'static [ColumnDef] {
        match self {
            MetricFamily::Individual => INDIVIDUAL_COLUMNS,
            MetricFamily::OnIce => ON_ICE_COLUMNS,
            MetricFamily::Goalie => GOALIE_COLUMNS,
        }
    }
}

/// Parsed `date_gameId_team_state_suffix.csv` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFileName {
    pub date: NaiveDate,
    pub game_id: u64,
    pub team: String,
    pub state: GameState,
    pub family: MetricFamily,
}

impl FromStr for GameFileName {
    type Err = PipelineError;

    fn from_str(file_name: &str) -> Result<Self> {
        let bad = |detail: &str| PipelineError::schema(file_name, detail.to_string());
        let stem = file_name
            .strip_suffix(".csv")
            .ok_or_else(|| bad("not a csv file"))?;
        let parts = stem.split('_').collect::<Vec<_>>();
        let [date, game_id, team, state, suffix] = parts.as_slice() else {
            return Err(bad("expected date_gameId_team_state_suffix"));
        };
        Ok(Self {
            date: parse_date(date).ok_or_else(|| bad("unreadable date"))?,
            game_id: game_id.parse().map_err(|_| bad("unreadable game id"))?,
            team: team.to_string(),
            state: state.parse()?,
            family: MetricFamily::from_suffix(suffix).ok_or_else(|| bad("unknown metric family"))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GameExtract {
    pub file: GameFileName,
    pub extract: RawExtract,
}

/// Every per-game table produced from one game's extracts.
#[derive(Debug, Clone)]
pub struct GameTables {
    pub game_id: u64,
    pub game_date: NaiveDate,
    pub skaters: DataFrame,
    pub goalies: DataFrame,
}

/// Finds the files matching `*<game_id>*.csv` under `dir`. A matching file
/// whose name does not follow the export convention is an error.
pub fn discover_game_files(dir: &Path, game_id: u64) -> Result<Vec<(PathBuf, GameFileName)>> {
    let needle = game_id.to_string();
    let mut out = Vec::new();
    for path in list_csv_files(dir)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.contains(&needle) {
            continue;
        }
        let parsed = name.parse::<GameFileName>()?;
        if parsed.game_id == game_id {
            out.push((path.clone(), parsed));
        }
    }
    Ok(out)
}

pub fn read_game_extracts(dir: &Path, game_id: u64) -> Result<Vec<GameExtract>> {
    let files = discover_game_files(dir, game_id)?;
    if files.is_empty() {
        return Err(PipelineError::EmptyExtractSet(format!(
            "game {game_id} in {}",
            dir.display()
        )));
    }
    let mut out = Vec::with_capacity(files.len());
    for (path, file) in files {
        let extract = read_local(&path, file.family.requested_columns())?;
        debug!(path = %path.display(), rows = extract.table.height(), "read game extract");
        out.push(GameExtract { file, extract });
    }
    Ok(out)
}

/// Unions each metric family across teams and states, then joins the
/// individual family onto the on-ice family. The on-ice family decides which
/// skater rows exist.
pub fn aggregate_game(game_id: u64, extracts: Vec<GameExtract>) -> Result<GameTables> {
    if extracts.is_empty() {
        return Err(PipelineError::EmptyExtractSet(format!("game {game_id}")));
    }
    if let Some(other) = extracts.iter().find(|e| e.file.game_id != game_id) {
        return Err(PipelineError::schema(
            other.extract.source_id.clone(),
            format!("extract belongs to game {}, not {game_id}", other.file.game_id),
        ));
    }
    let game_date = extracts[0].file.date;
    if let Some(other) = extracts.iter().find(|e| e.file.date != game_date) {
        return Err(PipelineError::schema(
            other.extract.source_id.clone(),
            format!("extract dated {} but game {game_id} is {game_date}", other.file.date),
        ));
    }

    let mut individual = Vec::new();
    let mut on_ice = Vec::new();
    let mut goalies = Vec::new();
    for e in extracts {
        match e.file.family {
            MetricFamily::Individual => individual.push(e),
            MetricFamily::OnIce => on_ice.push(e),
            MetricFamily::Goalie => goalies.push(e),
        }
    }

    let individual = union_family(game_id, MetricFamily::Individual, individual, true)?;
    let on_ice = union_family(game_id, MetricFamily::OnIce, on_ice, false)?;
    let goalies = union_family(game_id, MetricFamily::Goalie, goalies, true)?;
    // Header-only exports mean the game has not been published yet.
    for (family, table) in [(MetricFamily::OnIce, &on_ice), (MetricFamily::Goalie, &goalies)] {
        if table.height() == 0 {
            return Err(PipelineError::EmptyExtractSet(format!(
                "game {game_id} '{}' extracts have no rows",
                family.suffix()
            )));
        }
    }

    let skaters = join_skaters(individual, on_ice)?;
    let skaters = rename_columns(skaters, SKATER_GAME.renames)?
        .lazy()
        .with_column(normalize_name())
        .sort(["name", ON_ICE_ROW], SortMultipleOptions::default())
        .collect()?;
    let goalies = rename_columns(goalies, GOALIE_GAME.renames)?
        .lazy()
        .with_column(normalize_name())
        .sort(["name"], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;

    info!(
        game_id,
        skater_rows = skaters.height(),
        goalie_rows = goalies.height(),
        "aggregated game extracts"
    );
    Ok(GameTables {
        game_id,
        game_date,
        skaters,
        goalies,
    })
}

// Position of each skater row in the on-ice union; ties in name keep it.
const ON_ICE_ROW: &str = "onIceRow";

/// Right join of the individual family onto the on-ice family: every on-ice
/// row appears exactly once, carrying the matching individual values or nulls.
fn join_skaters(individual: DataFrame, on_ice: DataFrame) -> Result<DataFrame> {
    ensure_unique(&individual, SKATER_JOIN_KEY, "join left side")?;
    ensure_unique(&on_ice, SKATER_JOIN_KEY, "join right side")?;
    let left = column_names(&individual);
    if let Some(shared) = column_names(&on_ice)
        .into_iter()
        .find(|c| !SKATER_JOIN_KEY.contains(&c.as_str()) && left.contains(c))
    {
        return Err(PipelineError::schema(
            "join",
            format!("column '{shared}' present on both sides"),
        ));
    }

    let keys = SKATER_JOIN_KEY.iter().map(|k| col(*k)).collect::<Vec<_>>();
    let joined = individual
        .lazy()
        .join(
            on_ice.lazy().with_row_index(ON_ICE_ROW, None),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Right),
        )
        .collect()?;
    Ok(joined)
}

fn union_family(
    game_id: u64,
    family: MetricFamily,
    extracts: Vec<GameExtract>,
    with_game_columns: bool,
) -> Result<DataFrame> {
    if extracts.is_empty() {
        return Err(PipelineError::EmptyExtractSet(format!(
            "game {game_id} '{}' extracts",
            family.suffix()
        )));
    }
    let mut origins = Vec::with_capacity(extracts.len());
    let mut frames = Vec::with_capacity(extracts.len());
    for e in extracts {
        let mut literals = vec![
            lit(e.file.state.label()).alias("situation"),
            lit(e.file.team.clone()).alias("team"),
        ];
        if with_game_columns {
            literals.push(lit(e.file.game_id as i64).alias("gameID"));
            literals.push(date_lit(e.file.date).alias("gameDate"));
        }
        frames.push(e.extract.table.lazy().with_columns(literals).collect()?);
        origins.push(e.extract.source_id);
    }
    union_exact(frames, &origins)
}

// The provider writes some names with non-breaking spaces.
fn normalize_name() -> Expr {
    col("name")
        .str()
        .replace_all(lit("\u{a0}"), lit(" "), true)
        .alias("name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_file_name() {
        let parsed = "2024-10-08_2024020001_BOS_5v5_oi.csv"
            .parse::<GameFileName>()
            .unwrap();
        assert_eq!(parsed.game_id, 2024020001);
        assert_eq!(parsed.team, "BOS");
        assert_eq!(parsed.state, GameState::FiveOnFive);
        assert_eq!(parsed.family, MetricFamily::OnIce);
    }

    #[test]
    fn header_only_on_ice_exports_are_an_empty_extract_set() {
        use crate::frame::frame_from_buffers;
        use crate::frame::ColumnBuffer;

        let extract = |family: MetricFamily| {
            let columns = family
                .requested_columns()
                .iter()
                .map(|c| (c.name, ColumnBuffer::new(c.ty, 0)))
                .collect();
            let file = GameFileName {
                date: NaiveDate::from_ymd_opt(2024, 10, 12).unwrap(),
                game_id: 2024020555,
                team: "BOS".to_string(),
                state: GameState::All,
                family,
            };
            GameExtract {
                file,
                extract: RawExtract {
                    source_id: family.suffix().to_string(),
                    requested_columns: family.requested_columns().to_vec(),
                    table: frame_from_buffers(columns).unwrap(),
                },
            }
        };
        let extracts = MetricFamily::ALL.into_iter().map(extract).collect();
        let err = aggregate_game(2024020555, extracts).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyExtractSet(_)));
    }

    #[test]
    fn rejects_malformed_file_name() {
        assert!("2024020001_BOS_oi.csv".parse::<GameFileName>().is_err());
        assert!("2024-10-08_2024020001_BOS_all_xx.csv".parse::<GameFileName>().is_err());
    }
}
