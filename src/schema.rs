use std::fmt;

use chrono::NaiveDate;

use polars::prelude::{Column, DataFrame, DataType};

use crate::error::{PipelineError, Result};
use crate::frame::{ColumnBuffer, column_names};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Text | ColumnType::Date => "TEXT",
        }
    }

    pub fn dtype(self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Text => DataType::String,
            ColumnType::Date => DataType::Date,
            ColumnType::Boolean => DataType::Boolean,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(label)
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

pub const fn int(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty: ColumnType::Integer,
    }
}

pub const fn float(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty: ColumnType::Float,
    }
}

pub const fn text(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty: ColumnType::Text,
    }
}

pub const fn date(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty: ColumnType::Date,
    }
}

pub const fn boolean(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty: ColumnType::Boolean,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordFamily {
    SkaterGame,
    GoalieGame,
    SkaterSeason,
    GoalieSeason,
    TeamSeason,
    TeamGame,
}

impl RecordFamily {
    pub const ALL: [RecordFamily; 6] = [
        RecordFamily::SkaterGame,
        RecordFamily::GoalieGame,
        RecordFamily::SkaterSeason,
        RecordFamily::GoalieSeason,
        RecordFamily::TeamSeason,
        RecordFamily::TeamGame,
    ];

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.table_name() == name)
    }

    pub fn table_name(self) -> &'static str {
        match self {
            RecordFamily::SkaterGame => "skater_games",
            RecordFamily::GoalieGame => "goalie_games",
            RecordFamily::SkaterSeason => "skaters",
            RecordFamily::GoalieSeason => "goalies",
            RecordFamily::TeamSeason => "teams",
            RecordFamily::TeamGame => "team_games",
        }
    }

    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            RecordFamily::SkaterGame => SKATER_GAME_COLUMNS,
            RecordFamily::GoalieGame => GOALIE_GAME_COLUMNS,
            RecordFamily::SkaterSeason => SKATER_SEASON_COLUMNS,
            RecordFamily::GoalieSeason => GOALIE_SEASON_COLUMNS,
            RecordFamily::TeamSeason => TEAM_SEASON_COLUMNS,
            RecordFamily::TeamGame => TEAM_GAME_COLUMNS,
        }
    }

    pub fn column_names(self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.name).collect()
    }

    pub fn column_type(self, name: &str) -> Option<ColumnType> {
        self.columns().iter().find(|c| c.name == name).map(|c| c.ty)
    }

    /// Destination for this family, optionally the preseason copy of a game-level table.
    pub fn destination(self, preseason: bool) -> Destination {
        let base = self.table_name();
        let name = if preseason && self.is_game_level() {
            format!("preseason_{base}")
        } else {
            base.to_string()
        };
        Destination { name, family: self }
    }

    pub fn is_game_level(self) -> bool {
        matches!(self, RecordFamily::SkaterGame | RecordFamily::GoalieGame)
    }
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub family: RecordFamily,
}

impl Destination {
    pub fn create_table_sql(&self) -> String {
        let cols = self
            .family
            .columns()
            .iter()
            .map(|c| format!("    {} {}", quote_ident(c.name), c.ty.sql_type()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{cols}\n)", quote_ident(&self.name))
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Checks that `df` carries exactly the family's canonical columns in
/// order and casts each column to the declared type where that is lossless.
pub fn conform(df: DataFrame, family: RecordFamily) -> Result<DataFrame> {
    let expected = family.columns();
    let found = column_names(&df);
    if found.len() != expected.len() || found.iter().zip(expected).any(|(f, e)| *f != e.name) {
        return Err(PipelineError::schema(
            family.table_name(),
            format!(
                "expected columns {:?}, found {:?}",
                family.column_names(),
                found
            ),
        ));
    }

    let columns = df
        .get_columns()
        .iter()
        .zip(expected)
        .map(|(column, def)| conform_column(family, column, def))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn conform_column(family: RecordFamily, column: &Column, def: &ColumnDef) -> Result<Column> {
    let dtype = column.dtype();
    let target = def.ty.dtype();
    if *dtype == target {
        return Ok(column.clone());
    }
    let castable = match (def.ty, dtype) {
        (_, DataType::Null) => true,
        (ColumnType::Integer, dt) => dt.is_integer(),
        (ColumnType::Float, dt) => dt.is_integer() || *dt == DataType::Float32,
        _ => false,
    };
    if castable {
        return Ok(column.cast(&target)?);
    }
    match (def.ty, dtype) {
        (ColumnType::Integer, DataType::Float32 | DataType::Float64) => whole_floats(column, def),
        (ColumnType::Date, DataType::String) => text_dates(column, def),
        _ => Err(PipelineError::schema(
            family.table_name(),
            format!("column '{}' is {dtype}, expected {}", def.name, def.ty),
        )),
    }
}

// Counts written as `3.0` are accepted; anything fractional is not.
fn whole_floats(column: &Column, def: &ColumnDef) -> Result<Column> {
    let values = column.cast(&DataType::Float64)?;
    let mut buffer = ColumnBuffer::new(ColumnType::Integer, values.len());
    for value in values.as_materialized_series().f64()? {
        match value {
            None => buffer.push_null(),
            Some(v) => buffer.push_raw(def.name, &v.to_string())?,
        }
    }
    buffer.into_column(def.name)
}

fn text_dates(column: &Column, def: &ColumnDef) -> Result<Column> {
    let mut buffer = ColumnBuffer::new(ColumnType::Date, column.len());
    for value in column.as_materialized_series().str()? {
        match value {
            None => buffer.push_null(),
            Some(raw) => buffer.push_raw(def.name, raw)?,
        }
    }
    buffer.into_column(def.name)
}

pub const SKATER_GAME_COLUMNS: &[ColumnDef] = &[
    text("name"),
    int("gameID"),
    date("gameDate"),
    text("team"),
    text("position"),
    text("situation"),
    float("iceTime"),
    int("goals"),
    int("primaryAssists"),
    int("secondaryAssists"),
    int("shots"),
    float("individualxGoals"),
    int("goalsFor"),
    int("goalsAgainst"),
    float("goalsShare"),
    float("xGoalsFor"),
    float("xGoalsAgainst"),
    float("xGoalsShare"),
    int("corsiFor"),
    int("corsiAgainst"),
    float("corsiShare"),
];

pub const GOALIE_GAME_COLUMNS: &[ColumnDef] = &[
    text("name"),
    int("gameID"),
    date("gameDate"),
    text("team"),
    text("situation"),
    float("iceTime"),
    int("shotsAgainst"),
    int("goalsAgainst"),
    float("xGoalsAgainst"),
];

pub const SKATER_SEASON_COLUMNS: &[ColumnDef] = &[
    int("playerID"),
    int("season"),
    text("name"),
    text("team"),
    text("position"),
    text("situation"),
    int("gamesPlayed"),
    float("iceTime"),
    int("points"),
    int("goals"),
    float("individualxGoals"),
    float("xGoalsFor"),
    float("xGoalsAgainst"),
    int("goalsFor"),
    int("goalsAgainst"),
    float("xGoalsForPerHour"),
    float("xGoalsAgainstPerHour"),
    float("goalsForPerHour"),
    float("goalsAgainstPerHour"),
    float("pointsPerHour"),
    float("goalsPerHour"),
    float("averageIceTime"),
    int("penaltiesTaken"),
    int("penaltiesDrawn"),
    int("faceoffsWon"),
    int("faceoffsLost"),
    int("shotsBlocked"),
    int("oZoneShifts"),
    int("dZoneShifts"),
    int("neutralZoneShifts"),
    int("flyShifts"),
];

pub const GOALIE_SEASON_COLUMNS: &[ColumnDef] = &[
    int("playerID"),
    int("season"),
    text("name"),
    text("team"),
    text("situation"),
    int("gamesPlayed"),
    float("iceTime"),
    int("goals"),
    float("xGoals"),
    int("lowDangerGoals"),
    float("lowDangerxGoals"),
    int("lowDangerShots"),
    int("mediumDangerGoals"),
    float("mediumDangerxGoals"),
    int("mediumDangerShots"),
    int("highDangerGoals"),
    float("highDangerxGoals"),
    int("highDangerShots"),
];

pub const TEAM_SEASON_COLUMNS: &[ColumnDef] = &[
    int("season"),
    text("team"),
    text("situation"),
    int("gamesPlayed"),
    float("iceTime"),
    int("goalsFor"),
    int("goalsAgainst"),
    float("xGoalsFor"),
    float("xGoalsAgainst"),
    float("goalsForPerHour"),
    float("goalsAgainstPerHour"),
    float("xGoalsForPerHour"),
    float("xGoalsAgainstPerHour"),
];

pub const TEAM_GAME_COLUMNS: &[ColumnDef] = &[
    text("team"),
    int("season"),
    int("gameID"),
    date("gameDate"),
    boolean("isHomeTeam"),
    float("iceTime"),
    text("situation"),
    float("xGoalsFor"),
    float("xGoalsAgainst"),
    float("xGoalsShare"),
    float("corsiShare"),
    int("goalsFor"),
    int("goalsAgainst"),
    int("penaltyMinutesFor"),
    int("penaltyMinutesAgainst"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_compact_and_iso() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 8);
        assert_eq!(parse_date("20241008"), expected);
        assert_eq!(parse_date("2024-10-08"), expected);
        assert_eq!(parse_date("Oct 8"), None);
    }

    #[test]
    fn preseason_prefix_only_applies_to_game_tables() {
        assert_eq!(
            RecordFamily::SkaterGame.destination(true).name,
            "preseason_skater_games"
        );
        assert_eq!(RecordFamily::TeamSeason.destination(true).name, "teams");
    }

    #[test]
    fn create_sql_quotes_mixed_case_columns() {
        let sql = RecordFamily::GoalieGame.destination(false).create_table_sql();
        assert!(sql.starts_with("CREATE TABLE \"goalie_games\""));
        assert!(sql.contains("\"xGoalsAgainst\" REAL"));
        assert!(sql.contains("\"gameDate\" TEXT"));
    }

    #[test]
    fn conform_casts_compatible_columns_and_rejects_text_counts() {
        use crate::frame::{date_at, float_at, int_at};
        use polars::prelude::*;

        let ok = df![
            "name" => ["Jeremy Swayman"],
            "gameID" => [2024020001i32],
            "gameDate" => ["2024-10-08"],
            "team" => ["BOS"],
            "situation" => ["all"],
            "iceTime" => [3600i64],
            "shotsAgainst" => [28.0f64],
            "goalsAgainst" => [2i64],
            "xGoalsAgainst" => [2.4f64],
        ]
        .unwrap();
        let conformed = conform(ok.clone(), RecordFamily::GoalieGame).unwrap();
        assert_eq!(int_at(&conformed, "gameID", 0).unwrap(), Some(2024020001));
        assert_eq!(int_at(&conformed, "shotsAgainst", 0).unwrap(), Some(28));
        assert_eq!(float_at(&conformed, "iceTime", 0).unwrap(), Some(3600.0));
        assert_eq!(
            date_at(&conformed, "gameDate", 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 8)
        );

        let mut bad = ok;
        bad.with_column(Column::new("goalsAgainst".into(), ["two"])).unwrap();
        let err = conform(bad, RecordFamily::GoalieGame).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }
}
