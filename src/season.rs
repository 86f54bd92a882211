use std::ops::RangeInclusive;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::extract::ExtractReader;
use crate::families::{FamilySpec, SeasonSource, spec_for};
use crate::game_state::GameState;
use crate::frame::{rename_columns, union_exact};
use crate::schema::RecordFamily;

/// Scope of one season-level refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonUnit {
    pub seasons: RangeInclusive<i32>,
    pub situation: Option<GameState>,
    /// Known-good season used to rebuild a headerless extract. Defaults to
    /// the season before the one being read.
    pub reference_season: Option<i32>,
}

impl SeasonUnit {
    pub fn single(season: i32) -> Self {
        Self {
            seasons: season..=season,
            situation: None,
            reference_season: None,
        }
    }

    fn reference_for(&self, season: i32) -> i32 {
        self.reference_season.unwrap_or(season - 1)
    }
}

/// Reads every season of `unit` from `source`, unions them, and applies the
/// family-specific row filters and renames. Derivation is left to the caller.
pub fn gather_season_table(
    reader: &ExtractReader<'_>,
    source: &SeasonSource,
    unit: &SeasonUnit,
) -> Result<DataFrame> {
    let table = if source.is_per_season() {
        let mut frames = Vec::new();
        let mut origins = Vec::new();
        for season in unit.seasons.clone() {
            let param = season.to_string();
            let reference = unit.reference_for(season).to_string();
            let extract = reader.read(source.template, &param, Some(&reference), source.columns)?;
            debug!(family = %source.family, season, rows = extract.table.height(), "read season extract");
            frames.push(extract.table);
            origins.push(extract.source_id);
        }
        if frames.is_empty() {
            return Err(empty(source.family, unit));
        }
        union_exact(frames, &origins)?
    } else {
        let extract = reader.read(source.template, "", None, source.columns)?;
        let (start, end) = (*unit.seasons.start() as i64, *unit.seasons.end() as i64);
        extract
            .table
            .lazy()
            .filter(col("season").gt_eq(lit(start)).and(col("season").lt_eq(lit(end))))
            .collect()?
    };

    let spec = spec_for(source.family);
    let mut lf = prepare(table.lazy(), spec);
    if let Some(state) = unit.situation {
        lf = lf.filter(col("situation").eq(lit(state.label())));
    }
    let table = lf.collect()?;
    if table.height() == 0 {
        return Err(empty(source.family, unit));
    }

    let table = rename_columns(table, spec.renames)?;
    info!(family = %source.family, rows = table.height(), "gathered season table");
    Ok(table)
}

fn empty(family: RecordFamily, unit: &SeasonUnit) -> PipelineError {
    PipelineError::EmptyExtractSet(format!(
        "{family} for seasons {}..={}",
        unit.seasons.start(),
        unit.seasons.end()
    ))
}

// Row-level shaping that has no counterpart in the derivation table.
// Source-only columns such as `playoffGame` are dropped by the final
// projection onto the family schema.
fn prepare(lf: LazyFrame, spec: &FamilySpec) -> LazyFrame {
    match spec.family {
        RecordFamily::TeamGame => lf
            .filter(col("playoffGame").eq(lit(0)))
            .with_column(
                col("home_or_away")
                    .str()
                    .to_uppercase()
                    .eq(lit("HOME"))
                    .alias("isHomeTeam"),
            ),
        _ => lf,
    }
}
