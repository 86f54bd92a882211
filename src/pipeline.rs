use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::{error, info};

use crate::aggregate;
use crate::derive::derive;
use crate::extract::ExtractReader;
use crate::families::{FamilySpec, GOALIE_GAME, SEASON_SOURCES, SKATER_GAME, season_source, spec_for};
use crate::load::{LoadMode, LoadReport, load, load_batch};
use crate::nulls::{FillValue, resolve};
use crate::retrieval::Retriever;
use crate::schema::{RecordFamily, conform};
use crate::season::{SeasonUnit, gather_season_table};
use crate::store::Store;
use crate::validate::validate;

/// The scope of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationUnit {
    Game { game_id: u64 },
    Season(SeasonUnit),
}

impl fmt::Display for AggregationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationUnit::Game { game_id } => write!(f, "game {game_id}"),
            AggregationUnit::Season(unit) => {
                write!(f, "seasons {}..={}", unit.seasons.start(), unit.seasons.end())?;
                if let Some(state) = unit.situation {
                    write!(f, " ({state})")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Aggregate,
    Derive,
    Resolve,
    Validate,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Read => "read",
            Stage::Aggregate => "aggregate",
            Stage::Derive => "derive",
            Stage::Resolve => "resolve",
            Stage::Validate => "validate",
            Stage::Load => "load",
        })
    }
}

fn failed(stage: Stage, family: RecordFamily) -> String {
    format!("{stage} stage failed for {family}")
}

#[derive(Debug, Clone)]
pub struct GameSummary {
    pub game_id: u64,
    pub skaters: LoadReport,
    pub goalies: LoadReport,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonSummary {
    pub loaded: Vec<LoadReport>,
    pub errors: Vec<String>,
}

impl SeasonSummary {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Derive, resolve, conform and validate one family table. Nothing here
/// touches the store.
pub fn finish_family(
    table: DataFrame,
    spec: &FamilySpec,
    correlated_fill: &[(&str, FillValue)],
) -> Result<DataFrame> {
    let family = spec.family;
    let table = derive(table, spec.derivations).with_context(|| failed(Stage::Derive, family))?;
    let table = resolve(table, correlated_fill).with_context(|| failed(Stage::Resolve, family))?;
    let table = table
        .select(family.column_names())
        .map_err(Into::into)
        .and_then(|t| conform(t, family))
        .with_context(|| failed(Stage::Validate, family))?;
    validate(&table, spec.checks).with_context(|| failed(Stage::Validate, family))?;
    Ok(table)
}

/// Per-game incremental update: every skater and goalie row of `game_id`
/// found under `dir` is appended. Re-running a game appends its rows again.
pub fn run_game_update(
    store: &mut Store,
    dir: &Path,
    game_id: u64,
    preseason: bool,
) -> Result<GameSummary> {
    let unit = AggregationUnit::Game { game_id };
    info!(%unit, dir = %dir.display(), "processing raw skater and goalie data");

    let extracts = aggregate::read_game_extracts(dir, game_id)
        .with_context(|| format!("{} stage failed for {unit}", Stage::Read))?;
    let tables = aggregate::aggregate_game(game_id, extracts)
        .with_context(|| format!("{} stage failed for {unit}", Stage::Aggregate))?;

    let correlated = [
        ("gameID", FillValue::Int(tables.game_id as i64)),
        ("gameDate", FillValue::Date(tables.game_date)),
    ];
    let skaters = finish_family(tables.skaters, &SKATER_GAME, &correlated)?;
    let goalies = finish_family(tables.goalies, &GOALIE_GAME, &correlated)?;

    // Both destinations are checked before either is written, and both
    // appends share one transaction.
    let skater_dest = RecordFamily::SkaterGame.destination(preseason);
    let goalie_dest = RecordFamily::GoalieGame.destination(preseason);
    info!(%unit, "updating skater and goalie tables");
    let mut reports = load_batch(
        store,
        vec![(skaters, &skater_dest), (goalies, &goalie_dest)],
        LoadMode::Append,
    )
    .with_context(|| format!("{} stage failed for {unit}", Stage::Load))?
    .into_iter();
    let (Some(skaters), Some(goalies)) = (reports.next(), reports.next()) else {
        anyhow::bail!("{} stage for {unit} reported fewer tables than written", Stage::Load);
    };

    Ok(GameSummary {
        game_id,
        skaters,
        goalies,
    })
}

/// Season refresh: each family in `families` is its own unit, read,
/// transformed and replaced independently. One family failing does not stop
/// the others; its error is recorded in the summary.
pub fn run_season_update(
    store: &mut Store,
    retriever: &dyn Retriever,
    retries: u32,
    unit: &SeasonUnit,
    families: &[RecordFamily],
) -> SeasonSummary {
    let reader = ExtractReader::new(retriever, retries);
    let mut summary = SeasonSummary::default();
    for family in families {
        match run_season_family(store, &reader, unit, *family) {
            Ok(report) => summary.loaded.push(report),
            Err(err) => {
                error!(%family, error = %format!("{err:#}"), "season update failed");
                summary.errors.push(format!("{family}: {err:#}"));
            }
        }
    }
    summary
}

/// Creates empty game-level destinations, dropping existing ones. Season
/// tables are only ever replaced by a season refresh and are left alone.
pub fn init_game_tables(store: &mut Store, preseason: bool) -> Result<Vec<String>> {
    let destinations = RecordFamily::ALL
        .iter()
        .filter(|f| f.is_game_level())
        .map(|f| f.destination(preseason))
        .collect::<Vec<_>>();
    store
        .init_tables(&destinations)
        .context("initializing game tables")?;
    Ok(destinations.into_iter().map(|d| d.name).collect())
}

pub fn season_families() -> Vec<RecordFamily> {
    SEASON_SOURCES.iter().map(|s| s.family).collect()
}

fn run_season_family(
    store: &mut Store,
    reader: &ExtractReader<'_>,
    unit: &SeasonUnit,
    family: RecordFamily,
) -> Result<LoadReport> {
    let source = season_source(family)
        .with_context(|| format!("{family} has no season-level source"))?;
    info!(unit = %AggregationUnit::Season(unit.clone()), %family, "refreshing season table");

    let table = gather_season_table(reader, source, unit).with_context(|| failed(Stage::Read, family))?;
    let table = finish_family(table, spec_for(family), &[])?;
    load(store, table, &family.destination(false), LoadMode::Replace)
        .with_context(|| failed(Stage::Load, family))
}
