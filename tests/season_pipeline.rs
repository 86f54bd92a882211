mod common;

use chrono::NaiveDate;

use hockey_stats::families::{GOALIE_SEASON_URL, SKATER_SEASON_URL, TEAM_GAMES_URL, TEAM_SEASON_URL};
use hockey_stats::game_state::GameState;
use hockey_stats::pipeline::run_season_update;
use hockey_stats::retrieval::{FetchError, render_url};
use hockey_stats::schema::RecordFamily;
use hockey_stats::season::SeasonUnit;
use hockey_stats::frame::{bool_at, date_at, float_at, int_at, text_at};
use hockey_stats::store::Store;
use polars::prelude::DataFrame;

use common::{ScriptedRetriever, read_fixture};

fn season_url(template: &str, season: i32) -> String {
    render_url(template, &season.to_string())
}

fn read(store: &Store, family: RecordFamily) -> DataFrame {
    store
        .read_table(&family.destination(false))
        .expect("destination readable")
}

fn float(table: &DataFrame, row: usize, column: &str) -> f64 {
    float_at(table, column, row)
        .expect("column present")
        .expect("numeric value")
}

fn int(table: &DataFrame, row: usize, column: &str) -> Option<i64> {
    int_at(table, column, row).expect("integer column present")
}

fn text(table: &DataFrame, row: usize, column: &str) -> Option<String> {
    text_at(table, column, row).expect("text column present")
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn skater_retriever() -> ScriptedRetriever {
    ScriptedRetriever::new()
        .serve(
            season_url(SKATER_SEASON_URL, 2023),
            read_fixture(&["season", "skaters_2023.csv"]),
        )
        .serve(
            season_url(SKATER_SEASON_URL, 2024),
            read_fixture(&["season", "skaters_2024_headerless.csv"]),
        )
}

#[test]
fn replacing_a_season_table_twice_is_idempotent() {
    let retriever = ScriptedRetriever::new().serve(
        season_url(TEAM_SEASON_URL, 2024),
        read_fixture(&["season", "teams_2024.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let unit = SeasonUnit::single(2024);

    let first = run_season_update(&mut store, &retriever, 0, &unit, &[RecordFamily::TeamSeason]);
    assert!(first.is_success(), "{:?}", first.errors);
    let after_first = read(&store, RecordFamily::TeamSeason);
    let second = run_season_update(&mut store, &retriever, 0, &unit, &[RecordFamily::TeamSeason]);
    assert!(second.is_success(), "{:?}", second.errors);
    let after_second = read(&store, RecordFamily::TeamSeason);

    assert_eq!(after_first.height(), 4);
    assert!(after_first.equals_missing(&after_second));
}

#[test]
fn team_rates_are_per_sixty_minutes() {
    let retriever = ScriptedRetriever::new().serve(
        season_url(TEAM_SEASON_URL, 2024),
        read_fixture(&["season", "teams_2024.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2024),
        &[RecordFamily::TeamSeason],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);

    let teams = read(&store, RecordFamily::TeamSeason);
    // BOS at 5on5: 216000 seconds
    assert_eq!(text(&teams, 1, "situation").as_deref(), Some("5on5"));
    assert_eq!(float(&teams, 1, "iceTime"), 3600.0);
    assert_close(float(&teams, 1, "goalsForPerHour"), 3.0);
    assert_close(float(&teams, 1, "goalsAgainstPerHour"), 2.0);
    assert_eq!(float(&teams, 1, "xGoalsFor"), 170.0);
}

#[test]
fn renamed_columns_are_reconciled() {
    let retriever = ScriptedRetriever::new().serve(
        season_url(TEAM_SEASON_URL, 2024),
        read_fixture(&["season", "teams_2024_renamed.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2024),
        &[RecordFamily::TeamSeason],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);
    let teams = read(&store, RecordFamily::TeamSeason);
    assert_eq!(int(&teams, 0, "gamesPlayed"), Some(82));
    assert_eq!(float(&teams, 0, "iceTime"), 4920.0);
}

#[test]
fn transient_failures_are_retried() {
    let url = season_url(TEAM_SEASON_URL, 2024);
    let retriever = ScriptedRetriever::new()
        .then(url.clone(), Err(FetchError::Transport("connection reset".to_string())))
        .then(url.clone(), Err(FetchError::Status { status: 503 }))
        .serve(url.clone(), read_fixture(&["season", "teams_2024.csv"]));
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        3,
        &SeasonUnit::single(2024),
        &[RecordFamily::TeamSeason],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);
    assert_eq!(retriever.calls_to(&url), 3);
    assert_eq!(store.row_count("teams").expect("count"), 4);
}

#[test]
fn unavailable_source_fails_only_its_own_table() {
    let goalie_url = season_url(GOALIE_SEASON_URL, 2024);
    let retriever = ScriptedRetriever::new().serve(
        season_url(TEAM_SEASON_URL, 2024),
        read_fixture(&["season", "teams_2024.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        2,
        &SeasonUnit::single(2024),
        &[RecordFamily::GoalieSeason, RecordFamily::TeamSeason],
    );

    assert!(!summary.is_success());
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("goalies"));
    assert!(summary.errors[0].contains("unavailable after 3 attempts"));
    assert_eq!(retriever.calls_to(&goalie_url), 3);
    assert_eq!(summary.loaded.len(), 1);
    assert_eq!(summary.loaded[0].destination, "teams");
    assert!(!store.table_exists("goalies").expect("lookup"));
}

#[test]
fn goalie_season_converts_ice_time_to_minutes() {
    let retriever = ScriptedRetriever::new().serve(
        season_url(GOALIE_SEASON_URL, 2024),
        read_fixture(&["season", "goalies_2024.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2024),
        &[RecordFamily::GoalieSeason],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);
    let goalies = read(&store, RecordFamily::GoalieSeason);
    assert_eq!(goalies.height(), 2);
    assert_eq!(int(&goalies, 0, "playerID"), Some(8480280));
    assert_eq!(float(&goalies, 0, "iceTime"), 3440.0);
    assert_eq!(int(&goalies, 0, "highDangerGoals"), Some(70));
}

#[test]
fn headerless_season_borrows_the_previous_season_header() {
    let retriever = skater_retriever();
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2024),
        &[RecordFamily::SkaterSeason],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);
    assert_eq!(retriever.calls_to(&season_url(SKATER_SEASON_URL, 2023)), 1);

    let skaters = read(&store, RecordFamily::SkaterSeason);
    assert_eq!(skaters.height(), 2);
    assert_eq!(text(&skaters, 0, "name").as_deref(), Some("Connor McDavid"));
    assert_eq!(int(&skaters, 0, "season"), Some(2024));
    assert_eq!(float(&skaters, 0, "iceTime"), 1500.0);
    assert_eq!(float(&skaters, 0, "averageIceTime"), 25.0);
    assert_close(float(&skaters, 0, "pointsPerHour"), 4.0);
    // empty cell in the export
    assert_eq!(int(&skaters, 1, "faceoffsWon"), Some(0));
}

#[test]
fn headerless_season_without_distinct_reference_fails() {
    let retriever = skater_retriever();
    let mut store = Store::open_in_memory().expect("in-memory store");
    let unit = SeasonUnit {
        reference_season: Some(2024),
        ..SeasonUnit::single(2024)
    };
    let summary = run_season_update(&mut store, &retriever, 0, &unit, &[RecordFamily::SkaterSeason]);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("schema mismatch"));
    assert!(!store.table_exists("skaters").expect("lookup"));
}

#[test]
fn season_range_is_backfilled_as_one_table() {
    let retriever = skater_retriever();
    let mut store = Store::open_in_memory().expect("in-memory store");
    let unit = SeasonUnit {
        seasons: 2023..=2024,
        situation: None,
        reference_season: None,
    };
    let summary = run_season_update(&mut store, &retriever, 0, &unit, &[RecordFamily::SkaterSeason]);
    assert!(summary.is_success(), "{:?}", summary.errors);

    let skaters = read(&store, RecordFamily::SkaterSeason);
    let seasons = (0..skaters.height())
        .filter_map(|i| int(&skaters, i, "season"))
        .collect::<Vec<_>>();
    assert_eq!(seasons, vec![2023, 2023, 2023, 2024, 2024]);
    // 108000 seconds over 80 games
    assert_eq!(float(&skaters, 0, "averageIceTime"), 22.5);
    assert_close(float(&skaters, 0, "goalsPerHour"), 2.0);
}

#[test]
fn situation_filter_keeps_one_state() {
    let retriever = skater_retriever();
    let mut store = Store::open_in_memory().expect("in-memory store");
    let unit = SeasonUnit {
        situation: Some(GameState::FiveOnFive),
        ..SeasonUnit::single(2023)
    };
    let summary = run_season_update(&mut store, &retriever, 0, &unit, &[RecordFamily::SkaterSeason]);
    assert!(summary.is_success(), "{:?}", summary.errors);
    let skaters = read(&store, RecordFamily::SkaterSeason);
    assert_eq!(skaters.height(), 1);
    assert_eq!(text(&skaters, 0, "situation").as_deref(), Some("5on5"));
}

#[test]
fn team_games_keep_regular_season_rows_in_range() {
    let retriever = ScriptedRetriever::new().serve(
        TEAM_GAMES_URL,
        read_fixture(&["season", "all_teams.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2024),
        &[RecordFamily::TeamGame],
    );
    assert!(summary.is_success(), "{:?}", summary.errors);

    let games = read(&store, RecordFamily::TeamGame);
    assert_eq!(games.height(), 2);
    assert_eq!(int(&games, 0, "gameID"), Some(2024020001));
    assert_eq!(
        date_at(&games, "gameDate", 0).expect("gameDate"),
        Some(NaiveDate::from_ymd_opt(2024, 10, 8).expect("valid date"))
    );
    assert_eq!(bool_at(&games, "isHomeTeam", 0).expect("isHomeTeam"), Some(true));
    assert_eq!(float(&games, 0, "iceTime"), 60.0);
    assert_eq!(float(&games, 1, "iceTime"), 48.0);
    assert_eq!(int(&games, 0, "penaltyMinutesAgainst"), Some(8));
    assert_eq!(float(&games, 0, "xGoalsShare"), 0.61);
}

#[test]
fn empty_season_range_is_an_empty_extract_set() {
    let retriever = ScriptedRetriever::new().serve(
        TEAM_GAMES_URL,
        read_fixture(&["season", "all_teams.csv"]),
    );
    let mut store = Store::open_in_memory().expect("in-memory store");
    let summary = run_season_update(
        &mut store,
        &retriever,
        0,
        &SeasonUnit::single(2019),
        &[RecordFamily::TeamGame],
    );
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("no raw extracts matched"));
}
