use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use polars::prelude::*;

use hockey_stats::derive::derive;
use hockey_stats::families::{SKATER_JOIN_KEY, SKATER_SEASON};
use hockey_stats::nulls::resolve;

const PLAYERS: usize = 900;
const STATES: &[&str] = &["all", "5on5", "5on4", "4on5", "other"];

fn skater_season_table() -> DataFrame {
    let rows = PLAYERS * STATES.len();
    let n = (0..rows as i64).collect::<Vec<_>>();
    df![
        "goalsFor" => n.iter().map(|v| v % 90).collect::<Vec<_>>(),
        "goalsAgainst" => n.iter().map(|v| v % 70).collect::<Vec<_>>(),
        "xGoalsFor" => n.iter().map(|v| (v % 80) as f64 * 1.1).collect::<Vec<_>>(),
        "xGoalsAgainst" => n.iter().map(|v| (v % 75) as f64 * 0.9).collect::<Vec<_>>(),
        "points" => n.iter().map(|v| (v % 11 != 0).then_some(v % 100)).collect::<Vec<_>>(),
        "goals" => n.iter().map(|v| v % 50).collect::<Vec<_>>(),
        "iceTime" => n.iter().map(|v| 60_000.0 + (v % 40_000) as f64).collect::<Vec<_>>(),
        "gamesPlayed" => n.iter().map(|v| 1 + v % 82).collect::<Vec<_>>(),
    ]
    .unwrap_or_default()
}

fn on_ice_side(metric: &str) -> DataFrame {
    let mut players = Vec::new();
    let mut states = Vec::new();
    let mut positions = Vec::new();
    let mut values = Vec::new();
    for i in 0..40 {
        for state in STATES {
            players.push(format!("Skater {i}"));
            states.push(*state);
            positions.push(if i % 3 == 0 { "D" } else { "C" });
            values.push(i as f64 * 0.05);
        }
    }
    let teams = vec!["BOS"; players.len()];
    df![
        "Player" => players,
        "team" => teams,
        "situation" => states,
        "Position" => positions,
        metric => values,
    ]
    .unwrap_or_default()
}

fn bench_season_derivations(c: &mut Criterion) {
    let table = skater_season_table();
    c.bench_function("derive_and_resolve_skater_season", |b| {
        b.iter(|| {
            let derived = derive(black_box(table.clone()), SKATER_SEASON.derivations);
            let resolved = derived.and_then(|t| resolve(t, &[]));
            black_box(resolved.map(|t| t.height()).unwrap_or_default());
        })
    });
}

fn bench_skater_join(c: &mut Criterion) {
    let individual = on_ice_side("ixG");
    let on_ice = on_ice_side("xGF");
    let keys = SKATER_JOIN_KEY.iter().map(|k| col(*k)).collect::<Vec<_>>();
    c.bench_function("right_join_game_skaters", |b| {
        b.iter(|| {
            let joined = black_box(individual.clone())
                .lazy()
                .join(
                    black_box(on_ice.clone()).lazy(),
                    keys.clone(),
                    keys.clone(),
                    JoinArgs::new(JoinType::Right),
                )
                .collect();
            black_box(joined.map(|t| t.height()).unwrap_or_default());
        })
    });
}

criterion_group!(benches, bench_season_derivations, bench_skater_join);
criterion_main!(benches);
