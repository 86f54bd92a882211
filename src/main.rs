use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};

use hockey_stats::config::{Settings, current_season};
use hockey_stats::game_state::GameState;
use hockey_stats::logging::init_logging;
use hockey_stats::pipeline::{self, SeasonSummary};
use hockey_stats::retrieval::HttpRetriever;
use hockey_stats::schema::RecordFamily;
use hockey_stats::season::SeasonUnit;
use hockey_stats::snapshot::{HttpSnapshotSource, fetch_latest_snapshot};
use hockey_stats::store::Store;

#[derive(Parser)]
#[command(name = "hockey-stats", about = "Normalize and load hockey statistics into SQLite")]
struct Cli {
    /// SQLite database path. Overrides HOCKEY_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one game's skater and goalie rows from local exports.
    Game {
        #[arg(short, long)]
        game_id: u64,
        /// Directory holding the per-team exports. Overrides HOCKEY_DATA_DIR.
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        preseason: bool,
    },
    /// Replace season-level tables from the remote season summaries.
    Season {
        /// Last season to load, named by its starting year.
        #[arg(short, long)]
        season: Option<i32>,
        /// First season to load when backfilling a range.
        #[arg(long)]
        from_season: Option<i32>,
        /// Keep only rows for one game state (all, 5on5, 5on4, 4on5, other).
        #[arg(long)]
        situation: Option<String>,
        /// Known-good season whose header repairs a headerless extract.
        #[arg(long)]
        reference_season: Option<i32>,
        /// Comma-separated table names; defaults to every season table.
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },
    /// Create empty game tables, dropping existing ones. Season tables are untouched.
    Init {
        #[arg(long)]
        preseason: bool,
    },
    /// Copy a table into backup_<table>.
    Backup {
        #[arg(short, long)]
        source: String,
    },
    /// Download the most recent stored database snapshot.
    Snapshot {
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let settings = Settings::from_env();
    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(|| settings.db_path.clone());

    match cli.command {
        Command::Game {
            game_id,
            path,
            preseason,
        } => {
            let dir = path.unwrap_or_else(|| settings.data_dir.clone());
            let mut store = Store::open(&db_path)?;
            let summary = pipeline::run_game_update(&mut store, &dir, game_id, preseason)?;
            println!("Game update complete");
            println!("DB: {}", db_path.display());
            println!("Game: {}", summary.game_id);
            for report in [&summary.skaters, &summary.goalies] {
                println!("{} ({}): {} rows", report.destination, report.mode, report.rows);
            }
        }
        Command::Season {
            season,
            from_season,
            situation,
            reference_season,
            tables,
        } => {
            let last = season.unwrap_or_else(current_season);
            let first = from_season.unwrap_or(last);
            if first > last {
                bail!("--from-season {first} is after season {last}");
            }
            let situation = situation
                .as_deref()
                .map(str::parse::<GameState>)
                .transpose()?;
            let unit = SeasonUnit {
                seasons: first..=last,
                situation,
                reference_season: reference_season.or(settings.reference_season),
            };
            let families = resolve_tables(&tables)?;

            let retriever = HttpRetriever::new()?;
            let mut store = Store::open(&db_path)?;
            let summary = pipeline::run_season_update(
                &mut store,
                &retriever,
                settings.fetch_retries,
                &unit,
                &families,
            );
            print_season_summary(&db_path, &summary);
            if !summary.is_success() {
                bail!(
                    "{} of {} season tables failed",
                    summary.errors.len(),
                    families.len()
                );
            }
        }
        Command::Init { preseason } => {
            let mut store = Store::open(&db_path)?;
            let created = pipeline::init_game_tables(&mut store, preseason)?;
            println!("Initialized {} in {}", created.join(", "), db_path.display());
        }
        Command::Backup { source } => {
            let mut store = Store::open(&db_path)?;
            let backup = store.backup(&source)?;
            println!("Backed up {source} to {backup}");
        }
        Command::Snapshot { name, out } => {
            let listing_url = settings
                .snapshot_listing_url
                .clone()
                .context("HOCKEY_SNAPSHOT_LISTING_URL is not set")?;
            let name = name.unwrap_or_else(|| settings.snapshot_name.clone());
            let source = HttpSnapshotSource::new(listing_url, settings.snapshot_token.clone());
            match fetch_latest_snapshot(&source, &name, &out)? {
                Some(meta) => println!(
                    "Downloaded snapshot {} ({}) to {}",
                    meta.id,
                    meta.updated_at,
                    out.display()
                ),
                None => println!("No snapshot named {name}"),
            }
        }
    }
    Ok(())
}

fn resolve_tables(tables: &[String]) -> Result<Vec<RecordFamily>> {
    if tables.is_empty() {
        return Ok(pipeline::season_families());
    }
    let season_level = pipeline::season_families();
    tables
        .iter()
        .map(|name| {
            RecordFamily::from_table_name(name.trim())
                .filter(|f| season_level.contains(f))
                .ok_or_else(|| anyhow!("'{name}' is not a season-level table"))
        })
        .collect()
}

fn print_season_summary(db_path: &std::path::Path, summary: &SeasonSummary) {
    println!("Season update complete");
    println!("DB: {}", db_path.display());
    for report in &summary.loaded {
        println!("{} ({}): {} rows", report.destination, report.mode, report.rows);
    }
    if !summary.errors.is_empty() {
        println!("errors: {}", summary.errors.len());
        for err in &summary.errors {
            println!("   - {err}");
        }
    }
}
