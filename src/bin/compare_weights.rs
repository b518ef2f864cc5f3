//! Compare rankings under two weightings of the same snapshot
//! Usage: compare-weights <snapshot> [--config cpi.toml] [--alt-youtube 0.55 --alt-tiktok 0.45]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use artist_cpi::config::{PipelineConfig, Weights};
use artist_cpi::logging::init_logging;
use artist_cpi::models::RankedTable;
use artist_cpi::pipeline::Pipeline;
use artist_cpi::progress::set_log_only;

#[derive(Parser)]
#[command(name = "compare-weights")]
#[command(about = "Show how artist ranks move between the configured weights and an alternative weighting")]
struct Args {
    snapshot: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.55")]
    alt_youtube: f64,

    #[arg(long, default_value = "0.45")]
    alt_tiktok: f64,
}

/// Rank of `key` in `table`, formatted for display
fn rank_cell(table: &RankedTable, key: &str) -> String {
    table
        .row(key)
        .and_then(|r| r.rank)
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn movement(base: Option<usize>, alt: Option<usize>) -> String {
    match (base, alt) {
        (Some(b), Some(a)) if a < b => format!("+{}", b - a),
        (Some(b), Some(a)) if a > b => format!("-{}", a - b),
        (Some(_), Some(_)) => "=".to_string(),
        _ => String::new(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(false);
    set_log_only(true);

    let base_config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let mut alt_config = base_config.clone();
    alt_config.weights = Weights::new(args.alt_youtube, args.alt_tiktok);

    let base = Pipeline::new(&base_config).context("Invalid base weights")?;
    let alt = Pipeline::new(&alt_config).context("Invalid alternative weights")?;

    let snapshot = base
        .load_snapshot(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    let base_table = base.run(&snapshot)?;
    let alt_table = alt.run(&snapshot)?;

    let bw = base.weights();
    let aw = alt.weights();

    println!("\n=== RANK COMPARISON ===\n");
    println!("Base weights: youtube={} tiktok={}", bw.youtube, bw.tiktok);
    println!("Alt weights:  youtube={} tiktok={}\n", aw.youtube, aw.tiktok);
    println!(
        "{:<24} {:>6} {:>6} {:>6}  {:>8} {:>8}",
        "artist", "base", "alt", "move", "base_cpi", "alt_cpi"
    );

    let mut changed = 0usize;
    for row in &base_table.rows {
        let key = row.artist_key.as_str();
        let alt_row = alt_table.row(key);
        let alt_rank = alt_row.and_then(|r| r.rank);
        let mv = movement(row.rank, alt_rank);
        if mv.starts_with('+') || mv.starts_with('-') {
            changed += 1;
        }
        println!(
            "{:<24} {:>6} {:>6} {:>6}  {:>8} {:>8}",
            row.artist,
            rank_cell(&base_table, key),
            rank_cell(&alt_table, key),
            mv,
            row.score_100.map(|s| format!("{:.2}", s)).unwrap_or_default(),
            alt_row
                .and_then(|r| r.score_100)
                .map(|s| format!("{:.2}", s))
                .unwrap_or_default(),
        );
    }

    println!(
        "\n{} of {} ranked artists change position",
        changed,
        base_table.ranked_count()
    );

    Ok(())
}
