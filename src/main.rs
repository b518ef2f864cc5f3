use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use artist_cpi::config::PipelineConfig;
use artist_cpi::intake::resolve_snapshot_path;
use artist_cpi::logging::init_logging;
use artist_cpi::pipeline::Pipeline;
use artist_cpi::progress::{create_spinner, finish_spinner, format_duration, set_log_only};
use artist_cpi::report::{format_summary, write_csv, write_sqlite, write_stats};
use artist_cpi::safety::{validate_output_path, OUTPUT_PATTERN};

#[derive(Parser)]
#[command(name = "artist-cpi")]
#[command(about = "Rank artists by Combined Popularity Index from a YouTube/TikTok measurement snapshot")]
struct Args {
    /// Snapshot JSON file, or a directory holding measurements_*.json snapshots
    snapshot: PathBuf,

    /// Ranked table CSV output (name must contain "cpi")
    output: PathBuf,

    /// TOML config with [weights] and [[artists]] roster
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "CPI_YOUTUBE_WEIGHT")]
    youtube_weight: Option<f64>,

    #[arg(long, env = "CPI_TIKTOK_WEIGHT")]
    tiktok_weight: Option<f64>,

    /// Also write the table to a SQLite database
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Write run stats JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Number of ranked artists shown in the summary
    #[arg(long, default_value = "10")]
    top: usize,

    /// Hide progress bars, log phases instead
    #[arg(long)]
    log_only: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    set_log_only(args.log_only);

    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.override_weights(args.youtube_weight, args.tiktok_weight);
    let pipeline = Pipeline::new(&config).context("Invalid configuration")?;

    let snapshot_path = resolve_snapshot_path(&args.snapshot)?;
    validate_output_path(&args.output, OUTPUT_PATTERN, &[snapshot_path.as_path()])?;
    if let Some(sqlite) = &args.sqlite {
        validate_output_path(sqlite, OUTPUT_PATTERN, &[snapshot_path.as_path(), args.output.as_path()])?;
    }

    let spinner = create_spinner("Loading snapshot");
    let snapshot = pipeline
        .load_snapshot(&snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;
    finish_spinner(
        &spinner,
        format!(
            "Loaded {} measurements for {} artists",
            snapshot.measurement_count(),
            snapshot.artists.len()
        ),
    );
    if !snapshot.issues.is_empty() {
        warn!(rejected = snapshot.issues.len(), "some raw records were rejected");
    }

    let mut table = pipeline.run(&snapshot)?;
    table.stats.elapsed_seconds = start.elapsed().as_secs_f64();

    write_csv(&table, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), rows = table.rows.len(), "wrote ranked table");

    if let Some(sqlite) = &args.sqlite {
        write_sqlite(&table, sqlite)
            .with_context(|| format!("Failed to write {}", sqlite.display()))?;
    }
    if let Some(stats) = &args.stats {
        write_stats(&table, stats)
            .with_context(|| format!("Failed to write {}", stats.display()))?;
    }

    print!("{}", format_summary(&table, args.top));
    println!("\nElapsed: {}", format_duration(start.elapsed()));

    Ok(())
}
