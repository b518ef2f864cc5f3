//! Persistence and display of the ranked table.
//!
//! CSV is the primary output. Floats are written in shortest round-trip form,
//! so the same snapshot and weights always produce byte-identical files.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::ReportError;
use crate::models::{ParseIssue, RankedRow, RankedTable, RawValue, RunStats, Source};
use crate::progress::{create_spinner, finish_spinner};

pub const CSV_COLUMNS: [&str; 13] = [
    "rank",
    "artist_key",
    "artist",
    "youtube_count",
    "tiktok_count",
    "norm_youtube",
    "norm_tiktok",
    "youtube_contribution",
    "tiktok_contribution",
    "cpi",
    "score_100",
    "status",
    "exclusion_reason",
];

// ============================================================================
// CSV
// ============================================================================

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn float_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_row(row: &RankedRow) -> String {
    let fields = [
        row.rank.map(|r| r.to_string()).unwrap_or_default(),
        escape_field(row.artist_key.as_str()),
        escape_field(&row.artist),
        float_cell(row.youtube_count),
        float_cell(row.tiktok_count),
        float_cell(row.norm_youtube),
        float_cell(row.norm_tiktok),
        float_cell(row.youtube_contribution),
        float_cell(row.tiktok_contribution),
        float_cell(row.cpi),
        float_cell(row.score_100),
        row.status.to_string(),
        row.exclusion_reason.as_deref().map(escape_field).unwrap_or_default(),
    ];
    fields.join(",")
}

/// Render the whole table as CSV text (header + one line per artist)
pub fn to_csv(table: &RankedTable) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    for row in &table.rows {
        out.push_str(&csv_row(row));
        out.push('\n');
    }
    out
}

pub fn write_csv(table: &RankedTable, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, to_csv(table))?;
    Ok(())
}

// ============================================================================
// SQLite
// ============================================================================

/// Write the table into a fresh `ranked_artists` table, replacing any existing file.
pub fn write_sqlite(table: &RankedTable, path: &Path) -> Result<(), ReportError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let spinner = create_spinner("Writing SQLite output");
    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        CREATE TABLE ranked_artists (
            artist_key TEXT PRIMARY KEY,
            rank INTEGER,
            artist TEXT NOT NULL,
            youtube_count REAL,
            tiktok_count REAL,
            norm_youtube REAL,
            norm_tiktok REAL,
            youtube_contribution REAL,
            tiktok_contribution REAL,
            cpi REAL,
            score_100 REAL,
            status TEXT NOT NULL,
            exclusion_reason TEXT
        );",
    )?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO ranked_artists (artist_key, rank, artist, youtube_count, tiktok_count,
                norm_youtube, norm_tiktok, youtube_contribution, tiktok_contribution,
                cpi, score_100, status, exclusion_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for row in &table.rows {
            stmt.execute(params![
                row.artist_key.as_str(),
                row.rank.map(|r| r as i64),
                row.artist,
                row.youtube_count,
                row.tiktok_count,
                row.norm_youtube,
                row.norm_tiktok,
                row.youtube_contribution,
                row.tiktok_contribution,
                row.cpi,
                row.score_100,
                row.status.as_str(),
                row.exclusion_reason,
            ])?;
        }
    }
    tx.commit()?;

    finish_spinner(&spinner, format!("Wrote {} rows to SQLite", table.rows.len()));
    Ok(())
}

// ============================================================================
// Stats + Summary
// ============================================================================

#[derive(Serialize)]
struct ParseIssueEntry<'a> {
    artist: &'a str,
    source: Source,
    raw_value: &'a RawValue,
    error: &'static str,
    detail: String,
}

impl<'a> From<&'a ParseIssue> for ParseIssueEntry<'a> {
    fn from(issue: &'a ParseIssue) -> Self {
        Self {
            artist: issue.artist.as_str(),
            source: issue.source,
            raw_value: &issue.raw_value,
            error: issue.error.code(),
            detail: issue.error.to_string(),
        }
    }
}

#[derive(Serialize)]
struct StatsReport<'a> {
    #[serde(flatten)]
    stats: &'a RunStats,
    parse_issues: Vec<ParseIssueEntry<'a>>,
}

/// Write run stats as pretty JSON, with every unparsable reading listed
pub fn write_stats(table: &RankedTable, path: &Path) -> Result<(), ReportError> {
    let report = StatsReport {
        stats: &table.stats,
        parse_issues: table.parse_issues.iter().map(ParseIssueEntry::from).collect(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Human-readable summary: totals, top `top` ranked artists, excluded artists.
pub fn format_summary(table: &RankedTable, top: usize) -> String {
    let stats = &table.stats;
    let mut out = String::new();

    let _ = writeln!(out, "{:=<72}", "");
    let _ = writeln!(
        out,
        "Artists: {} ranked ({:.1}%: {} OK, {} partial), {} excluded",
        stats.artists_ok + stats.artists_partial,
        stats.ranked_rate(),
        stats.artists_ok,
        stats.artists_partial,
        stats.artists_excluded
    );
    let _ = writeln!(
        out,
        "Weights: youtube={} tiktok={}",
        stats.youtube_weight, stats.tiktok_weight
    );
    for source in Source::ALL {
        if let Some(range) = stats.range(source) {
            let _ = writeln!(out, "Range {}: {} .. {}", source, range.min, range.max);
        }
    }
    if stats.readings_unparsable > 0 || stats.records_rejected > 0 {
        let _ = writeln!(
            out,
            "Issues: {} unparsable readings, {} rejected records",
            stats.readings_unparsable, stats.records_rejected
        );
    }
    let _ = writeln!(out, "{:=<72}", "");

    let _ = writeln!(out, "\n--- Top {} Artists ---", top);
    let _ = writeln!(
        out,
        "{:>4}  {:<24} {:>8} {:>16} {:>14}  {}",
        "rank", "artist", "score", "youtube", "tiktok", "status"
    );
    for row in table.ranked().take(top) {
        let _ = writeln!(
            out,
            "{:>4}  {:<24} {:>8.2} {:>16} {:>14}  {}",
            row.rank.unwrap_or_default(),
            row.artist,
            row.score_100.unwrap_or_default(),
            float_cell(row.youtube_count),
            float_cell(row.tiktok_count),
            row.status
        );
    }

    let excluded: Vec<&RankedRow> = table.excluded().collect();
    if !excluded.is_empty() {
        let _ = writeln!(out, "\n--- Excluded ---");
        for row in excluded {
            let _ = writeln!(
                out,
                "  {} ({})",
                row.artist,
                row.exclusion_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    if !table.parse_issues.is_empty() {
        let _ = writeln!(out, "\n--- Unparsable Readings ---");
        for issue in &table.parse_issues {
            let _ = writeln!(
                out,
                "  {} {} {} ({})",
                issue.artist,
                issue.source,
                issue.raw_value,
                issue.error.code()
            );
        }
    }

    out
}
