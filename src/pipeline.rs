//! The CPI pipeline: intake → normalize → reconcile → (barrier) → score → rank.
//!
//! Normalization and reconciliation are per artist and run on the rayon pool.
//! Scoring needs the full cohort, so it starts only once every artist has been
//! reconciled. Nothing after that point runs in parallel.

use rayon::prelude::*;
use tracing::info;

use crate::config::{PipelineConfig, RosterArtist, Weights};
use crate::error::{ConfigError, Result};
use crate::intake::{load_records, resolve_snapshot_path, Snapshot};
use crate::models::{
    ArtistReadings, CompositeScore, MissingReason, ParseIssue, RankedRow, RankedTable,
    Reading, ReconciledArtist, Resolution, RunStats, Source, Status,
};
use crate::normalize::normalize_measurement;
use crate::progress::create_progress_bar;
use crate::rank::assign_ranks;
use crate::reconcile::reconcile;
use crate::scoring::{compute_scores, score_100};
use std::path::Path;

/// Validated pipeline. Construction fails with a ConfigError on bad weights or roster.
#[derive(Debug, Clone)]
pub struct Pipeline {
    weights: Weights,
    roster: Vec<RosterArtist>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        let roster = config.validate()?;
        Ok(Self {
            weights: config.weights,
            roster,
        })
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    pub fn roster(&self) -> &[RosterArtist] {
        &self.roster
    }

    /// Load a snapshot file (or newest snapshot in a directory) against the configured roster.
    pub fn load_snapshot(&self, path: &Path) -> Result<Snapshot> {
        let path = resolve_snapshot_path(path)?;
        let records = load_records(&path)?;
        Ok(Snapshot::from_entries(records, &self.roster))
    }

    /// Run the pipeline over one immutable snapshot.
    pub fn run(&self, snapshot: &Snapshot) -> Result<RankedTable> {
        let mut stats = RunStats {
            records_read: snapshot.records_read,
            records_accepted: snapshot.records_read - snapshot.records_rejected(),
            records_rejected: snapshot.records_rejected(),
            records_superseded: snapshot.records_superseded,
            youtube_weight: self.weights.youtube,
            tiktok_weight: self.weights.tiktok,
            ..Default::default()
        };

        // Per-artist stage
        let pb = create_progress_bar(snapshot.artists.len() as u64, "Normalizing readings");
        let reconciled: Vec<ReconciledArtist> = snapshot
            .artists
            .par_iter()
            .map(|artist| {
                let result = reconcile(read_artist(snapshot, artist));
                pb.inc(1);
                result
            })
            .collect();
        pb.finish_with_message(format!("Normalized {} artists", reconciled.len()));

        // Barrier: the cohort is complete from here on
        let mut parse_issues = Vec::new();
        for artist in &reconciled {
            for source in Source::ALL {
                let reading = artist.readings.get(source);
                stats.record_reading(reading);
                if let Some(MissingReason::Unparsable(error)) = reading.missing_reason() {
                    if let Some(raw_value) = snapshot
                        .measurement(&artist.readings.artist, source)
                        .and_then(|m| m.raw_value.clone())
                    {
                        parse_issues.push(ParseIssue {
                            artist: artist.readings.artist.clone(),
                            source,
                            raw_value,
                            error: error.clone(),
                        });
                    }
                }
            }
            stats.record_status(artist.resolution.status());
        }

        let (scores, ranges) = compute_scores(&reconciled, &self.weights)?;
        stats.youtube_range = ranges.youtube;
        stats.tiktok_range = ranges.tiktok;

        let ranked = assign_ranks(scores);
        let rows = build_rows(&reconciled, &ranked);

        info!(
            artists = stats.artists_total,
            ok = stats.artists_ok,
            partial = stats.artists_partial,
            excluded = stats.artists_excluded,
            parse_failures = parse_issues.len(),
            "pipeline run complete"
        );

        Ok(RankedTable {
            rows,
            stats,
            parse_issues,
        })
    }
}

/// Normalize both sources for one artist. A source without a record is a NoReading gap.
fn read_artist(snapshot: &Snapshot, artist: &RosterArtist) -> ArtistReadings {
    let read = |source: Source| {
        snapshot
            .measurement(&artist.key, source)
            .map(normalize_measurement)
            .unwrap_or(Reading::Missing(MissingReason::NoReading))
    };
    ArtistReadings {
        artist: artist.key.clone(),
        display_name: artist.name.clone(),
        youtube: read(Source::Youtube),
        tiktok: read(Source::Tiktok),
    }
}

/// Ranked rows in rank order, then excluded rows in key order.
fn build_rows(reconciled: &[ReconciledArtist], ranked: &[CompositeScore]) -> Vec<RankedRow> {
    let mut rows: Vec<RankedRow> = Vec::with_capacity(reconciled.len());

    for score in ranked {
        let Some(artist) = reconciled
            .iter()
            .find(|a| a.readings.artist == score.artist)
        else {
            continue;
        };
        rows.push(RankedRow {
            rank: score.rank,
            artist_key: score.artist.clone(),
            artist: artist.readings.display_name.clone(),
            youtube_count: artist.readings.youtube.value(),
            tiktok_count: artist.readings.tiktok.value(),
            norm_youtube: score.norm_youtube,
            norm_tiktok: score.norm_tiktok,
            youtube_contribution: Some(score.components.youtube_contribution),
            tiktok_contribution: Some(score.components.tiktok_contribution),
            cpi: Some(score.cpi),
            score_100: Some(score_100(score.cpi)),
            status: score.status,
            exclusion_reason: None,
        });
    }

    let mut excluded: Vec<&ReconciledArtist> = reconciled
        .iter()
        .filter(|a| a.resolution.status() == Status::Excluded)
        .collect();
    excluded.sort_by(|a, b| a.readings.artist.cmp(&b.readings.artist));

    for artist in excluded {
        let reason = match &artist.resolution {
            Resolution::Excluded(reason) => Some(reason.to_string()),
            _ => None,
        };
        rows.push(RankedRow {
            rank: None,
            artist_key: artist.readings.artist.clone(),
            artist: artist.readings.display_name.clone(),
            youtube_count: None,
            tiktok_count: None,
            norm_youtube: None,
            norm_tiktok: None,
            youtube_contribution: None,
            tiktok_contribution: None,
            cpi: None,
            score_100: None,
            status: Status::Excluded,
            exclusion_reason: reason,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RosterEntry;
    use crate::error::Error;
    use crate::models::{RawRecord, RawValue};
    use chrono::{TimeZone, Utc};

    fn record(artist: &str, source: Source, raw: Option<RawValue>, confirmed: Option<bool>) -> RawRecord {
        RawRecord {
            artist: artist.to_string(),
            source,
            raw_value: raw,
            collected_at: Utc.with_ymd_and_hms(2025, 11, 2, 12, 0, 0).unwrap(),
            confirmed,
        }
    }

    fn num(v: f64) -> Option<RawValue> {
        Some(RawValue::Number(v))
    }

    fn text(s: &str) -> Option<RawValue> {
        Some(RawValue::Text(s.to_string()))
    }

    #[test]
    fn test_crossed_metrics_example() {
        let pipeline = Pipeline::new(&PipelineConfig::default()).unwrap();
        let snapshot = Snapshot::build(
            vec![
                record("B", Source::Youtube, num(5.0), None),
                record("B", Source::Tiktok, num(10.0), Some(true)),
                record("A", Source::Youtube, num(10.0), None),
                record("A", Source::Tiktok, num(5.0), Some(true)),
            ],
            &[],
        );
        let table = pipeline.run(&snapshot).unwrap();
        let a = table.row("a").unwrap();
        let b = table.row("b").unwrap();
        assert_eq!(a.cpi, Some(0.5));
        assert_eq!(b.cpi, Some(0.5));
        assert_eq!(a.rank, Some(1));
        assert_eq!(b.rank, Some(2));
        assert_eq!(table.rows[0].artist_key.as_str(), "a");
    }

    #[test]
    fn test_every_roster_artist_in_output() {
        let config = PipelineConfig {
            weights: Weights::default(),
            roster: vec![
                RosterEntry { name: "Drake".into() },
                RosterEntry { name: "Adele".into() },
                RosterEntry { name: "SZA".into() },
            ],
        };
        let pipeline = Pipeline::new(&config).unwrap();
        let snapshot = Snapshot::build(
            vec![
                record("Drake", Source::Youtube, text("25.4M"), None),
                record("Drake", Source::Tiktok, text("10M"), Some(false)),
                record("SZA", Source::Youtube, text("12M"), None),
                record("SZA", Source::Tiktok, text("800K posts"), Some(true)),
            ],
            pipeline.roster(),
        );
        let table = pipeline.run(&snapshot).unwrap();

        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.ranked_count(), 2);

        let drake = table.row("drake").unwrap();
        assert_eq!(drake.status, Status::Partial);
        assert_eq!(drake.youtube_count, Some(25_400_000.0));
        assert_eq!(drake.tiktok_count, None);

        let adele = table.row("adele").unwrap();
        assert_eq!(adele.status, Status::Excluded);
        assert_eq!(adele.rank, None);
        assert_eq!(adele.cpi, None);
        assert_eq!(
            adele.exclusion_reason.as_deref(),
            Some("youtube=no_reading;tiktok=no_reading")
        );
        // Excluded rows come after ranked rows
        assert_eq!(table.rows.last().unwrap().artist_key.as_str(), "adele");

        assert_eq!(table.stats.artists_partial, 1);
        assert_eq!(table.stats.artists_excluded, 1);
        assert_eq!(table.stats.readings_unconfirmed, 1);
        assert_eq!(table.stats.readings_no_reading, 2);
    }

    #[test]
    fn test_parse_failures_recorded_not_fatal() {
        let pipeline = Pipeline::new(&PipelineConfig::default()).unwrap();
        let snapshot = Snapshot::build(
            vec![
                record("Drake", Source::Youtube, text("n/a"), None),
                record("Drake", Source::Tiktok, text("1M"), Some(true)),
                record("Adele", Source::Youtube, num(3.0), None),
                record("Adele", Source::Tiktok, text("2M"), Some(true)),
            ],
            &[],
        );
        let table = pipeline.run(&snapshot).unwrap();
        assert_eq!(table.parse_issues.len(), 1);
        assert_eq!(table.parse_issues[0].artist.as_str(), "drake");
        assert_eq!(table.parse_issues[0].source, Source::Youtube);
        assert_eq!(table.stats.readings_unparsable, 1);
        assert_eq!(table.row("drake").unwrap().status, Status::Partial);
        assert_eq!(table.ranked_count(), 2);
    }

    #[test]
    fn test_zero_weights_rejected_at_construction() {
        let config = PipelineConfig::with_weights(Weights::new(0.0, 0.0));
        assert_eq!(Pipeline::new(&config).unwrap_err(), ConfigError::ZeroWeights);
    }

    #[test]
    fn test_all_excluded_cohort() {
        let pipeline = Pipeline::new(&PipelineConfig::default()).unwrap();
        let snapshot = Snapshot::build(
            vec![record("Adele", Source::Tiktok, text("9M"), Some(false))],
            &[],
        );
        let table = pipeline.run(&snapshot).unwrap();
        assert_eq!(table.ranked_count(), 0);
        assert_eq!(table.excluded().count(), 1);
        assert_eq!(table.stats.youtube_range, None);
    }

    #[test]
    fn test_rerun_is_identical() {
        let pipeline = Pipeline::new(&PipelineConfig::default()).unwrap();
        let records = vec![
            record("Bad Bunny", Source::Youtube, text("41.2B"), None),
            record("Bad Bunny", Source::Tiktok, text("5.6M"), Some(true)),
            record("Billie Eilish", Source::Youtube, num(19_000_000_000.0), None),
            record("Billie Eilish", Source::Tiktok, text("3.3M"), Some(true)),
            record("Doja Cat", Source::Youtube, text("6.1B"), None),
        ];
        let first = pipeline.run(&Snapshot::build(records.clone(), &[])).unwrap();
        let second = pipeline.run(&Snapshot::build(records, &[])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_error_type_for_bad_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measurements_bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let pipeline = Pipeline::new(&PipelineConfig::default()).unwrap();
        assert!(matches!(pipeline.load_snapshot(&path), Err(Error::Json(_))));
    }
}
