//! Raw measurement intake.
//!
//! Loads the collector's snapshot, validates record shape, matches records to
//! the roster and resolves retries so that each (artist, source) pair has at
//! most one measurement.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::RosterArtist;
use crate::error::{Error, IntakeError, Result};
use crate::models::{ArtistKey, RawMeasurement, RawRecord, Source};

/// File name prefix of timestamped snapshots inside a snapshot directory
pub const SNAPSHOT_PREFIX: &str = "measurements_";

/// Minimum similarity for suggesting a roster entry in warnings
const CLOSEST_MATCH_THRESHOLD: f64 = 0.8;

// ============================================================================
// Snapshot Loading
// ============================================================================

/// Find the most recent `measurements_*.json` in a directory.
/// Names embed a sortable timestamp, so the greatest name is the newest.
pub fn latest_snapshot_file(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    candidates.sort();
    candidates.pop().ok_or_else(|| {
        Error::Snapshot(format!(
            "no {}*.json snapshot found in {}",
            SNAPSHOT_PREFIX,
            dir.display()
        ))
    })
}

/// Resolve a snapshot argument: a file is used as is, a directory yields its newest snapshot.
pub fn resolve_snapshot_path(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        let latest = latest_snapshot_file(path)?;
        info!(path = %latest.display(), "using most recent snapshot");
        Ok(latest)
    } else {
        Ok(path.to_path_buf())
    }
}

/// One element of the snapshot array: a decoded record, or why it could not be decoded
pub type RecordEntry = std::result::Result<RawRecord, String>;

/// Read the raw records of a snapshot file (JSON array).
///
/// Only a file that is not a JSON array fails the load. Each element is decoded
/// on its own so one malformed record cannot take the others down with it.
pub fn load_records(path: &Path) -> Result<Vec<RecordEntry>> {
    let content = std::fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    let entries: Vec<RecordEntry> = values
        .into_iter()
        .map(|value| serde_json::from_value::<RawRecord>(value).map_err(|e| e.to_string()))
        .collect();
    debug!(path = %path.display(), count = entries.len(), "loaded raw records");
    Ok(entries)
}

// ============================================================================
// Snapshot
// ============================================================================

/// Validated, immutable view of one collection run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Every artist in the cohort, sorted by key
    pub artists: Vec<RosterArtist>,
    measurements: FxHashMap<(ArtistKey, Source), RawMeasurement>,
    pub issues: Vec<IntakeError>,
    pub records_read: usize,
    pub records_superseded: usize,
}

impl Snapshot {
    /// Build a snapshot from raw records.
    ///
    /// With an empty roster the cohort is every artist present in the records.
    /// Otherwise records for artists outside the roster are rejected, and roster
    /// artists without records stay in the cohort with no measurements.
    pub fn build(records: Vec<RawRecord>, roster: &[RosterArtist]) -> Self {
        Self::from_entries(records.into_iter().map(Ok).collect(), roster)
    }

    /// Like [`Snapshot::build`], but undecodable entries are rejected as malformed.
    pub fn from_entries(records: Vec<RecordEntry>, roster: &[RosterArtist]) -> Self {
        let mut snapshot = Snapshot {
            records_read: records.len(),
            ..Default::default()
        };

        let mut names: FxHashMap<ArtistKey, String> = roster
            .iter()
            .map(|r| (r.key.clone(), r.name.clone()))
            .collect();
        let roster_fixed = !roster.is_empty();

        for (index, entry) in records.into_iter().enumerate() {
            let record = match entry {
                Ok(record) => record,
                Err(message) => {
                    snapshot.reject(IntakeError::Malformed { index, message });
                    continue;
                }
            };
            let name = record.artist.trim();
            if name.is_empty() {
                snapshot.reject(IntakeError::EmptyArtist { index });
                continue;
            }
            let Some(key) = ArtistKey::from_name(name) else {
                snapshot.reject(IntakeError::EmptyKey {
                    index,
                    name: name.to_string(),
                });
                continue;
            };

            if roster_fixed && !names.contains_key(&key) {
                snapshot.reject(IntakeError::NotInRoster {
                    index,
                    name: name.to_string(),
                    closest: closest_roster_name(&key, roster),
                });
                continue;
            }
            names.entry(key.clone()).or_insert_with(|| name.to_string());

            let confirmed = record
                .confirmed
                .unwrap_or(!record.source.requires_confirmation());
            let measurement = RawMeasurement {
                artist: key.clone(),
                source: record.source,
                raw_value: record.raw_value,
                collected_at: record.collected_at,
                confirmed,
            };
            snapshot.insert(measurement);
        }

        let mut artists: Vec<RosterArtist> = names
            .into_iter()
            .map(|(key, name)| RosterArtist { key, name })
            .collect();
        artists.sort_by(|a, b| a.key.cmp(&b.key));
        snapshot.artists = artists;
        snapshot
    }

    fn reject(&mut self, issue: IntakeError) {
        warn!(%issue, "rejected raw record");
        self.issues.push(issue);
    }

    /// Insert a measurement; a retry replaces the earlier record.
    fn insert(&mut self, measurement: RawMeasurement) {
        let slot = (measurement.artist.clone(), measurement.source);
        match self.measurements.get(&slot) {
            Some(existing) if existing.collected_at > measurement.collected_at => {
                debug!(
                    artist = %measurement.artist,
                    source = %measurement.source,
                    "older retry discarded"
                );
                self.records_superseded += 1;
            }
            Some(_) => {
                debug!(
                    artist = %measurement.artist,
                    source = %measurement.source,
                    "measurement superseded by retry"
                );
                self.records_superseded += 1;
                self.measurements.insert(slot, measurement);
            }
            None => {
                self.measurements.insert(slot, measurement);
            }
        }
    }

    pub fn measurement(&self, artist: &ArtistKey, source: Source) -> Option<&RawMeasurement> {
        self.measurements.get(&(artist.clone(), source))
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn records_rejected(&self) -> usize {
        self.issues.len()
    }
}

/// Closest roster display name for an unknown key, if any is similar enough
fn closest_roster_name(key: &ArtistKey, roster: &[RosterArtist]) -> Option<String> {
    roster
        .iter()
        .map(|r| (strsim::jaro_winkler(key.as_str(), r.key.as_str()), r))
        .filter(|(score, _)| *score >= CLOSEST_MATCH_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.key.cmp(&a.1.key)))
        .map(|(_, r)| r.name.clone())
}
