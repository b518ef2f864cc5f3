//! Core data models for the CPI pipeline.
//!
//! This module contains the struct definitions and enums that flow through
//! intake, normalization, reconciliation, scoring and ranking.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ParseError;
use crate::normalize::artist_slug;

// ============================================================================
// Identity
// ============================================================================

/// Stable artist identifier: the canonical slug of the display name.
/// Ordering is plain string ordering and is used as the ranking tie-break.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ArtistKey(String);

impl ArtistKey {
    /// Build a key from a display name. Returns None when nothing usable remains.
    pub fn from_name(name: &str) -> Option<Self> {
        let slug = artist_slug(name);
        if slug.is_empty() {
            None
        } else {
            Some(ArtistKey(slug))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measurement source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(alias = "YOUTUBE", alias = "YouTube")]
    Youtube,
    #[serde(alias = "TIKTOK", alias = "TikTok")]
    Tiktok,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Youtube, Source::Tiktok];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Youtube => "youtube",
            Source::Tiktok => "tiktok",
        }
    }

    /// Whether a reading needs the manual-assist confirmation to be trusted
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Source::Tiktok)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw Models (collector -> pipeline)
// ============================================================================

/// Raw value as handed over by the collector: a number or a display string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Wire form of one raw measurement, as found in a snapshot file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    pub artist: String,
    pub source: Source,
    #[serde(default)]
    pub raw_value: Option<RawValue>,
    #[serde(deserialize_with = "deserialize_collected_at")]
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
}

/// Collector file-name style timestamp, read as UTC
pub const COLLECTOR_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Accepts RFC 3339 or the collector's `20251102_120000` form.
fn deserialize_collected_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&text, COLLECTOR_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| serde::de::Error::custom(format!("invalid collected_at timestamp {text:?}")))
}

/// One source's reading for one artist, after intake validation.
/// Never mutated; a retry produces a new record that replaces this one.
#[derive(Clone, Debug, PartialEq)]
pub struct RawMeasurement {
    pub artist: ArtistKey,
    pub source: Source,
    pub raw_value: Option<RawValue>,
    pub collected_at: DateTime<Utc>,
    pub confirmed: bool,
}

// ============================================================================
// Normalized Models
// ============================================================================

/// Canonical unit of every normalized metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    Count,
}

/// Present metric derived from exactly one RawMeasurement. `value >= 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedMetric {
    pub artist: ArtistKey,
    pub source: Source,
    pub value: f64,
    pub unit: Unit,
}

/// Why a metric is missing. Absence is never encoded as zero.
#[derive(Clone, Debug, PartialEq)]
pub enum MissingReason {
    /// No record for the source, or the raw value was null
    NoReading,
    /// Manual-assist step was not completed
    Unconfirmed,
    Unparsable(ParseError),
}

impl MissingReason {
    pub fn code(&self) -> &'static str {
        match self {
            MissingReason::NoReading => "no_reading",
            MissingReason::Unconfirmed => "unconfirmed",
            MissingReason::Unparsable(_) => "unparsable",
        }
    }
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Normalizer output for one (artist, source) pair.
#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    Present(NormalizedMetric),
    Missing(MissingReason),
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Present(m) => Some(m.value),
            Reading::Missing(_) => None,
        }
    }

    pub fn missing_reason(&self) -> Option<&MissingReason> {
        match self {
            Reading::Present(_) => None,
            Reading::Missing(r) => Some(r),
        }
    }
}

/// Both readings for one artist, ready for reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtistReadings {
    pub artist: ArtistKey,
    pub display_name: String,
    pub youtube: Reading,
    pub tiktok: Reading,
}

impl ArtistReadings {
    pub fn get(&self, source: Source) -> &Reading {
        match source {
            Source::Youtube => &self.youtube,
            Source::Tiktok => &self.tiktok,
        }
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Output status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Partial,
    Excluded,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Partial => "PARTIAL",
            Status::Excluded => "EXCLUDED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both sources missing, with the reason for each.
#[derive(Clone, Debug, PartialEq)]
pub struct ExclusionReason {
    pub youtube: MissingReason,
    pub tiktok: MissingReason,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "youtube={};tiktok={}", self.youtube, self.tiktok)
    }
}

/// Gap policy decision for one artist.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Complete,
    Partial { missing: Source },
    Excluded(ExclusionReason),
}

impl Resolution {
    pub fn status(&self) -> Status {
        match self {
            Resolution::Complete => Status::Ok,
            Resolution::Partial { .. } => Status::Partial,
            Resolution::Excluded(_) => Status::Excluded,
        }
    }
}

/// Readings plus the reconciler decision.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciledArtist {
    pub readings: ArtistReadings,
    pub resolution: Resolution,
}

// ============================================================================
// Scoring Models
// ============================================================================

/// Weighted per-source terms of a CPI.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Components {
    pub youtube_contribution: f64,
    pub tiktok_contribution: f64,
}

/// Composite score for one non-excluded artist. `rank` is set by the ranker.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeScore {
    pub artist: ArtistKey,
    pub cpi: f64,
    pub norm_youtube: Option<f64>,
    pub norm_tiktok: Option<f64>,
    pub components: Components,
    pub status: Status,
    pub rank: Option<usize>,
}

/// Cohort min/max of present values for one source
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SourceRange {
    pub min: f64,
    pub max: f64,
}

// ============================================================================
// Output Models
// ============================================================================

/// One row of the ranked table.
///
/// Ranked rows carry `rank`, `cpi` and the per-source breakdown. Excluded rows
/// carry `rank = None`, `cpi = None` and an `exclusion_reason`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedRow {
    pub rank: Option<usize>,
    pub artist_key: ArtistKey,
    pub artist: String,
    pub youtube_count: Option<f64>,
    pub tiktok_count: Option<f64>,
    pub norm_youtube: Option<f64>,
    pub norm_tiktok: Option<f64>,
    pub youtube_contribution: Option<f64>,
    pub tiktok_contribution: Option<f64>,
    pub cpi: Option<f64>,
    pub score_100: Option<f64>,
    pub status: Status,
    pub exclusion_reason: Option<String>,
}

/// A recorded, non-fatal parse failure
#[derive(Clone, Debug, PartialEq)]
pub struct ParseIssue {
    pub artist: ArtistKey,
    pub source: Source,
    pub raw_value: RawValue,
    pub error: ParseError,
}

/// Full pipeline output: ranked rows in rank order, then excluded rows by key.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedTable {
    pub rows: Vec<RankedRow>,
    pub stats: RunStats,
    pub parse_issues: Vec<ParseIssue>,
}

impl RankedTable {
    pub fn ranked(&self) -> impl Iterator<Item = &RankedRow> {
        self.rows.iter().filter(|r| r.rank.is_some())
    }

    pub fn excluded(&self) -> impl Iterator<Item = &RankedRow> {
        self.rows.iter().filter(|r| r.status == Status::Excluded)
    }

    pub fn ranked_count(&self) -> usize {
        self.ranked().count()
    }

    pub fn row(&self, key: &str) -> Option<&RankedRow> {
        self.rows.iter().find(|r| r.artist_key.as_str() == key)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counts for instrumentation.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    // Intake
    pub records_read: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    pub records_superseded: usize,

    // Normalization
    pub readings_present: usize,
    pub readings_no_reading: usize,
    pub readings_unconfirmed: usize,
    pub readings_unparsable: usize,

    // Reconciliation
    pub artists_total: usize,
    pub artists_ok: usize,
    pub artists_partial: usize,
    pub artists_excluded: usize,

    // Cohort ranges
    pub youtube_range: Option<SourceRange>,
    pub tiktok_range: Option<SourceRange>,

    // Weights used
    pub youtube_weight: f64,
    pub tiktok_weight: f64,

    // Timing (not part of the ranked table)
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Share of the roster that received a rank, as a percentage
    pub fn ranked_rate(&self) -> f64 {
        if self.artists_total == 0 {
            0.0
        } else {
            100.0 * (self.artists_ok + self.artists_partial) as f64 / self.artists_total as f64
        }
    }

    /// Record one normalizer outcome
    pub fn record_reading(&mut self, reading: &Reading) {
        match reading {
            Reading::Present(_) => self.readings_present += 1,
            Reading::Missing(MissingReason::NoReading) => self.readings_no_reading += 1,
            Reading::Missing(MissingReason::Unconfirmed) => self.readings_unconfirmed += 1,
            Reading::Missing(MissingReason::Unparsable(_)) => self.readings_unparsable += 1,
        }
    }

    /// Record one reconciler decision
    pub fn record_status(&mut self, status: Status) {
        self.artists_total += 1;
        match status {
            Status::Ok => self.artists_ok += 1,
            Status::Partial => self.artists_partial += 1,
            Status::Excluded => self.artists_excluded += 1,
        }
    }

    pub fn range(&self, source: Source) -> Option<SourceRange> {
        match source {
            Source::Youtube => self.youtube_range,
            Source::Tiktok => self.tiktok_range,
        }
    }
}
