//! Combined Popularity Index computation.
//!
//! Each source is min-max rescaled against the cohort before weighting, since
//! view counts and post counts differ by orders of magnitude.

use crate::config::Weights;
use crate::error::ConfigError;
use crate::models::{
    CompositeScore, Components, ReconciledArtist, Resolution, Source, SourceRange,
};

// ============================================================================
// Cohort Rescaling
// ============================================================================

/// Min and max of the present values for one source, or None if no artist has one.
pub fn cohort_range(artists: &[ReconciledArtist], source: Source) -> Option<SourceRange> {
    artists
        .iter()
        .filter_map(|a| a.readings.get(source).value())
        .fold(None, |range: Option<SourceRange>, v| {
            Some(match range {
                None => SourceRange { min: v, max: v },
                Some(r) => SourceRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            })
        })
}

/// Rescale a value into [0, 1] against the cohort range.
/// A constant source (max == min) carries no ranking signal and maps to 0.0.
pub fn min_max(value: f64, range: SourceRange) -> f64 {
    let span = range.max - range.min;
    if span > 0.0 {
        ((value - range.min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// CPI on a 0-100 scale rounded to two decimals, for display
pub fn score_100(cpi: f64) -> f64 {
    (cpi * 10_000.0).round() / 100.0
}

// ============================================================================
// Composite Scoring
// ============================================================================

/// Cohort ranges used for one scoring pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CohortRanges {
    pub youtube: Option<SourceRange>,
    pub tiktok: Option<SourceRange>,
}

impl CohortRanges {
    pub fn from_cohort(artists: &[ReconciledArtist]) -> Self {
        Self {
            youtube: cohort_range(artists, Source::Youtube),
            tiktok: cohort_range(artists, Source::Tiktok),
        }
    }

    pub fn get(&self, source: Source) -> Option<SourceRange> {
        match source {
            Source::Youtube => self.youtube,
            Source::Tiktok => self.tiktok,
        }
    }
}

/// Normalized value of one source for one artist, None when the reading is missing
fn normalized(artist: &ReconciledArtist, source: Source, ranges: &CohortRanges) -> Option<f64> {
    let value = artist.readings.get(source).value()?;
    ranges.get(source).map(|range| min_max(value, range))
}

/// Compute one CompositeScore per non-excluded artist.
///
/// Needs the whole cohort: min-max ranges are taken over every present value.
/// Partial artists get zero for the missing term and the weights are not
/// renormalized. Output is ordered by ArtistKey and the two weighted terms
/// are always summed youtube first, so results are exactly reproducible.
pub fn compute_scores(
    artists: &[ReconciledArtist],
    weights: &Weights,
) -> Result<(Vec<CompositeScore>, CohortRanges), ConfigError> {
    weights.validate()?;

    let ranges = CohortRanges::from_cohort(artists);

    let mut ordered: Vec<&ReconciledArtist> = artists.iter().collect();
    ordered.sort_by(|a, b| a.readings.artist.cmp(&b.readings.artist));

    let scores = ordered
        .into_iter()
        .filter(|a| !matches!(a.resolution, Resolution::Excluded(_)))
        .map(|a| {
            let norm_youtube = normalized(a, Source::Youtube, &ranges);
            let norm_tiktok = normalized(a, Source::Tiktok, &ranges);

            let components = Components {
                youtube_contribution: weights.youtube * norm_youtube.unwrap_or(0.0),
                tiktok_contribution: weights.tiktok * norm_tiktok.unwrap_or(0.0),
            };
            let cpi = components.youtube_contribution + components.tiktok_contribution;

            CompositeScore {
                artist: a.readings.artist.clone(),
                cpi,
                norm_youtube,
                norm_tiktok,
                components,
                status: a.resolution.status(),
                rank: None,
            }
        })
        .collect();

    Ok((scores, ranges))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ArtistKey, ArtistReadings, MissingReason, NormalizedMetric, Reading, Status, Unit,
    };
    use crate::reconcile::reconcile;

    fn reading(name: &str, source: Source, value: Option<f64>) -> Reading {
        match value {
            Some(v) => Reading::Present(NormalizedMetric {
                artist: ArtistKey::from_name(name).unwrap(),
                source,
                value: v,
                unit: Unit::Count,
            }),
            None => Reading::Missing(MissingReason::NoReading),
        }
    }

    fn artist(name: &str, yt: Option<f64>, tt: Option<f64>) -> ReconciledArtist {
        reconcile(ArtistReadings {
            artist: ArtistKey::from_name(name).unwrap(),
            display_name: name.to_string(),
            youtube: reading(name, Source::Youtube, yt),
            tiktok: reading(name, Source::Tiktok, tt),
        })
    }

    fn score<'a>(scores: &'a [CompositeScore], key: &str) -> &'a CompositeScore {
        scores.iter().find(|s| s.artist.as_str() == key).unwrap()
    }

    #[test]
    fn test_min_max_bounds() {
        let range = SourceRange { min: 5.0, max: 25.0 };
        assert_eq!(min_max(5.0, range), 0.0);
        assert_eq!(min_max(25.0, range), 1.0);
        assert_eq!(min_max(15.0, range), 0.5);
    }

    #[test]
    fn test_min_max_constant_source() {
        let range = SourceRange { min: 7.0, max: 7.0 };
        assert_eq!(min_max(7.0, range), 0.0);
    }

    #[test]
    fn test_cohort_range_ignores_missing() {
        let cohort = vec![
            artist("A", Some(10.0), None),
            artist("B", Some(2.0), Some(4.0)),
            artist("C", None, None),
        ];
        assert_eq!(
            cohort_range(&cohort, Source::Youtube),
            Some(SourceRange { min: 2.0, max: 10.0 })
        );
        assert_eq!(
            cohort_range(&cohort, Source::Tiktok),
            Some(SourceRange { min: 4.0, max: 4.0 })
        );
        assert_eq!(cohort_range(&[artist("D", None, None)], Source::Tiktok), None);
    }

    #[test]
    fn test_crossed_metrics_tie() {
        let cohort = vec![artist("A", Some(10.0), Some(5.0)), artist("B", Some(5.0), Some(10.0))];
        let (scores, _) = compute_scores(&cohort, &Weights::default()).unwrap();

        let a = score(&scores, "a");
        assert_eq!(a.norm_youtube, Some(1.0));
        assert_eq!(a.norm_tiktok, Some(0.0));
        assert_eq!(a.cpi, 0.5);

        let b = score(&scores, "b");
        assert_eq!(b.norm_youtube, Some(0.0));
        assert_eq!(b.norm_tiktok, Some(1.0));
        assert_eq!(b.cpi, 0.5);
    }

    #[test]
    fn test_partial_not_renormalized() {
        let cohort = vec![
            artist("Full", Some(10.0), Some(10.0)),
            artist("Low", Some(0.0), Some(0.0)),
            artist("Half", Some(10.0), None),
        ];
        let (scores, _) = compute_scores(&cohort, &Weights::default()).unwrap();
        let half = score(&scores, "half");
        assert_eq!(half.status, Status::Partial);
        assert_eq!(half.norm_tiktok, None);
        assert_eq!(half.components.tiktok_contribution, 0.0);
        assert_eq!(half.cpi, 0.5);
        assert_eq!(score(&scores, "full").cpi, 1.0);
    }

    #[test]
    fn test_excluded_artists_not_scored() {
        let cohort = vec![artist("A", Some(1.0), Some(1.0)), artist("Gone", None, None)];
        let (scores, _) = compute_scores(&cohort, &Weights::default()).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].artist.as_str(), "a");
    }

    #[test]
    fn test_custom_weights() {
        let cohort = vec![artist("A", Some(10.0), Some(0.0)), artist("B", Some(0.0), Some(10.0))];
        let (scores, _) = compute_scores(&cohort, &Weights::new(0.55, 0.45)).unwrap();
        assert_eq!(score(&scores, "a").cpi, 0.55);
        assert_eq!(score(&scores, "b").cpi, 0.45);
    }

    #[test]
    fn test_zero_weights_fail_before_scoring() {
        let cohort = vec![artist("A", Some(1.0), Some(1.0))];
        assert_eq!(
            compute_scores(&cohort, &Weights::new(0.0, 0.0)).unwrap_err(),
            ConfigError::ZeroWeights
        );
    }

    #[test]
    fn test_scores_ordered_by_key() {
        let cohort = vec![
            artist("Zed", Some(1.0), Some(1.0)),
            artist("Amy", Some(2.0), Some(2.0)),
            artist("Moe", Some(3.0), Some(3.0)),
        ];
        let (scores, _) = compute_scores(&cohort, &Weights::default()).unwrap();
        let keys: Vec<&str> = scores.iter().map(|s| s.artist.as_str()).collect();
        assert_eq!(keys, vec!["amy", "moe", "zed"]);
    }

    #[test]
    fn test_score_100() {
        assert_eq!(score_100(0.5), 50.0);
        assert_eq!(score_100(0.123456), 12.35);
        assert_eq!(score_100(1.0), 100.0);
    }
}
