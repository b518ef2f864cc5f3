//! Gap reconciliation: decide per artist whether both, one or no readings are usable.

use crate::models::{
    ArtistReadings, ExclusionReason, Reading, ReconciledArtist, Resolution, Source,
};

/// Apply the gap policy to one artist's readings.
///
/// - both present: `Complete`
/// - one present: `Partial`, still scored with the missing term at zero
/// - none present: `Excluded`, kept in output with the reason for each source
pub fn resolve(readings: &ArtistReadings) -> Resolution {
    match (&readings.youtube, &readings.tiktok) {
        (Reading::Present(_), Reading::Present(_)) => Resolution::Complete,
        (Reading::Present(_), Reading::Missing(_)) => Resolution::Partial {
            missing: Source::Tiktok,
        },
        (Reading::Missing(_), Reading::Present(_)) => Resolution::Partial {
            missing: Source::Youtube,
        },
        (Reading::Missing(yt), Reading::Missing(tt)) => Resolution::Excluded(ExclusionReason {
            youtube: yt.clone(),
            tiktok: tt.clone(),
        }),
    }
}

pub fn reconcile(readings: ArtistReadings) -> ReconciledArtist {
    let resolution = resolve(&readings);
    ReconciledArtist {
        readings,
        resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::models::{ArtistKey, MissingReason, NormalizedMetric, Status, Unit};

    fn present(source: Source, value: f64) -> Reading {
        Reading::Present(NormalizedMetric {
            artist: ArtistKey::from_name("Olivia Rodrigo").unwrap(),
            source,
            value,
            unit: Unit::Count,
        })
    }

    fn readings(youtube: Reading, tiktok: Reading) -> ArtistReadings {
        ArtistReadings {
            artist: ArtistKey::from_name("Olivia Rodrigo").unwrap(),
            display_name: "Olivia Rodrigo".into(),
            youtube,
            tiktok,
        }
    }

    #[test]
    fn test_both_present_passes_through() {
        let r = readings(present(Source::Youtube, 10.0), present(Source::Tiktok, 3.0));
        let reconciled = reconcile(r.clone());
        assert_eq!(reconciled.resolution, Resolution::Complete);
        assert_eq!(reconciled.readings, r);
        assert_eq!(reconciled.resolution.status(), Status::Ok);
    }

    #[test]
    fn test_one_missing_is_partial() {
        let r = readings(
            present(Source::Youtube, 10.0),
            Reading::Missing(MissingReason::Unconfirmed),
        );
        assert_eq!(resolve(&r), Resolution::Partial { missing: Source::Tiktok });

        let r = readings(
            Reading::Missing(MissingReason::NoReading),
            present(Source::Tiktok, 0.0),
        );
        assert_eq!(resolve(&r), Resolution::Partial { missing: Source::Youtube });
        assert_eq!(resolve(&r).status(), Status::Partial);
    }

    #[test]
    fn test_both_missing_is_excluded_with_reasons() {
        let r = readings(
            Reading::Missing(MissingReason::Unparsable(ParseError::Empty)),
            Reading::Missing(MissingReason::Unconfirmed),
        );
        match resolve(&r) {
            Resolution::Excluded(reason) => {
                assert_eq!(reason.to_string(), "youtube=unparsable;tiktok=unconfirmed");
            }
            other => panic!("expected exclusion, got {:?}", other),
        }
    }
}
