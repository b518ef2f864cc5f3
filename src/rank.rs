//! Ranking of composite scores.

use std::cmp::Ordering;

use crate::models::CompositeScore;

/// Ranking order: CPI descending, then ArtistKey ascending.
/// `total_cmp` keeps the order total even for pathological floats.
pub fn ranking_order(a: &CompositeScore, b: &CompositeScore) -> Ordering {
    b.cpi
        .total_cmp(&a.cpi)
        .then_with(|| a.artist.cmp(&b.artist))
}

/// Sort scores into ranking order and assign ranks 1..=N without gaps.
/// Tied CPIs still receive distinct ranks, ordered by ArtistKey.
pub fn assign_ranks(mut scores: Vec<CompositeScore>) -> Vec<CompositeScore> {
    scores.sort_by(ranking_order);
    for (position, score) in scores.iter_mut().enumerate() {
        score.rank = Some(position + 1);
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistKey, Components, Status};

    fn score(name: &str, cpi: f64) -> CompositeScore {
        CompositeScore {
            artist: ArtistKey::from_name(name).unwrap(),
            cpi,
            norm_youtube: None,
            norm_tiktok: None,
            components: Components {
                youtube_contribution: cpi,
                tiktok_contribution: 0.0,
            },
            status: Status::Ok,
            rank: None,
        }
    }

    fn ranked_keys(scores: &[CompositeScore]) -> Vec<(&str, usize)> {
        scores
            .iter()
            .map(|s| (s.artist.as_str(), s.rank.unwrap()))
            .collect()
    }

    #[test]
    fn test_descending_by_cpi() {
        let ranked = assign_ranks(vec![score("Low", 0.1), score("High", 0.9), score("Mid", 0.5)]);
        assert_eq!(ranked_keys(&ranked), vec![("high", 1), ("mid", 2), ("low", 3)]);
    }

    #[test]
    fn test_ties_broken_by_key_not_insertion_order() {
        let forward = assign_ranks(vec![score("A", 0.5), score("B", 0.5)]);
        let reverse = assign_ranks(vec![score("B", 0.5), score("A", 0.5)]);
        assert_eq!(ranked_keys(&forward), vec![("a", 1), ("b", 2)]);
        assert_eq!(ranked_keys(&forward), ranked_keys(&reverse));
    }

    #[test]
    fn test_dense_ranks() {
        let ranked = assign_ranks(vec![
            score("D", 0.2),
            score("C", 0.2),
            score("B", 0.7),
            score("A", 0.0),
        ]);
        let ranks: Vec<usize> = ranked.iter().filter_map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(ranked_keys(&ranked)[1], ("c", 2));
    }

    #[test]
    fn test_empty() {
        assert!(assign_ranks(Vec::new()).is_empty());
    }
}
