//! Fusion engine: reconcile the detectors' candidates into one estimate.
//!
//! # Algorithm
//!
//! 1. **Weight:** scale each candidate's score by its detector's trust
//!    weight (colour 1.5, blob 1.2, motion 1.0 by default).
//! 2. **Order:** stable sort by detector priority (colour, blob, motion),
//!    then by weighted score, highest first. Clustering is greedy, so this
//!    fixes which candidate seeds each cluster.
//! 3. **Cluster:** each unconsumed candidate seeds a cluster and absorbs
//!    every unconsumed candidate strictly within `cluster_radius` of it.
//! 4. **Merge:** aggregate score is the sum of weighted scores; the centre
//!    is the score-weighted mean, falling back to the seed's centre when
//!    the sum is zero or anything is non-finite.

use crate::config::FusionConfig;
use rallytrack_model::{Candidate, DetectionMethod, MergedCandidate, Point2D};
use std::collections::BTreeSet;

/// A candidate with its detector weight applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedCandidate {
    pub candidate: Candidate,
    /// Always finite; non-finite inputs count as zero.
    pub weighted_score: f64,
}

/// Trust weight of a detector.
pub fn weight_of(method: DetectionMethod, config: &FusionConfig) -> f64 {
    match method {
        DetectionMethod::Color => config.color_weight,
        DetectionMethod::Motion => config.motion_weight,
        DetectionMethod::Blob => config.blob_weight,
    }
}

/// Apply weights and put candidates in clustering order.
pub fn weigh(
    candidates: impl IntoIterator<Item = Candidate>,
    config: &FusionConfig,
) -> Vec<WeightedCandidate> {
    let mut weighted: Vec<WeightedCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let score = candidate.score * weight_of(candidate.method, config);
            WeightedCandidate {
                candidate,
                weighted_score: if score.is_finite() { score } else { 0.0 },
            }
        })
        .collect();

    weighted.sort_by(|a, b| {
        a.candidate
            .method
            .priority()
            .cmp(&b.candidate.method.priority())
            .then_with(|| b.weighted_score.total_cmp(&a.weighted_score))
    });
    weighted
}

/// Cluster the three detectors' candidates into merged estimates.
pub fn fuse(
    color: &[Candidate],
    motion: &[Candidate],
    blob: &[Candidate],
    config: &FusionConfig,
) -> Vec<MergedCandidate> {
    let all = color.iter().chain(motion).chain(blob).copied();
    cluster(&weigh(all, config), config.cluster_radius)
}

/// Greedy proximity clustering over candidates in the given order.
pub fn cluster(weighted: &[WeightedCandidate], radius: f64) -> Vec<MergedCandidate> {
    let mut consumed = vec![false; weighted.len()];
    let mut merged = Vec::new();

    for (i, seed) in weighted.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;

        let mut members = vec![seed];
        for (j, other) in weighted.iter().enumerate().skip(i + 1) {
            if consumed[j] {
                continue;
            }
            if seed.candidate.center.distance_to(&other.candidate.center) < radius {
                consumed[j] = true;
                members.push(other);
            }
        }

        merged.push(merge(&members));
    }

    merged
}

fn merge(members: &[&WeightedCandidate]) -> MergedCandidate {
    let seed = members[0].candidate.center;
    let total: f64 = members.iter().map(|m| m.weighted_score).sum();

    let center = if total == 0.0 || !total.is_finite() {
        seed
    } else {
        let x = members
            .iter()
            .map(|m| m.candidate.center.x * m.weighted_score)
            .sum::<f64>()
            / total;
        let y = members
            .iter()
            .map(|m| m.candidate.center.y * m.weighted_score)
            .sum::<f64>()
            / total;
        let c = Point2D::new(x, y);
        if c.is_finite() {
            c
        } else {
            seed
        }
    };

    let center = center.rounded();
    MergedCandidate {
        center: if center.is_finite() { center } else { seed },
        aggregate_score: if total.is_finite() { total } else { 0.0 },
        methods: members
            .iter()
            .map(|m| m.candidate.method)
            .collect::<BTreeSet<_>>(),
        confidence: members.len(),
    }
}

/// Pick the frame's estimate: highest `aggregate_score × confidence`.
///
/// Clusters without positive evidence are never selected. Ties keep the
/// earlier cluster.
pub fn select_best(merged: Vec<MergedCandidate>) -> Option<MergedCandidate> {
    let mut best: Option<MergedCandidate> = None;
    for candidate in merged {
        if candidate.aggregate_score <= 0.0 {
            continue;
        }
        match &best {
            Some(current) if current.rank() >= candidate.rank() => {}
            _ => best = Some(candidate),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cand(x: f64, y: f64, score: f64, method: DetectionMethod) -> Candidate {
        Candidate::new(Point2D::new(x, y), 40.0, score, method)
    }

    #[test]
    fn test_corroborated_cluster_wins() {
        let color = [cand(100.0, 100.0, 0.8, DetectionMethod::Color)];
        let motion = [
            cand(104.0, 98.0, 20.0, DetectionMethod::Motion),
            cand(300.0, 50.0, 30.0, DetectionMethod::Motion),
        ];
        let blob = [cand(101.0, 101.0, 9.0, DetectionMethod::Blob)];

        let merged = fuse(&color, &motion, &blob, &FusionConfig::default());
        assert_eq!(merged.len(), 2);

        let best = select_best(merged).unwrap();
        assert_eq!(best.confidence, 3);
        assert_eq!(best.methods.len(), 3);
        assert!((best.aggregate_score - (0.8 * 1.5 + 20.0 + 9.0 * 1.2)).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_centroid() {
        let color = [cand(0.0, 0.0, 1.0, DetectionMethod::Color)];
        let motion = [cand(10.0, 0.0, 1.5, DetectionMethod::Motion)];
        let merged = fuse(&color, &motion, &[], &FusionConfig::default());
        assert_eq!(merged.len(), 1);
        // weights 1.5 and 1.5 put the centre halfway
        assert_eq!(merged[0].center, Point2D::new(5.0, 0.0));
    }

    #[test]
    fn test_blob_evidence_outweighs_colour() {
        // A clean blob scores about its diameter, a clean colour region at
        // most its circularity, so the blob pulls the centre towards itself.
        let color = [cand(10.0, 10.0, 1.0, DetectionMethod::Color)];
        let blob = [cand(14.0, 10.0, 10.0, DetectionMethod::Blob)];
        let merged = fuse(&color, &[], &blob, &FusionConfig::default());

        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert!((m.aggregate_score - (1.0 * 1.5 + 10.0 * 1.2)).abs() < 1e-9);
        // (10 * 1.5 + 14 * 12) / 13.5 = 13.56
        assert_eq!(m.center, Point2D::new(14.0, 10.0));
        assert_eq!(m.confidence, 2);
        assert!(m.is_multi_method());
    }

    #[test]
    fn test_zero_score_falls_back_to_seed() {
        let color = [cand(12.0, 7.0, 0.0, DetectionMethod::Color)];
        let motion = [cand(15.0, 9.0, 0.0, DetectionMethod::Motion)];
        let merged = fuse(&color, &motion, &[], &FusionConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].center, Point2D::new(12.0, 7.0));
        assert_eq!(merged[0].aggregate_score, 0.0);
        assert_eq!(merged[0].confidence, 2);
        assert!(select_best(merged).is_none());
    }

    #[test]
    fn test_non_finite_scores_are_neutralized() {
        let color = [cand(20.0, 20.0, f64::NAN, DetectionMethod::Color)];
        let blob = [cand(22.0, 20.0, f64::INFINITY, DetectionMethod::Blob)];
        let merged = fuse(&color, &[], &blob, &FusionConfig::default());
        assert_eq!(merged.len(), 1);
        assert!(merged[0].center.is_finite());
        assert!(merged[0].aggregate_score.is_finite());
        assert_eq!(merged[0].center, Point2D::new(20.0, 20.0));
    }

    #[test]
    fn test_colour_seeds_before_motion() {
        // The motion candidate scores higher but colour clusters first.
        let color = [cand(0.0, 0.0, 0.1, DetectionMethod::Color)];
        let motion = [
            cand(15.0, 0.0, 100.0, DetectionMethod::Motion),
            cand(30.0, 0.0, 1.0, DetectionMethod::Motion),
        ];
        let merged = fuse(&color, &motion, &[], &FusionConfig::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].confidence, 2);
        assert_eq!(merged[1].confidence, 1);
        assert_eq!(merged[1].center, Point2D::new(30.0, 0.0));
    }

    #[test]
    fn test_ties_keep_first_cluster() {
        let merged = fuse(
            &[
                cand(0.0, 0.0, 1.0, DetectionMethod::Color),
                cand(100.0, 0.0, 1.0, DetectionMethod::Color),
            ],
            &[],
            &[],
            &FusionConfig::default(),
        );
        let best = select_best(merged).unwrap();
        assert_eq!(best.center, Point2D::new(0.0, 0.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(fuse(&[], &[], &[], &FusionConfig::default()).is_empty());
        assert!(select_best(Vec::new()).is_none());
    }

    fn method_strategy() -> impl Strategy<Value = DetectionMethod> {
        prop_oneof![
            Just(DetectionMethod::Color),
            Just(DetectionMethod::Motion),
            Just(DetectionMethod::Blob),
        ]
    }

    proptest! {
        #[test]
        fn prop_separated_clusters_keep_their_size(
            sizes in proptest::collection::vec(1usize..6, 1..6),
            methods in proptest::collection::vec(method_strategy(), 30),
            scores in proptest::collection::vec(0.0f64..50.0, 30),
        ) {
            // Cluster k sits at (200k, 0); members spread at most 4 px apart.
            let mut candidates = Vec::new();
            let mut n = 0;
            for (k, &size) in sizes.iter().enumerate() {
                for m in 0..size {
                    let x = 200.0 * k as f64 + m as f64;
                    candidates.push(cand(x, (m % 3) as f64, scores[n], methods[n]));
                    n += 1;
                }
            }

            let merged = cluster(&weigh(candidates, &FusionConfig::default()), 20.0);
            let mut found: Vec<usize> = merged.iter().map(|m| m.confidence).collect();
            let mut expected = sizes.clone();
            found.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn prop_centres_are_always_finite(
            points in proptest::collection::vec((0.0f64..640.0, 0.0f64..480.0, -1.0f64..1e6), 0..40),
            methods in proptest::collection::vec(method_strategy(), 40),
        ) {
            let candidates: Vec<Candidate> = points
                .iter()
                .zip(&methods)
                .map(|(&(x, y, s), &m)| cand(x, y, s, m))
                .collect();
            let total = candidates.len();

            let merged = cluster(&weigh(candidates, &FusionConfig::default()), 20.0);
            prop_assert_eq!(merged.iter().map(|m| m.confidence).sum::<usize>(), total);
            for m in &merged {
                prop_assert!(m.center.is_finite());
                prop_assert!(m.aggregate_score.is_finite());
            }
        }
    }
}
