//! Multi-class non-maximum suppression.

use crate::geometry::Rect;

/// A single raw prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub score: f32,
    pub rect: Rect,
}

impl Candidate {
    pub fn new(class_id: usize, score: f32, rect: Rect) -> Self {
        Self {
            class_id,
            score,
            rect,
        }
    }
}

/// Thresholds and limits for [`reduce`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmsParams {
    /// Candidates scoring below this are dropped
    pub score_threshold: f32,
    /// Candidates overlapping a selection at or above this IOU are dropped
    pub iou_threshold: f32,
    pub max_per_class: usize,
    pub max_total: usize,
}

/// Reduce scored candidates to the best non-overlapping ones per class.
///
/// Candidates below the score threshold, outside the unit square, or with a
/// class id at or beyond `num_classes` are discarded. Each class is then
/// reduced greedily: take the best remaining candidate and drop every other
/// candidate of that class whose IOU with it is `>= iou_threshold`. The
/// selections of all classes are merged, ordered by descending score and
/// truncated to `max_total`. Equal scores keep their input order.
pub fn reduce(candidates: &[Candidate], num_classes: usize, params: &NmsParams) -> Vec<Candidate> {
    let mut per_class: Vec<Vec<(usize, Candidate)>> = vec![Vec::new(); num_classes];

    for (index, candidate) in candidates.iter().enumerate() {
        // `>=` is false for NaN scores
        let passes_score = candidate.score >= params.score_threshold;
        if candidate.class_id >= num_classes || !passes_score || !candidate.rect.is_valid_normalized()
        {
            continue;
        }
        per_class[candidate.class_id].push((index, *candidate));
    }

    let mut selected: Vec<(usize, Candidate)> = Vec::new();

    for mut group in per_class {
        if group.is_empty() {
            continue;
        }

        // Stable: ties stay in input order
        group.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

        let mut suppressed = vec![false; group.len()];
        let mut kept = 0;

        for i in 0..group.len() {
            if kept >= params.max_per_class {
                break;
            }
            if suppressed[i] {
                continue;
            }

            let (_, best) = group[i];
            selected.push(group[i]);
            kept += 1;

            for j in (i + 1)..group.len() {
                if !suppressed[j] && best.rect.iou(&group[j].1.rect) >= params.iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
    }

    selected.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
    selected.truncate(params.max_total);
    selected.into_iter().map(|(_, candidate)| candidate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_per_class: usize, max_total: usize) -> NmsParams {
        NmsParams {
            score_threshold: 0.4,
            iou_threshold: 0.5,
            max_per_class,
            max_total,
        }
    }

    /// 0.9 and 0.85 overlap with IOU 0.6, the 0.4 box is disjoint from both
    fn overlapping_set() -> Vec<Candidate> {
        vec![
            Candidate::new(0, 0.9, Rect::new(0.0, 0.0, 0.4, 0.4)),
            Candidate::new(0, 0.85, Rect::new(0.0, 0.0, 0.4, 0.24)),
            Candidate::new(0, 0.4, Rect::new(0.6, 0.6, 0.9, 0.9)),
        ]
    }

    #[test]
    fn test_overlap_suppressed_single_per_class() {
        let result = reduce(&overlapping_set(), 1, &params(1, 10));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 0.9);
    }

    #[test]
    fn test_disjoint_threshold_candidate_survives_with_room() {
        let result = reduce(&overlapping_set(), 1, &params(2, 10));

        let scores: Vec<f32> = result.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.4]);
    }

    #[test]
    fn test_iou_equal_to_threshold_counts_as_overlap() {
        // IOU is exactly 0.125 / 0.25 = 0.5
        let candidates = vec![
            Candidate::new(0, 0.9, Rect::new(0.0, 0.0, 0.5, 0.5)),
            Candidate::new(0, 0.8, Rect::new(0.0, 0.0, 0.5, 0.25)),
        ];
        let result = reduce(&candidates, 1, &params(5, 5));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_below_threshold_and_out_of_bounds_dropped() {
        let candidates = vec![
            Candidate::new(0, 0.39, Rect::new(0.1, 0.1, 0.2, 0.2)),
            Candidate::new(0, 0.95, Rect::new(-0.1, 0.1, 0.2, 0.2)),
            Candidate::new(0, 0.95, Rect::new(0.1, 0.1, 1.1, 0.2)),
            Candidate::new(0, f32::NAN, Rect::new(0.1, 0.1, 0.2, 0.2)),
            Candidate::new(0, 0.5, Rect::new(0.3, 0.3, 0.4, 0.4)),
        ];
        let result = reduce(&candidates, 1, &params(5, 5));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 0.5);
    }

    #[test]
    fn test_unknown_class_ids_dropped() {
        let candidates = vec![
            Candidate::new(7, 0.99, Rect::new(0.1, 0.1, 0.2, 0.2)),
            Candidate::new(1, 0.6, Rect::new(0.1, 0.1, 0.2, 0.2)),
        ];
        let result = reduce(&candidates, 2, &params(1, 2));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].class_id, 1);
    }

    #[test]
    fn test_classes_are_suppressed_independently() {
        let rect = Rect::new(0.2, 0.2, 0.6, 0.6);
        let candidates = vec![
            Candidate::new(0, 0.7, rect),
            Candidate::new(1, 0.8, rect),
            Candidate::new(2, 0.75, rect),
        ];
        let result = reduce(&candidates, 3, &params(1, 3));

        let classes: Vec<usize> = result.iter().map(|c| c.class_id).collect();
        assert_eq!(classes, vec![1, 2, 0]);
    }

    #[test]
    fn test_max_total_truncates_globally() {
        let rect = Rect::new(0.2, 0.2, 0.6, 0.6);
        let candidates = vec![
            Candidate::new(0, 0.7, rect),
            Candidate::new(1, 0.8, rect),
            Candidate::new(2, 0.75, rect),
        ];
        let result = reduce(&candidates, 3, &params(1, 2));

        let classes: Vec<usize> = result.iter().map(|c| c.class_id).collect();
        assert_eq!(classes, vec![1, 2]);
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let candidates = vec![
            Candidate::new(1, 0.8, Rect::new(0.0, 0.0, 0.1, 0.1)),
            Candidate::new(0, 0.8, Rect::new(0.5, 0.5, 0.6, 0.6)),
            Candidate::new(0, 0.8, Rect::new(0.0, 0.0, 0.1, 0.1)),
        ];
        let result = reduce(&candidates, 2, &params(2, 3));

        assert_eq!(result, candidates);
    }

    #[test]
    fn test_empty_input() {
        assert!(reduce(&[], 3, &params(1, 3)).is_empty());
    }

    /// Small deterministic generator so the property sweep is reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 40) as f32) / ((1u64 << 24) as f32)
        }
    }

    #[test]
    fn test_reduction_invariants_hold_for_random_sets() {
        let mut rng = Lcg(42);

        for round in 0..200 {
            let count = 1 + (round % 40);
            let candidates: Vec<Candidate> = (0..count)
                .map(|_| {
                    let x = rng.next_f32() * 0.8;
                    let y = rng.next_f32() * 0.8;
                    let w = 0.05 + rng.next_f32() * 0.15;
                    let h = 0.05 + rng.next_f32() * 0.15;
                    let class_id = (rng.next_f32() * 4.0) as usize;
                    Candidate::new(class_id, rng.next_f32(), Rect::new(x, y, x + w, y + h))
                })
                .collect();

            let params = NmsParams {
                score_threshold: 0.3,
                iou_threshold: 0.4,
                max_per_class: 3,
                max_total: 8,
            };
            let result = reduce(&candidates, 3, &params);

            assert!(result.len() <= params.max_total);
            assert!(result.windows(2).all(|w| w[0].score >= w[1].score));

            for class_id in 0..3 {
                let members: Vec<&Candidate> =
                    result.iter().filter(|c| c.class_id == class_id).collect();
                assert!(members.len() <= params.max_per_class);

                for (i, a) in members.iter().enumerate() {
                    assert!(a.score >= params.score_threshold);
                    for b in members.iter().skip(i + 1) {
                        assert!(a.rect.iou(&b.rect) < params.iou_threshold);
                    }
                }
            }

            assert!(result.iter().all(|c| c.class_id < 3));
        }
    }
}
