/// Min-max rescale a batch of scores into `[0, 1]`.
///
/// A uniform batch (including a single score) maps to all `1.0` so it keeps
/// its full weight in weighted fusion.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let Some((min, max)) = min_max(scores) else {
        return Vec::new();
    };
    if min == max {
        return vec![1.0; scores.len()];
    }
    let range = max - min;
    scores.iter().map(|s| (s - min) / range).collect()
}

fn min_max(scores: &[f64]) -> Option<(f64, f64)> {
    let (first, rest) = scores.split_first()?;
    Some(rest.iter().fold((*first, *first), |(lo, hi), &s| (lo.min(s), hi.max(s))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn uniform_batches_are_all_ones() {
        assert_eq!(normalize_scores(&[3.2]), vec![1.0]);
        assert_eq!(normalize_scores(&[5.0, 5.0, 5.0]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn min_max_scaling() {
        assert_eq!(normalize_scores(&[1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(normalize_scores(&[4.0, -4.0, 0.0]), vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn helper_bounds() {
        assert_eq!(min_max(&[]), None);
        assert_eq!(min_max(&[0.5, -1.0, 7.0]), Some((-1.0, 7.0)));
    }
}
