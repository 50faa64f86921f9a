use std::cmp::Ordering;

use crate::error::{Error, Result};

/// One ranked class: its probability after softmax and its position in the
/// original score vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f32,
    pub index: usize,
}

/// Returns the `k` highest scores and their indices, highest first.
///
/// Equal scores are ordered by ascending index, so ties never drop entries.
/// Scores compare with [`f32::total_cmp`]. `k` must be in `1..=scores.len()`.
pub fn top_k(scores: &[f32], k: usize) -> Result<(Vec<f32>, Vec<usize>)> {
    if k == 0 {
        return Err(Error::InvalidArgument("k must be at least 1".into()));
    }
    if k > scores.len() {
        return Err(Error::InvalidArgument(format!(
            "k = {k} exceeds the {} available scores",
            scores.len()
        )));
    }

    let by_score =
        |&a: &usize, &b: &usize| -> Ordering { scores[b].total_cmp(&scores[a]).then(a.cmp(&b)) };

    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, by_score);
        indices.truncate(k);
    }
    indices.sort_unstable_by(by_score);

    let values = indices.iter().map(|&i| scores[i]).collect();
    Ok((values, indices))
}

/// Numerically stable softmax: the maximum is subtracted before
/// exponentiating. The maximum must be finite.
pub fn softmax_in_place(values: &mut [f32]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::InvalidArgument("softmax of an empty vector".into()));
    }

    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Err(Error::InvalidArgument(format!(
            "softmax needs a finite maximum, got {max}"
        )));
    }

    let mut denominator = 0.0;
    for value in values.iter_mut() {
        *value = (*value - max).exp();
        denominator += *value;
    }

    values.iter_mut().for_each(|value| *value /= denominator);

    Ok(())
}

pub fn softmax(values: &[f32]) -> Result<Vec<f32>> {
    let mut out = values.to_vec();
    softmax_in_place(&mut out)?;
    Ok(out)
}

/// Picks the `k` best classes from raw model scores and turns just those
/// scores into probabilities.
pub fn classify(scores: &[f32], k: usize) -> Result<Vec<Prediction>> {
    let (mut values, indices) = top_k(scores, k)?;
    softmax_in_place(&mut values)?;

    Ok(values
        .into_iter()
        .zip(indices)
        .map(|(probability, index)| Prediction { probability, index })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() <= tolerance, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn top_two() {
        let (values, indices) = top_k(&[0.1, 0.5, 0.3, 0.9], 2).unwrap();

        assert_eq!(values, [0.9, 0.5]);
        assert_eq!(indices, [3, 1]);
    }

    #[test]
    fn top_all_sorts_everything() {
        let (values, indices) = top_k(&[2.0, -1.0, 7.5, 0.0], 4).unwrap();

        assert_eq!(values, [7.5, 2.0, 0.0, -1.0]);
        assert_eq!(indices, [2, 0, 3, 1]);
    }

    #[test]
    fn ties_keep_every_index_in_order() {
        let (values, indices) = top_k(&[0.2, 0.7, 0.7, 0.1, 0.7], 4).unwrap();

        assert_eq!(values, [0.7, 0.7, 0.7, 0.2]);
        assert_eq!(indices, [1, 2, 4, 0]);
    }

    #[test]
    fn zero_k_is_invalid() {
        let err = top_k(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn k_larger_than_scores_is_invalid() {
        let err = top_k(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn softmax_of_small_values() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]).unwrap();

        assert_close(&probabilities, &[0.0900, 0.2447, 0.6652], 1e-4);
        assert!((probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn softmax_of_large_values_is_stable() {
        let probabilities = softmax(&[1000.0, 1000.0, 1000.0]).unwrap();

        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert_close(&probabilities, &[1.0 / 3.0; 3], 1e-6);
    }

    #[test]
    fn softmax_single_value_is_one() {
        let mut values = [-42.0];
        softmax_in_place(&mut values).unwrap();
        assert_eq!(values, [1.0]);
    }

    #[test]
    fn softmax_of_nothing_is_invalid() {
        let err = softmax(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn softmax_rejects_non_finite_maximum() {
        for values in [
            vec![f32::INFINITY, 1.0],
            vec![f32::NEG_INFINITY, f32::NEG_INFINITY],
            vec![f32::NAN],
        ] {
            let err = softmax(&values).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{values:?}");
        }
    }

    #[test]
    fn softmax_gives_negative_infinity_no_mass() {
        let probabilities = softmax(&[f32::NEG_INFINITY, 0.0]).unwrap();
        assert_eq!(probabilities, [0.0, 1.0]);
    }

    #[test]
    fn classify_with_infinite_score_is_invalid() {
        let err = classify(&[f32::INFINITY, 1.0], 2).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn classify_ranks_and_normalises_the_subset() {
        let scores = [0.5, 3.0, -2.0, 2.0, 1.0];
        let predictions = classify(&scores, 3).unwrap();

        let indices: Vec<_> = predictions.iter().map(|p| p.index).collect();
        assert_eq!(indices, [1, 3, 4]);

        let probabilities: Vec<_> = predictions.iter().map(|p| p.probability).collect();
        assert_close(&probabilities, &softmax(&[3.0, 2.0, 1.0]).unwrap(), 1e-6);
        assert!((probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probabilities.windows(2).all(|w| w[0] >= w[1]));
    }
}
