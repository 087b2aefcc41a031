//! Label sampling with optional balancing between two domains
//!
//! When the two domains are trained on different label sets, independent
//! uniform draws over-represent the labels shared by both sets. The
//! balanced tables reweight the longer set so the combined marginal over
//! the union of labels stays flat.

use rand::Rng;

use crate::error::{Error, Result};

const PROB_SUM_EPS: f64 = 1e-9;

/// Probability table over an ordered set of labels
///
/// Order matters: the single-draw operation walks the table in this order
/// accumulating probability mass (inverse CDF).
#[derive(Debug, Clone, PartialEq)]
pub struct LabelProbs {
    labels: Vec<i64>,
    probs: Vec<f64>,
}

impl LabelProbs {
    /// Build a table from parallel label/probability slices
    ///
    /// The probabilities must sum to 1.0 within `1e-9`. A violation is a
    /// programming error in the caller, not a user-facing condition.
    pub fn new(labels: Vec<i64>, probs: Vec<f64>) -> Self {
        assert_eq!(labels.len(), probs.len());
        let sum: f64 = probs.iter().sum();
        assert!(
            (sum - 1.0).abs() < PROB_SUM_EPS,
            "label probabilities must sum to 1.0, got {sum}"
        );
        Self { labels, probs }
    }

    /// Probability assigned to `label`, or None if absent
    pub fn prob(&self, label: i64) -> Option<f64> {
        self.labels
            .iter()
            .position(|&l| l == label)
            .map(|i| self.probs[i])
    }

    /// Labels in table order
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Draw a single label by inverse CDF
    ///
    /// Walks the table in order, accumulating mass until it reaches a
    /// uniform draw in [0, 1). The last label absorbs any rounding slack.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        let mut label = *self.labels.last().expect("table must not be empty");
        for (&l, &p) in self.labels.iter().zip(self.probs.iter()) {
            label = l;
            cumulative += p;
            if cumulative >= r {
                break;
            }
        }
        label
    }

    /// Draw `n` labels independently
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<i64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Uniform table: every label gets `1 / len(labels)`
pub fn uniform_label_probs(labels: &[i64]) -> LabelProbs {
    let p = 1.0 / labels.len() as f64;
    LabelProbs::new(labels.to_vec(), vec![p; labels.len()])
}

/// Balanced tables for two label sets whose lengths differ by exactly one
///
/// With `q` the length of the shorter set, the shorter set is uniform at
/// `1/q`; every label of the longer set gets `p = (q-1)/(q(q+1))` and the
/// label missing from the shorter set gets an extra `1/q` on top. Combined
/// with independent draws from both tables this keeps the marginal over
/// the union of labels from under-representing the missing label.
///
/// Returns the tables in the original argument order. Fails with
/// `NotImplemented` when the lengths differ by anything other than one.
pub fn balanced_label_probs(labels1: &[i64], labels2: &[i64]) -> Result<(LabelProbs, LabelProbs)> {
    if labels2.len() < labels1.len() {
        let (p2, p1) = balanced_label_probs(labels2, labels1)?;
        return Ok((p1, p2));
    }
    if labels1.len() + 1 != labels2.len() {
        return Err(Error::NotImplemented(
            "balancing for multiple missing labels is not implemented yet".to_string(),
        ));
    }

    let probs1 = uniform_label_probs(labels1);
    let q = labels1.len() as f64;
    let p = (q - 1.0) / (q * (q + 1.0));
    let probs2: Vec<f64> = labels2
        .iter()
        .map(|l| {
            if labels1.contains(l) {
                p
            } else {
                p + 1.0 / q
            }
        })
        .collect();

    Ok((probs1, LabelProbs::new(labels2.to_vec(), probs2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_table() {
        let probs = uniform_label_probs(&[3, 7, 9]);
        assert_eq!(probs.prob(3), Some(1.0 / 3.0));
        assert_eq!(probs.prob(7), Some(1.0 / 3.0));
        assert_eq!(probs.prob(9), Some(1.0 / 3.0));
        assert_eq!(probs.prob(5), None);
    }

    #[test]
    fn test_balanced_example() {
        let (p1, p2) = balanced_label_probs(&[0, 1], &[0, 1, 2]).unwrap();

        assert_eq!(p1.prob(0), Some(0.5));
        assert_eq!(p1.prob(1), Some(0.5));

        // q = 2, p = 1/6; the label missing from the shorter set gets 1/6 + 1/2
        assert!((p2.prob(0).unwrap() - 1.0 / 6.0).abs() < 1e-12);
        assert!((p2.prob(1).unwrap() - 1.0 / 6.0).abs() < 1e-12);
        assert!((p2.prob(2).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_balanced_sums_and_extra_mass() {
        let labels1 = [1, 4, 5, 8];
        let labels2 = [1, 4, 5, 8, 9];
        let (p1, p2) = balanced_label_probs(&labels1, &labels2).unwrap();

        let sum1: f64 = labels1.iter().map(|&l| p1.prob(l).unwrap()).sum();
        let sum2: f64 = labels2.iter().map(|&l| p2.prob(l).unwrap()).sum();
        assert!((sum1 - 1.0).abs() < 1e-9);
        assert!((sum2 - 1.0).abs() < 1e-9);

        // The label unique to the longer set dominates every other entry
        let unique = p2.prob(9).unwrap();
        for &l in &labels1 {
            assert!(unique > p2.prob(l).unwrap());
        }
    }

    #[test]
    fn test_balanced_argument_order_is_preserved() {
        let (p1, p2) = balanced_label_probs(&[0, 1, 2], &[0, 1]).unwrap();
        // labels1 was the longer set; it must come back first
        assert_eq!(p1.labels(), &[0, 1, 2]);
        assert_eq!(p2.labels(), &[0, 1]);
        assert!(p1.prob(2).unwrap() > p1.prob(0).unwrap());
    }

    #[test]
    fn test_balanced_rejects_larger_gap() {
        let err = balanced_label_probs(&[0, 1], &[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    #[should_panic]
    fn test_bad_probability_sum_panics() {
        LabelProbs::new(vec![0, 1], vec![0.5, 0.6]);
    }

    #[test]
    fn test_sampling_matches_table() {
        let table = LabelProbs::new(vec![0, 1, 2], vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0]);
        let mut rng = StdRng::seed_from_u64(7);

        let n = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            counts[table.sample(&mut rng) as usize] += 1;
        }

        for (label, &count) in counts.iter().enumerate() {
            let expected = table.prob(label as i64).unwrap();
            let freq = count as f64 / n as f64;
            assert!(
                (freq - expected).abs() < 0.01,
                "label {label}: frequency {freq} too far from {expected}"
            );
        }
    }

    #[test]
    fn test_sample_batch_len() {
        let table = uniform_label_probs(&[0, 1]);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(table.sample_batch(32, &mut rng).len(), 32);
    }
}
