//! Outlier scoring strategies.
//!
//! Callers hand over a feature matrix (one `Vec<f64>` per sample, equal
//! lengths) and get one flag per sample back. Implementations are
//! deterministic for a given configuration and never flag anything below
//! their own `min_samples`.

use crate::util::{average, percentile, std_dev};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait OutlierScorer {
    fn name(&self) -> &'static str;

    /// Smallest sample count the scorer will work with. Callers are expected
    /// to skip scoring (and report nothing) below it.
    fn min_samples(&self) -> usize;

    fn flag(&self, samples: &[Vec<f64>]) -> Vec<bool>;
}

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest (Liu, Ting & Zhou 2008).
///
/// The `contamination` share of samples with the highest anomaly score are
/// flagged: a sample is an outlier when its score is strictly above the
/// `(1 - contamination)` percentile of all scores.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl IsolationForest {
    pub fn new(contamination: f64, seed: u64) -> Self {
        IsolationForest {
            n_estimators: 100,
            max_samples: 256,
            contamination,
            seed,
        }
    }

    /// Anomaly score per sample in `(0, 1]`; higher is more isolated.
    pub fn score_samples(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        let n = samples.len();
        if n < 2 {
            return vec![0.5; n];
        }
        let psi = self.max_samples.min(n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<Node> = (0..self.n_estimators)
            .map(|_| {
                let idx = rand::seq::index::sample(&mut rng, n, psi).into_vec();
                let rows: Vec<&[f64]> = idx.iter().map(|&i| samples[i].as_slice()).collect();
                build(&mut rng, &rows, 0, height_limit)
            })
            .collect();

        let norm = average_path(psi);
        samples
            .iter()
            .map(|x| {
                let mean_path = trees.iter().map(|t| path_length(t, x, 0)).sum::<f64>()
                    / trees.len().max(1) as f64;
                2f64.powf(-mean_path / norm)
            })
            .collect()
    }
}

impl OutlierScorer for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation-forest"
    }

    fn min_samples(&self) -> usize {
        6
    }

    fn flag(&self, samples: &[Vec<f64>]) -> Vec<bool> {
        if samples.len() < self.min_samples() {
            return vec![false; samples.len()];
        }
        let scores = self.score_samples(samples);
        let cutoff = percentile(scores.clone(), 100.0 * (1.0 - self.contamination));
        scores.into_iter().map(|s| s > cutoff).collect()
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn build(rng: &mut StdRng, rows: &[&[f64]], depth: usize, limit: usize) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }
    let width = rows[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r[f]), hi.max(r[f]))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = splittable[rng.random_range(0..splittable.len())];
    let threshold = rng.random_range(lo..hi);
    // `<=` keeps both sides non-empty: lo always goes left, hi always right.
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        rows.iter().copied().partition(|r| r[feature] <= threshold);
    Node::Split {
        feature,
        threshold,
        left: Box::new(build(rng, &left, depth + 1, limit)),
        right: Box::new(build(rng, &right, depth + 1, limit)),
    }
}

fn path_length(node: &Node, x: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] <= *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Flags a sample when any feature is more than `threshold` sample standard
/// deviations from that feature's mean. Constant features never flag.
#[derive(Debug, Clone)]
pub struct ZScoreRule {
    pub threshold: f64,
}

impl Default for ZScoreRule {
    fn default() -> Self {
        ZScoreRule { threshold: 2.5 }
    }
}

impl OutlierScorer for ZScoreRule {
    fn name(&self) -> &'static str {
        "z-score"
    }

    fn min_samples(&self) -> usize {
        3
    }

    fn flag(&self, samples: &[Vec<f64>]) -> Vec<bool> {
        let mut flags = vec![false; samples.len()];
        if samples.len() < self.min_samples() {
            return flags;
        }
        for f in 0..samples[0].len() {
            let column: Vec<f64> = samples.iter().map(|s| s[f]).collect();
            let sd = std_dev(&column);
            if !(sd > 0.0 && sd.is_finite()) {
                continue;
            }
            let mean = average(&column);
            for (flag, v) in flags.iter_mut().zip(&column) {
                if ((v - mean) / sd).abs() > self.threshold {
                    *flag = true;
                }
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn forest_flags_single_extreme_value() {
        let samples = column(&[100.0, 120.0, 90.0, 110.0, 95.0, 105.0, 10_000.0, 98.0]);
        let flags = IsolationForest::new(0.05, 42).flag(&samples);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert!(flags[6]);
    }

    #[test]
    fn forest_scores_are_deterministic_for_seed() {
        let samples = column(&[3.0, 4.0, 5.0, 4.5, 3.5, 40.0, 4.2]);
        let a = IsolationForest::new(0.1, 7).score_samples(&samples);
        let b = IsolationForest::new(0.1, 7).score_samples(&samples);
        assert_eq!(a, b);
        let top = a
            .iter()
            .enumerate()
            .max_by(|x, y| x.1.partial_cmp(y.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(top, 5);
    }

    #[test]
    fn forest_below_min_samples_flags_nothing() {
        let samples = column(&[1.0, 1.0, 1.0, 1.0, 500.0]);
        let flags = IsolationForest::new(0.05, 42).flag(&samples);
        assert_eq!(flags, vec![false; 5]);
    }

    #[test]
    fn forest_handles_constant_input() {
        let samples = column(&[7.0; 10]);
        let scores = IsolationForest::new(0.05, 42).score_samples(&samples);
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
        let flags = IsolationForest::new(0.05, 42).flag(&samples);
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn forest_uses_second_feature() {
        let mut samples: Vec<Vec<f64>> = (0..12).map(|i| vec![100.0 + i as f64, 0.02]).collect();
        samples[4][1] = 0.9;
        let flags = IsolationForest::new(0.1, 42).flag(&samples);
        assert!(flags[4]);
    }

    #[test]
    fn zscore_flags_outlier_in_larger_sample() {
        let mut values: Vec<f64> = (0..19).map(|i| 100.0 + (i % 5) as f64).collect();
        values.push(10_000.0);
        let flags = ZScoreRule::default().flag(&column(&values));
        assert!(flags[19]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn zscore_ignores_constant_feature() {
        let flags = ZScoreRule::default().flag(&column(&[5.0; 8]));
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn average_path_matches_reference_values() {
        assert_eq!(average_path(1), 0.0);
        assert_eq!(average_path(2), 1.0);
        assert!((average_path(256) - 10.2448).abs() < 1e-3);
    }
}
