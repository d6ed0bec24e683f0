//! Outlier Scoring
//!
//! Unsupervised isolation-forest pass over a single numeric column. Values
//! that are isolated by few random partitions score high; the contamination
//! fraction picks the score threshold. Fixed seed keeps runs reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const DEFAULT_CONTAMINATION: f64 = 0.05;

const TREE_COUNT: usize = 100;
const SUBSAMPLE: usize = 256;
const SEED: u64 = 42;

/// Score a column for outliers. The mask is aligned index-for-index with the
/// input; missing or non-finite values never fit the model and come back
/// `false`. Degenerate input (fewer than two distinct finite values) yields
/// an all-false mask rather than an error.
pub fn score(values: &[Option<f64>], contamination: f64) -> Vec<bool> {
    let mut mask = vec![false; values.len()];
    if values.is_empty() || !(0.0..1.0).contains(&contamination) {
        return mask;
    }

    let fitted: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    let data: Vec<f64> = fitted.iter().map(|&(_, x)| x).collect();

    let mut distinct = data.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return mask;
    }

    let mut rng = StdRng::seed_from_u64(SEED);
    let sample_size = data.len().min(SUBSAMPLE);
    let depth_limit = (sample_size as f64).log2().ceil() as usize;

    let trees: Vec<Node> = (0..TREE_COUNT)
        .map(|_| {
            let sample: Vec<f64> = if data.len() > sample_size {
                data.choose_multiple(&mut rng, sample_size).copied().collect()
            } else {
                data.clone()
            };
            Node::fit(&mut rng, sample, depth_limit)
        })
        .collect();

    let norm = average_path_length(sample_size);
    let scores: Vec<f64> = data
        .iter()
        .map(|&x| {
            let mean_path =
                trees.iter().map(|t| t.path_length(x, 0)).sum::<f64>() / TREE_COUNT as f64;
            2f64.powf(-mean_path / norm)
        })
        .collect();

    let threshold = quantile(&scores, 1.0 - contamination);
    for (&(idx, _), &s) in fitted.iter().zip(scores.iter()) {
        if s > threshold {
            mask[idx] = true;
        }
    }
    mask
}

enum Node {
    Leaf { size: usize },
    Split { at: f64, left: Box<Node>, right: Box<Node> },
}

impl Node {
    fn fit(rng: &mut StdRng, points: Vec<f64>, depth_left: usize) -> Node {
        let min = points.iter().copied().fold(f64::INFINITY, f64::min);
        let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if points.len() <= 1 || depth_left == 0 || min == max {
            return Node::Leaf { size: points.len() };
        }
        let at = rng.gen_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = points.into_iter().partition(|&p| p < at);
        Node::Split {
            at,
            left: Box::new(Node::fit(rng, left, depth_left - 1)),
            right: Box::new(Node::fit(rng, right, depth_left - 1)),
        }
    }

    fn path_length(&self, x: f64, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split { at, left, right } => {
                if x < *at {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points; the
/// standard isolation-forest normalization term.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}

/// Linear-interpolated quantile, q in [0, 1].
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}
