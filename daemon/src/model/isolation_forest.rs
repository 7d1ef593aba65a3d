//! Isolation forest: random axis-aligned partitioning, short paths are outliers

use super::{percentile, OutlierModel};
use crate::features::{FeatureVector, FEATURE_DIM};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Expected share of outliers in the training data; sets the boundary.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self { n_estimators: 200, max_samples: 256, contamination: 0.01, seed: 42 }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { size: usize },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn build(rows: Vec<&FeatureVector>, max_depth: usize, rng: &mut ChaCha8Rng) -> Self {
        let mut nodes = Vec::new();
        Self::grow(&mut nodes, rows, 0, max_depth, rng);
        Self { nodes }
    }

    fn grow(
        nodes: &mut Vec<Node>,
        rows: Vec<&FeatureVector>,
        depth: usize,
        max_depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let idx = nodes.len();
        nodes.push(Node::Leaf { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return idx;
        }

        // only features that still have spread in this partition can split it
        let candidates: Vec<(usize, f64, f64)> = (0..FEATURE_DIM)
            .filter_map(|j| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                    (lo.min(r[j]), hi.max(r[j]))
                });
                (hi > lo).then_some((j, lo, hi))
            })
            .collect();
        let Some(&(feature, lo, hi)) = candidates.choose(rng) else {
            return idx;
        };
        let threshold = rng.gen_range(lo..hi);
        let (l, r): (Vec<_>, Vec<_>) = rows.into_iter().partition(|row| row[feature] < threshold);
        let left = Self::grow(nodes, l, depth + 1, max_depth, rng);
        let right = Self::grow(nodes, r, depth + 1, max_depth, rng);
        nodes[idx] = Node::Split { feature, threshold, left, right };
        idx
    }

    fn path_length(&self, x: &FeatureVector) -> f64 {
        let mut i = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[i] {
                Node::Split { feature, threshold, left, right } => {
                    i = if x[feature] < threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(size),
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Tree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[FeatureVector], params: IsolationForestParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let sample_size = params.max_samples.min(rows.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let subset: Vec<&FeatureVector> =
                    rows.choose_multiple(&mut rng, sample_size).collect();
                Tree::build(subset, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self { trees, sample_size, offset: 0.0 };
        let mut train_scores: Vec<f64> = rows.iter().map(|r| forest.score_samples(r)).collect();
        forest.offset = percentile(&mut train_scores, 100.0 * params.contamination);
        forest
    }

    /// Negated anomaly score in [-1, 0]; lower is more anomalous.
    fn score_samples(&self, x: &FeatureVector) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(f64::EPSILON);
        -(2f64.powf(-mean_path / norm))
    }
}

impl OutlierModel for IsolationForest {
    fn score(&self, x: &FeatureVector) -> f64 {
        self.score_samples(x) - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;

    fn cluster(n: usize) -> Vec<FeatureVector> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        (0..n)
            .map(|_| {
                let mut row = [0.0; FEATURE_DIM];
                for v in row.iter_mut() {
                    *v = rng.gen::<f64>() + rng.gen::<f64>() + rng.gen::<f64>();
                }
                row
            })
            .collect()
    }

    #[test]
    fn far_point_scores_below_dense_center() {
        let rows = cluster(300);
        let forest = IsolationForest::fit(&rows, IsolationForestParams::default());
        let center = [1.5; FEATURE_DIM];
        let far = [25.0; FEATURE_DIM];
        assert!(forest.score(&far) < forest.score(&center));
        assert_eq!(forest.predict(&center), Verdict::Inlier);
    }

    #[test]
    fn isolated_training_point_is_flagged() {
        let mut rows = cluster(299);
        let far = [25.0; FEATURE_DIM];
        rows.push(far);
        let forest = IsolationForest::fit(&rows, IsolationForestParams::default());
        assert_eq!(forest.predict(&far), Verdict::Outlier);
    }

    #[test]
    fn fitting_is_deterministic_for_a_seed() {
        let rows = cluster(100);
        let a = IsolationForest::fit(&rows, IsolationForestParams::default());
        let b = IsolationForest::fit(&rows, IsolationForestParams::default());
        assert_eq!(a.score(&rows[3]), b.score(&rows[3]));
    }

    #[test]
    fn average_path_length_base_cases() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }
}
