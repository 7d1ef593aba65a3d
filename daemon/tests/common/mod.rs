#![allow(dead_code)]

use guardian_daemon::features::{FeatureVector, FEATURE_DIM};
use guardian_daemon::protocol::Sample;

/// Deterministic spread of vectors around `center`.
pub fn cluster(center: f64, n: usize, seed: usize) -> Vec<FeatureVector> {
    (0..n)
        .map(|i| {
            let mut row = [0.0; FEATURE_DIM];
            for (j, v) in row.iter_mut().enumerate() {
                *v = center + (((i + seed) * 7919 + j * 104_729) % 1000) as f64 / 5000.0;
            }
            row
        })
        .collect()
}

/// Two well separated clusters, `n` rows total.
pub fn two_clusters(n: usize) -> Vec<FeatureVector> {
    let mut rows = cluster(0.0, n / 2, 0);
    rows.extend(cluster(10.0, n - n / 2, 5));
    rows
}

/// A plausible sample whose rates wobble around a steady workload.
pub fn steady_sample(i: u64) -> Sample {
    let wobble = (i % 7) as f32;
    Sample {
        timestamp_ns: 1_000_000 * i,
        cache_references: 5_000,
        cache_misses: 500,
        branch_instructions: 20_000,
        branch_misses: 400,
        cycles: 100_000,
        instructions: 120_000,
        cache_miss_rate: 0.10 + 0.004 * wobble,
        branch_miss_rate: 0.02 + 0.001 * ((i % 5) as f32),
        ipc: 1.2 + 0.02 * ((i % 11) as f32),
    }
}
