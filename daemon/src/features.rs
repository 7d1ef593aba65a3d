//! Rolling-window feature extraction

use std::collections::VecDeque;

pub const ROLLING_WINDOW: usize = 32;
pub const FEATURE_DIM: usize = 14;

pub type FeatureVector = [f64; FEATURE_DIM];

#[rustfmt::skip]
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "cmr", "bmr", "ipc",
    "cmr_rmean", "bmr_rmean", "ipc_rmean",
    "cmr_rstd", "bmr_rstd", "ipc_rstd",
    "cmr_delta", "bmr_delta", "ipc_delta",
    "cmr_x_ipc", "bmr_x_ipc",
];

/// Bounded history plus the previously pushed value for one metric.
#[derive(Debug, Clone)]
struct MetricWindow {
    history: VecDeque<f64>,
    capacity: usize,
    prev: Option<f64>,
}

impl MetricWindow {
    fn new(capacity: usize) -> Self {
        Self { history: VecDeque::with_capacity(capacity), capacity, prev: None }
    }

    /// Returns (mean, population std, delta) after appending `value`.
    fn push(&mut self, value: f64) -> (f64, f64, f64) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(value);

        let n = self.history.len() as f64;
        let mean = self.history.iter().sum::<f64>() / n;
        let std = if self.history.len() > 1 {
            let var = self.history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        } else {
            0.0
        };
        let delta = self.prev.map_or(0.0, |p| value - p);
        self.prev = Some(value);
        (mean, std, delta)
    }
}

/// Turns the (cache-miss rate, branch-miss rate, ipc) stream into feature
/// vectors. Single writer: `push` mutates the windows and is order-dependent.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    cmr: MetricWindow,
    bmr: MetricWindow,
    ipc: MetricWindow,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::with_window(ROLLING_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            cmr: MetricWindow::new(window),
            bmr: MetricWindow::new(window),
            ipc: MetricWindow::new(window),
        }
    }

    #[rustfmt::skip]
    pub fn push(&mut self, cmr: f64, bmr: f64, ipc: f64) -> FeatureVector {
        let (cmr_mean, cmr_std, cmr_delta) = self.cmr.push(cmr);
        let (bmr_mean, bmr_std, bmr_delta) = self.bmr.push(bmr);
        let (ipc_mean, ipc_std, ipc_delta) = self.ipc.push(ipc);
        [
            cmr, bmr, ipc,
            cmr_mean, bmr_mean, ipc_mean,
            cmr_std, bmr_std, ipc_std,
            cmr_delta, bmr_delta, ipc_delta,
            cmr * ipc, bmr * ipc,
        ]
    }
}
