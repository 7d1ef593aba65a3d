//! Ensemble anomaly detector with atomically swapped training state

use crate::alert::AlertLevel;
use crate::config::Config;
use crate::error::{GuardianError, Result};
use crate::features::{FeatureVector, FEATURE_DIM, FEATURE_NAMES};
use crate::model::{ModelKind, OutlierModel, Standardizer, Verdict};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fewest rows `train` will fit on.
pub const MIN_TRAIN_ROWS: usize = 50;
/// Fewest buffered normals a periodic retrain will fit on.
pub const MIN_RETRAIN_SAMPLES: usize = 200;

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub primary: ModelKind,
    pub secondary: ModelKind,
    pub primary_weight: f64,
    pub retrain_interval: Duration,
    pub buffer_capacity: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            primary: config.ensemble.primary,
            secondary: config.ensemble.secondary,
            primary_weight: config.ensemble.primary_weight,
            retrain_interval: Duration::from_secs(300),
            buffer_capacity: config.retrain.buffer_capacity,
        }
    }
}

impl TryFrom<&Config> for DetectorSettings {
    type Error = GuardianError;

    /// Rejects a retrain interval that is negative, NaN, or too large for a
    /// `Duration`.
    fn try_from(config: &Config) -> Result<Self> {
        let secs = config.retrain.interval_secs;
        let retrain_interval = Duration::try_from_secs_f64(secs).map_err(|e| {
            GuardianError::InvalidConfig(format!("retrain.interval_secs = {}: {}", secs, e))
        })?;
        Ok(Self {
            primary: config.ensemble.primary,
            secondary: config.ensemble.secondary,
            primary_weight: config.ensemble.primary_weight.clamp(0.0, 1.0),
            retrain_interval,
            buffer_capacity: config.retrain.buffer_capacity.max(1),
        })
    }
}

/// Everything `predict` needs, installed and replaced as one unit.
struct TrainedState {
    standardizer: Standardizer,
    primary: Box<dyn OutlierModel>,
    secondary: Box<dyn OutlierModel>,
    trained_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub level: AlertLevel,
    /// Weighted blend of both normalized scores, in [0, 1].
    pub composite: f64,
    pub primary_raw: f64,
    pub secondary_raw: f64,
    pub primary_verdict: Verdict,
    pub secondary_verdict: Verdict,
}

impl Prediction {
    fn untrained() -> Self {
        Self {
            level: AlertLevel::Normal,
            composite: 0.0,
            primary_raw: 0.0,
            secondary_raw: 0.0,
            primary_verdict: Verdict::Inlier,
            secondary_verdict: Verdict::Inlier,
        }
    }
}

pub struct EnsembleDetector {
    settings: DetectorSettings,
    state: Mutex<Option<Arc<TrainedState>>>,
    retrain_buf: Mutex<VecDeque<FeatureVector>>,
    train_count: AtomicU64,
}

impl EnsembleDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        let capacity = settings.buffer_capacity;
        Self {
            settings,
            state: Mutex::new(None),
            retrain_buf: Mutex::new(VecDeque::with_capacity(capacity.min(16_384))),
            train_count: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn is_trained(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Number of model states installed so far.
    pub fn train_count(&self) -> u64 {
        self.train_count.load(Ordering::SeqCst)
    }

    pub fn retrain_buffer_len(&self) -> usize {
        self.retrain_buf.lock().len()
    }

    pub fn retrain_buffer_snapshot(&self) -> Vec<FeatureVector> {
        self.retrain_buf.lock().iter().copied().collect()
    }

    /// Fits a fresh standardizer and both models on `rows`, then swaps them
    /// in together. Returns whether a new state was installed; on any
    /// failure the previous state is kept.
    pub fn train(&self, rows: &[FeatureVector]) -> bool {
        let rows: Vec<FeatureVector> = rows.iter().filter(|r| is_finite(r)).copied().collect();
        if rows.len() < MIN_TRAIN_ROWS {
            warn!(
                "Training skipped: only {} finite samples (need >= {})",
                rows.len(),
                MIN_TRAIN_ROWS
            );
            return false;
        }

        let standardizer = Standardizer::fit(&rows);
        let diverse = check_diversity(&rows);
        let scaled = standardizer.transform_all(&rows);

        let primary = match self.settings.primary.fit(&scaled) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to fit {}: {}", self.settings.primary.as_str(), e);
                return false;
            }
        };
        let secondary = match self.settings.secondary.fit(&scaled) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to fit {}: {}", self.settings.secondary.as_str(), e);
                return false;
            }
        };

        let fresh = Arc::new(TrainedState {
            standardizer,
            primary,
            secondary,
            trained_at: Instant::now(),
        });
        {
            let mut state = self.state.lock();
            *state = Some(fresh);
            self.train_count.fetch_add(1, Ordering::SeqCst);
        }

        info!(
            "Models trained on {} samples, {} features, diversity={}",
            rows.len(),
            FEATURE_DIM,
            if diverse { "OK" } else { "LOW" }
        );
        true
    }

    pub fn predict(&self, x: &FeatureVector) -> Prediction {
        let Some(state) = self.state.lock().clone() else {
            return Prediction::untrained();
        };

        let scaled = state.standardizer.transform(x);
        let primary_verdict = state.primary.predict(&scaled);
        let secondary_verdict = state.secondary.predict(&scaled);
        let primary_raw = state.primary.score(&scaled);
        let secondary_raw = state.secondary.score(&scaled);

        let w = self.settings.primary_weight;
        let composite =
            w * normalize_score(primary_raw) + (1.0 - w) * normalize_score(secondary_raw);

        Prediction {
            level: AlertLevel::from_verdicts(primary_verdict, secondary_verdict),
            composite,
            primary_raw,
            secondary_raw,
            primary_verdict,
            secondary_verdict,
        }
    }

    /// Buffers a vector scored NORMAL; the oldest entry is evicted at capacity.
    /// Vectors with non-finite components are never buffered.
    pub fn add_normal_sample(&self, x: FeatureVector) {
        if !is_finite(&x) {
            debug!("Dropping non-finite vector from retrain buffer");
            return;
        }
        let mut buf = self.retrain_buf.lock();
        if buf.len() >= self.settings.buffer_capacity {
            buf.pop_front();
        }
        buf.push_back(x);
    }

    /// Cheap check for whether `maybe_retrain` would fit right now.
    pub fn retrain_due(&self) -> bool {
        let trained_at = match self.state.lock().as_ref() {
            Some(state) => state.trained_at,
            None => return false,
        };
        trained_at.elapsed() >= self.settings.retrain_interval
            && self.retrain_buffer_len() >= MIN_RETRAIN_SAMPLES
    }

    /// Retrains on the buffered normals when the interval has elapsed and
    /// enough have accumulated. The buffer is drained, not merged, so each
    /// cycle forgets the previous training set.
    pub fn maybe_retrain(&self) -> bool {
        if !self.retrain_due() {
            return false;
        }
        let rows: Vec<FeatureVector> = {
            let mut buf = self.retrain_buf.lock();
            if buf.len() < MIN_RETRAIN_SAMPLES {
                return false;
            }
            buf.drain(..).collect()
        };
        info!("Periodic retraining on {} recent normal samples", rows.len());
        self.train(&rows)
    }
}

/// Maps a raw model score (positive = inlier) to [0, 1], 1 = most anomalous.
/// A non-finite score counts as fully anomalous.
pub fn normalize_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 1.0;
    }
    1.0 / (1.0 + raw.exp())
}

fn is_finite(x: &FeatureVector) -> bool {
    x.iter().all(|v| v.is_finite())
}

/// Warns about training data that is degenerate or too uniform. Advisory:
/// returns false when a warning was issued but never prevents training.
fn check_diversity(rows: &[FeatureVector]) -> bool {
    let n = rows.len() as f64;
    let mut mean = [0.0; FEATURE_DIM];
    for row in rows {
        for j in 0..FEATURE_DIM {
            mean[j] += row[j] / n;
        }
    }
    let mut std = [0.0; FEATURE_DIM];
    for j in 0..FEATURE_DIM {
        std[j] = (rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / n).sqrt();
    }

    let mut ok = true;
    let flat: Vec<&str> = (0..FEATURE_DIM)
        .filter(|&j| std[j] < 1e-10)
        .map(|j| FEATURE_NAMES[j])
        .collect();
    if !flat.is_empty() {
        warn!("Low-diversity features ({}): {}", flat.len(), flat.join(", "));
        warn!("Consider running diverse workloads during learning phase");
        ok = false;
    }

    let low_cv = (0..FEATURE_DIM)
        .filter(|&j| {
            let cv = if mean[j].abs() > 1e-12 { std[j] / mean[j].abs() } else { 0.0 };
            cv < 0.01
        })
        .count();
    if low_cv > FEATURE_DIM / 2 {
        warn!(
            "{}/{} features have CV < 0.01, training data may be too uniform",
            low_cv, FEATURE_DIM
        );
        ok = false;
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_score_is_monotone_decreasing() {
        assert!((normalize_score(0.0) - 0.5).abs() < 1e-12);
        assert!(normalize_score(-2.0) > normalize_score(2.0));
        assert_eq!(normalize_score(-1000.0), 1.0);
        assert_eq!(normalize_score(1000.0), 0.0);
    }

    #[test]
    fn non_finite_score_normalizes_to_one() {
        assert_eq!(normalize_score(f64::NAN), 1.0);
        assert_eq!(normalize_score(f64::INFINITY), 1.0);
        assert_eq!(normalize_score(f64::NEG_INFINITY), 1.0);
    }

    #[test]
    fn constant_matrix_is_flagged_low_diversity() {
        let rows = vec![[1.0; FEATURE_DIM]; 60];
        assert!(!check_diversity(&rows));
    }

    #[test]
    fn varied_matrix_passes_diversity() {
        let rows: Vec<FeatureVector> = (0..60)
            .map(|i| {
                let mut r = [0.0; FEATURE_DIM];
                for (j, v) in r.iter_mut().enumerate() {
                    *v = 1.0 + ((i * (j + 3)) % 17) as f64;
                }
                r
            })
            .collect();
        assert!(check_diversity(&rows));
    }

    #[test]
    fn weight_is_clamped_into_unit_range() {
        let mut config = Config::default();
        config.ensemble.primary_weight = 1.7;
        assert_eq!(DetectorSettings::try_from(&config).unwrap().primary_weight, 1.0);
    }

    #[test]
    fn unrepresentable_interval_is_a_config_error() {
        for secs in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            let mut config = Config::default();
            config.retrain.interval_secs = secs;
            assert!(matches!(
                DetectorSettings::try_from(&config),
                Err(GuardianError::InvalidConfig(_))
            ));
        }
    }
}
