//! Outlier-scoring models consumed by the ensemble detector

pub mod elliptic;
pub mod isolation_forest;
pub mod standardizer;

pub use elliptic::EllipticEnvelope;
pub use isolation_forest::IsolationForest;
pub use standardizer::Standardizer;

use crate::error::{GuardianError, Result};
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Inlier,
    Outlier,
}

/// A fitted outlier model. Scores follow one convention across families:
/// positive is inside the learned region, negative is outside, 0 is the
/// decision boundary.
pub trait OutlierModel: Send + Sync {
    /// A non-finite score is an outlier.
    fn predict(&self, x: &FeatureVector) -> Verdict {
        let score = self.score(x);
        if score.is_finite() && score >= 0.0 {
            Verdict::Inlier
        } else {
            Verdict::Outlier
        }
    }

    fn score(&self, x: &FeatureVector) -> f64;
}

/// Model family, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    EllipticEnvelope,
}

impl ModelKind {
    pub fn fit(self, rows: &[FeatureVector]) -> Result<Box<dyn OutlierModel>> {
        if rows.is_empty() {
            return Err(GuardianError::Model("cannot fit on an empty matrix".into()));
        }
        Ok(match self {
            ModelKind::IsolationForest => Box::new(IsolationForest::fit(rows, Default::default())),
            ModelKind::EllipticEnvelope => {
                Box::new(EllipticEnvelope::fit(rows, Default::default()))
            }
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::IsolationForest => "isolation_forest",
            ModelKind::EllipticEnvelope => "elliptic_envelope",
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100]. `values` must be non-empty.
pub(crate) fn percentile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}
