use crate::features::{FeatureVector, FEATURE_DIM};

/// Per-feature zero-mean / unit-variance scaling fitted on a training matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    mean: FeatureVector,
    scale: FeatureVector,
}

impl Standardizer {
    /// Features with (near) zero variance keep a scale of 1.
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; FEATURE_DIM];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; FEATURE_DIM];
        for row in rows {
            for j in 0..FEATURE_DIM {
                scale[j] += (row[j] - mean[j]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std < 1e-12 { 1.0 } else { std };
        }
        Self { mean, scale }
    }

    pub fn transform(&self, x: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_DIM];
        for j in 0..FEATURE_DIM {
            out[j] = (x[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform_all(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
