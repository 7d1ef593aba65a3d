//! Diagonal elliptic envelope: distance from the training centroid in units
//! of per-feature spread, thresholded at the (1 - nu) training quantile.

use super::{percentile, OutlierModel};
use crate::features::{FeatureVector, FEATURE_DIM};

#[derive(Debug, Clone)]
pub struct EllipticParams {
    /// Upper bound on the share of training points left outside the envelope.
    pub nu: f64,
}

impl Default for EllipticParams {
    fn default() -> Self {
        Self { nu: 0.01 }
    }
}

#[derive(Debug, Clone)]
pub struct EllipticEnvelope {
    center: FeatureVector,
    inv_var: FeatureVector,
    radius: f64,
}

impl EllipticEnvelope {
    pub fn fit(rows: &[FeatureVector], params: EllipticParams) -> Self {
        let n = rows.len().max(1) as f64;
        let mut center = [0.0; FEATURE_DIM];
        for row in rows {
            for j in 0..FEATURE_DIM {
                center[j] += row[j] / n;
            }
        }
        let mut inv_var = [0.0; FEATURE_DIM];
        for j in 0..FEATURE_DIM {
            let var = rows.iter().map(|r| (r[j] - center[j]).powi(2)).sum::<f64>() / n;
            // constant features carry no shape information
            inv_var[j] = if var > 1e-12 { 1.0 / var } else { 0.0 };
        }

        let mut model = Self { center, inv_var, radius: 0.0 };
        let mut distances: Vec<f64> = rows.iter().map(|r| model.distance(r)).collect();
        if !distances.is_empty() {
            model.radius = percentile(&mut distances, 100.0 * (1.0 - params.nu));
        }
        model
    }

    fn distance(&self, x: &FeatureVector) -> f64 {
        (0..FEATURE_DIM)
            .map(|j| (x[j] - self.center[j]).powi(2) * self.inv_var[j])
            .sum::<f64>()
            .sqrt()
    }
}

impl OutlierModel for EllipticEnvelope {
    fn score(&self, x: &FeatureVector) -> f64 {
        self.radius - self.distance(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;

    #[test]
    fn centroid_is_inlier_and_far_point_is_outlier() {
        let rows: Vec<FeatureVector> = (0..200)
            .map(|i| {
                let mut r = [0.0; FEATURE_DIM];
                r[0] = (i % 10) as f64;
                r[1] = (i % 7) as f64;
                r
            })
            .collect();
        let env = EllipticEnvelope::fit(&rows, EllipticParams::default());
        let mut center = [0.0; FEATURE_DIM];
        center[0] = 4.5;
        center[1] = 3.0;
        assert_eq!(env.predict(&center), Verdict::Inlier);

        let mut far = center;
        far[0] = 100.0;
        assert_eq!(env.predict(&far), Verdict::Outlier);
        assert!(env.score(&far) < env.score(&center));
    }
}
