//! Alert classification and structured alert records

use crate::detector::Prediction;
use crate::features::FeatureVector;
use crate::model::Verdict;
use serde::{Deserialize, Serialize};

/// Deviation, in rolling standard deviations, that counts as a spike.
const SPIKE_SIGMA: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn from_verdicts(primary: Verdict, secondary: Verdict) -> Self {
        match (primary, secondary) {
            (Verdict::Outlier, Verdict::Outlier) => AlertLevel::Critical,
            (Verdict::Outlier, _) | (_, Verdict::Outlier) => AlertLevel::Warning,
            _ => AlertLevel::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "NORMAL",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Both,
    Single,
    None,
}

impl From<AlertLevel> for Agreement {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Critical => Agreement::Both,
            AlertLevel::Warning => Agreement::Single,
            AlertLevel::Normal => Agreement::None,
        }
    }
}

/// One alert as written to the output stream. Key names are part of the
/// output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub timestamp: u64,
    pub anomaly_score: f64,
    pub reason: String,
    pub model_agreement: Agreement,
    #[serde(rename = "if_score")]
    pub primary_score: f64,
    #[serde(rename = "svm_score")]
    pub secondary_score: f64,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn deviation(current: f64, mean: f64, std: f64, floor: f64) -> f64 {
    let std = if std > 1e-12 { std } else { floor };
    (current - mean) / std
}

/// Names the metrics that deviate from their own rolling window. A rise in
/// IPC is never reported; only a collapse is.
pub fn classify_reason(x: &FeatureVector) -> String {
    let mut parts = Vec::new();
    if deviation(x[0], x[3], x[6], 1e-6) > SPIKE_SIGMA {
        parts.push("cache_miss_spike");
    }
    if deviation(x[1], x[4], x[7], 1e-6) > SPIKE_SIGMA {
        parts.push("branch_miss_spike");
    }
    if deviation(x[2], x[5], x[8], 0.01) < -SPIKE_SIGMA {
        parts.push("ipc_collapse");
    }
    if parts.is_empty() {
        parts.push("ensemble_anomaly");
    }
    parts.join(" ")
}

pub fn build_alert(prediction: &Prediction, timestamp_ns: u64, reason: String) -> Alert {
    Alert {
        level: prediction.level,
        timestamp: timestamp_ns,
        anomaly_score: round4(prediction.composite),
        reason,
        model_agreement: prediction.level.into(),
        primary_score: round4(prediction.primary_raw),
        secondary_score: round4(prediction.secondary_raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(current: [f64; 3], mean: [f64; 3], std: [f64; 3]) -> FeatureVector {
        let mut x = [0.0; 14];
        x[0..3].copy_from_slice(&current);
        x[3..6].copy_from_slice(&mean);
        x[6..9].copy_from_slice(&std);
        x
    }

    #[test]
    fn no_deviation_falls_back_to_ensemble_anomaly() {
        let x = vector([0.1, 0.05, 1.0], [0.1, 0.05, 1.0], [0.01, 0.01, 0.1]);
        assert_eq!(classify_reason(&x), "ensemble_anomaly");
    }

    #[test]
    fn tags_combine_in_fixed_order() {
        let x = vector([0.5, 0.5, 0.1], [0.1, 0.05, 1.0], [0.01, 0.01, 0.1]);
        assert_eq!(classify_reason(&x), "cache_miss_spike branch_miss_spike ipc_collapse");
    }

    #[test]
    fn ipc_surge_is_not_a_reason() {
        let x = vector([0.1, 0.05, 5.0], [0.1, 0.05, 1.0], [0.01, 0.01, 0.1]);
        assert_eq!(classify_reason(&x), "ensemble_anomaly");
    }

    #[test]
    fn zero_std_uses_floor() {
        // ipc floor is 0.01, so a drop of 0.05 is five deviations
        let x = vector([0.1, 0.05, 0.95], [0.1, 0.05, 1.0], [0.0, 0.0, 0.0]);
        assert_eq!(classify_reason(&x), "ipc_collapse");
    }

    #[test]
    fn level_follows_verdicts() {
        use Verdict::*;
        assert_eq!(AlertLevel::from_verdicts(Outlier, Outlier), AlertLevel::Critical);
        assert_eq!(AlertLevel::from_verdicts(Outlier, Inlier), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_verdicts(Inlier, Outlier), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_verdicts(Inlier, Inlier), AlertLevel::Normal);
    }

    #[test]
    fn round4_rounds_half_away_from_zero() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(-1.000_04), -1.0);
    }
}
