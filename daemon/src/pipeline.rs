//! Ingestion loop: decode -> extract -> learn or detect -> emit

use crate::alert::{build_alert, classify_reason, Alert, AlertLevel};
use crate::config::Config;
use crate::detector::EnsembleDetector;
use crate::features::{FeatureExtractor, FeatureVector, ROLLING_WINDOW};
use crate::notifier::Notifier;
use crate::protocol::{decode, WIRE_SIZE};
use crate::socket::DatagramReceiver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const STATUS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Learning,
    Detection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub samples: u64,
    pub anomalies: u64,
}

pub struct IngestionLoop {
    extractor: FeatureExtractor,
    detector: Arc<EnsembleDetector>,
    notifier: Notifier,
    phase: Phase,
    learning: Vec<FeatureVector>,
    learning_target: usize,
    stats: LoopStats,
}

impl IngestionLoop {
    pub fn new(config: &Config, detector: Arc<EnsembleDetector>, notifier: Notifier) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            detector,
            notifier,
            phase: Phase::Learning,
            learning: Vec::new(),
            learning_target: config.learning.samples,
            stats: LoopStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn learning_len(&self) -> usize {
        self.learning.len()
    }

    pub fn detector(&self) -> &Arc<EnsembleDetector> {
        &self.detector
    }

    /// Processes one datagram. Undersized datagrams are dropped without
    /// touching any counter. Returns the alert, if one was emitted.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Option<Alert> {
        let sample = decode(bytes).ok()?;
        self.stats.samples += 1;

        let features = self.extractor.push(
            f64::from(sample.cache_miss_rate),
            f64::from(sample.branch_miss_rate),
            f64::from(sample.ipc),
        );

        match self.phase {
            Phase::Learning => {
                self.learn(features);
                None
            }
            Phase::Detection => {
                let alert = self.detect(sample.timestamp_ns, features);
                self.detector.maybe_retrain();
                alert
            }
        }
    }

    /// Periodic maintenance, run whenever a receive wait times out.
    pub fn tick(&self) {
        self.detector.maybe_retrain();
    }

    fn learn(&mut self, features: FeatureVector) {
        // skip vectors computed over a partially filled window
        if self.stats.samples > ROLLING_WINDOW as u64 {
            self.learning.push(features);
        }
        if self.learning.len() >= self.learning_target {
            info!("Learning complete: {} feature vectors collected", self.learning.len());
            let rows = std::mem::take(&mut self.learning);
            self.detector.train(&rows);
            self.phase = Phase::Detection;
            info!("Entering detection phase");
        }
    }

    fn detect(&mut self, timestamp_ns: u64, features: FeatureVector) -> Option<Alert> {
        let prediction = self.detector.predict(&features);

        if prediction.level == AlertLevel::Normal {
            self.detector.add_normal_sample(features);
            if self.stats.samples % STATUS_EVERY == 0 {
                debug!(
                    "Status: {} samples, {} anomalies, retrain_buf={}",
                    self.stats.samples,
                    self.stats.anomalies,
                    self.detector.retrain_buffer_len()
                );
            }
            return None;
        }

        self.stats.anomalies += 1;
        let reason = classify_reason(&features);
        let alert = build_alert(&prediction, timestamp_ns, reason);
        self.notifier.send(&alert);
        debug!(
            "[{}] score={:.4} primary={:.4} secondary={:.4} reason={}",
            alert.level.as_str(),
            prediction.composite,
            prediction.primary_raw,
            prediction.secondary_raw,
            alert.reason
        );
        Some(alert)
    }

    /// Runs until `cancel` fires. The token is only observed between
    /// receive waits, so shutdown takes at most one receive timeout. The
    /// receiver (and its socket file) is released when this returns.
    pub async fn run(
        &mut self,
        mut receiver: DatagramReceiver,
        cancel: CancellationToken,
    ) -> LoopStats {
        info!("Wire record size = {} bytes", WIRE_SIZE);
        info!("Entering learning phase (collecting {} samples)", self.learning_target);

        while !cancel.is_cancelled() {
            match receiver.recv().await {
                Ok(Some(bytes)) => {
                    self.handle_datagram(bytes);
                }
                Ok(None) => self.tick(),
                Err(e) => debug!("Receive error: {}", e),
            }
        }

        drop(receiver);
        info!(
            "Shutdown complete. total={}, anomalies={}",
            self.stats.samples, self.stats.anomalies
        );
        self.stats
    }
}
