//! Configuration management (TOML)

use crate::error::Result;
use crate::model::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listener: ListenerConfig,
    pub learning: LearningConfig,
    pub retrain: RetrainConfig,
    pub ensemble: EnsembleConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Feature vectors to collect before the first fit.
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    pub interval_secs: f64,
    pub buffer_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub primary: ModelKind,
    pub secondary: ModelKind,
    /// Weight of the primary model in the composite score; the secondary
    /// model gets the remainder.
    pub primary_weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { socket_path: PathBuf::from("/tmp/cpu-guardian.sock") }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self { samples: 5000 }
    }
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self { interval_secs: 300.0, buffer_capacity: 10_000 }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            primary: ModelKind::IsolationForest,
            secondary: ModelKind::EllipticEnvelope,
            primary_weight: 0.6,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "cpu-guardian")
            .map(|dirs| dirs.config_dir().join("guardian.toml"))
            .unwrap_or_else(|| PathBuf::from("guardian.toml"))
    }
}
