//! Error types for the guardian daemon

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardianError {
    /// Datagram shorter than one wire record
    #[error("datagram too short: got {got} bytes, need {need}")]
    Decode { got: usize, need: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Option value that parses but cannot be used
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Model fitting failed or received unusable input
    #[error("model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, GuardianError>;
