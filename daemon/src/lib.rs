//! CPU Guardian detection engine
//!
//! Consumes fixed-width performance-counter samples over a Unix datagram
//! socket, turns them into rolling-window features, and scores them with a
//! two-model outlier ensemble that is periodically retrained on recent
//! normal traffic.

pub mod alert;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod protocol;
pub mod socket;

pub use error::{GuardianError, Result};
