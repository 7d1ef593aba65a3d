//! Alert output: JSON lines on stdout, optionally appended to a log file

use crate::alert::Alert;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    log_file: Option<PathBuf>,
}

impl Notifier {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self { log_file }
    }

    /// Writes one alert line. Output failures are swallowed; returns the
    /// line that was produced.
    pub fn send(&self, alert: &Alert) -> Option<String> {
        let line = match serde_json::to_string(alert) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize alert: {}", e);
                return None;
            }
        };

        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();

        if let Some(path) = &self.log_file {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", line);
            }
        }
        Some(line)
    }
}
