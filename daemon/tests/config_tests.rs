use guardian_daemon::config::Config;
use guardian_daemon::model::ModelKind;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.listener.socket_path, PathBuf::from("/tmp/cpu-guardian.sock"));
    assert_eq!(config.learning.samples, 5000);
    assert_eq!(config.retrain.interval_secs, 300.0);
    assert_eq!(config.retrain.buffer_capacity, 10_000);
    assert_eq!(config.ensemble.primary, ModelKind::IsolationForest);
    assert_eq!(config.ensemble.primary_weight, 0.6);
    assert!(config.output.log_file.is_none());
    assert!(!config.output.verbose);
}

#[test]
fn test_load_from_toml() {
    let toml_content = r#"
[listener]
socket_path = "/run/guardian/test.sock"

[learning]
samples = 800

[retrain]
interval_secs = 30.5
buffer_capacity = 2000

[ensemble]
primary = "elliptic_envelope"
secondary = "isolation_forest"
primary_weight = 0.5

[output]
log_file = "/var/log/guardian.log"
verbose = true
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.listener.socket_path, PathBuf::from("/run/guardian/test.sock"));
    assert_eq!(config.learning.samples, 800);
    assert_eq!(config.retrain.interval_secs, 30.5);
    assert_eq!(config.ensemble.primary, ModelKind::EllipticEnvelope);
    assert_eq!(config.ensemble.secondary, ModelKind::IsolationForest);
    assert_eq!(config.output.log_file, Some(PathBuf::from("/var/log/guardian.log")));
    assert!(config.output.verbose);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[learning]\nsamples = 100\n").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.learning.samples, 100);
    assert_eq!(config.retrain.buffer_capacity, 10_000);
}

#[test]
fn test_invalid_config_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[ensemble]\nprimary = \"random_forest\"\n").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_save_config() {
    let mut config = Config::default();
    config.retrain.interval_secs = 12.0;
    let file = NamedTempFile::new().unwrap();
    config.save(file.path()).unwrap();
    let loaded = Config::load(file.path()).unwrap();
    assert_eq!(loaded.retrain.interval_secs, 12.0);
    assert_eq!(loaded.ensemble.secondary, config.ensemble.secondary);
}

#[test]
fn test_infinite_retrain_interval_is_rejected() {
    use guardian_daemon::{detector::DetectorSettings, GuardianError};

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[retrain]\ninterval_secs = inf\n").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert!(config.retrain.interval_secs.is_infinite());
    assert!(matches!(
        DetectorSettings::try_from(&config),
        Err(GuardianError::InvalidConfig(_))
    ));
}
