//! Configuration resolution and graceful degradation tests
//!
//! Uses serial_test because the resolver reads NMON_CONFIG from the process
//! environment.

use nmon_common::config::{
    load_toml_or_default, ConfigResolver, Credentials, LoggingConfig, PathsConfig,
    CONFIG_ENV_VAR,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
struct BootstrapOnly {
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/nmon-from-env.toml");

    let resolver = ConfigResolver::new(Some(PathBuf::from("/tmp/nmon-from-cli.toml")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/nmon-from-cli.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/nmon-from-env.toml");

    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/nmon-from-env.toml"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = ConfigResolver::new(None).resolve();
    assert_ne!(resolved, PathBuf::from("   "));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config: BootstrapOnly =
        load_toml_or_default(&temp_dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(
        config.paths.model_path,
        PathBuf::from("/usr/local/lib/noise-monitor/models/modelfile.eim")
    );
}

#[test]
fn test_partial_file_keeps_remaining_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nmon.toml");
    std::fs::write(
        &path,
        "[paths]\nrecord_dir = \"/data/records\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config: BootstrapOnly = load_toml_or_default(&path).unwrap();
    assert_eq!(config.paths.record_dir, PathBuf::from("/data/records"));
    assert_eq!(
        config.paths.monitor_status_file,
        PathBuf::from("/usr/local/etc/noise-monitor/monitor_status")
    );
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nmon.toml");
    std::fs::write(&path, "[paths\nrecord_dir = ").unwrap();

    let result: nmon_common::Result<BootstrapOnly> = load_toml_or_default(&path);
    assert!(matches!(result, Err(nmon_common::Error::Config(_))));
}

#[test]
fn test_credentials_file_round_trip_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("adafruit-io");
    std::fs::write(
        &path,
        "ADAFRUIT_IO_USERNAME=\"maker\"\nADAFRUIT_IO_KEY=\"aio_abc\"\nADAFRUIT_IO_URL=\"https://io.adafruit.com/api/v2/maker/feeds/decibel/data\"\n",
    )
    .unwrap();

    let creds = Credentials::load(&path).unwrap();
    assert_eq!(creds.require("ADAFRUIT_IO_KEY").unwrap(), "aio_abc");
    assert!(creds.require("ADAFRUIT_IO_URL").unwrap().ends_with("/data"));
}

#[test]
fn test_missing_credentials_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let result = Credentials::load(&temp_dir.path().join("adafruit-io"));
    assert!(matches!(result, Err(nmon_common::Error::NotFound(_))));
}
