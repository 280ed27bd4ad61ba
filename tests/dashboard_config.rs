//! Configuration resolution tests: defaults, TOML file, env overrides.
//!
//! `DashboardConfig::load` reads process-wide environment variables, so
//! every test takes `ENV_LOCK` and starts from a clean slate.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use camdash::DashboardConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "CAMDASH_CONFIG",
    "CAMDASH_CAMERA_URL",
    "CAMDASH_TARGET_FPS",
    "CAMDASH_CONFIDENCE",
    "CAMDASH_SHOW_INFO",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let config = DashboardConfig::load().unwrap();
    assert_eq!(config.camera.url, "http://192.168.1.100:4747/video");
    assert_eq!(config.camera.target_fps, 30);
    assert_eq!(config.camera.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.camera.read_timeout, Duration::from_secs(5));
    assert_eq!(config.detection.confidence, 0.5);
    assert!(config.detection.show_info);
}

#[test]
fn config_file_overrides_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
[camera]
url = "http://10.0.0.9:8080/video"
target_fps = 15
connect_timeout_secs = 3
read_timeout_secs = 4

[detection]
confidence = 0.25
show_info = false
"#,
    );
    std::env::set_var("CAMDASH_CONFIG", file.path());

    let config = DashboardConfig::load().unwrap();
    assert_eq!(config.camera.url, "http://10.0.0.9:8080/video");
    assert_eq!(config.camera.target_fps, 15);
    assert_eq!(config.camera.connect_timeout, Duration::from_secs(3));
    assert_eq!(config.camera.read_timeout, Duration::from_secs(4));
    assert_eq!(config.detection.confidence, 0.25);
    assert!(!config.detection.show_info);
}

#[test]
fn env_overrides_beat_the_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
[camera]
url = "http://10.0.0.9:8080/video"

[detection]
confidence = 0.25
"#,
    );
    std::env::set_var("CAMDASH_CONFIG", file.path());
    std::env::set_var("CAMDASH_CAMERA_URL", "http://10.0.0.42:4747/video");
    std::env::set_var("CAMDASH_TARGET_FPS", "20");
    std::env::set_var("CAMDASH_CONFIDENCE", "0.75");
    std::env::set_var("CAMDASH_SHOW_INFO", "false");

    let config = DashboardConfig::load().unwrap();
    assert_eq!(config.camera.url, "http://10.0.0.42:4747/video");
    assert_eq!(config.camera.target_fps, 20);
    assert_eq!(config.detection.confidence, 0.75);
    assert!(!config.detection.show_info);
}

#[test]
fn partial_config_file_keeps_defaults_for_the_rest() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
[detection]
confidence = 0.9
"#,
    );
    std::env::set_var("CAMDASH_CONFIG", file.path());

    let config = DashboardConfig::load().unwrap();
    assert_eq!(config.camera.url, "http://192.168.1.100:4747/video");
    assert_eq!(config.camera.target_fps, 30);
    assert_eq!(config.detection.confidence, 0.9);
    assert!(config.detection.show_info);
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMDASH_CONFIG", "/nonexistent/camdash.toml");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn malformed_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMDASH_CONFIDENCE", "high");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("CAMDASH_CONFIDENCE"));
    clear_env();

    std::env::set_var("CAMDASH_TARGET_FPS", "fast");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("CAMDASH_TARGET_FPS"));
    clear_env();

    std::env::set_var("CAMDASH_SHOW_INFO", "maybe");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("CAMDASH_SHOW_INFO"));
}

#[test]
fn out_of_range_values_fail_validation() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMDASH_CONFIDENCE", "1.5");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("confidence must be in [0, 1]"));
    clear_env();

    std::env::set_var("CAMDASH_TARGET_FPS", "500");
    let err = DashboardConfig::load().unwrap_err();
    assert!(err.to_string().contains("out of range"));
}
