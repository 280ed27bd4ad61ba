use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ingest::CameraConfig;

const DEFAULT_CAMERA_URL: &str = "http://192.168.1.100:4747/video";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_SHOW_INFO: bool = true;

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence: Option<f32>,
    show_info: Option<bool>,
}

/// Detection settings the operator can adjust.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub confidence: f32,
    pub show_info: bool,
}

/// Resolved dashboard configuration: defaults, overlaid by the TOML file
/// named in `CAMDASH_CONFIG`, overlaid by `CAMDASH_*` env vars.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub camera: CameraConfig,
    pub detection: DetectionSettings,
}

impl DashboardConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMDASH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DashboardConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let detection_file = file.detection.unwrap_or_default();
        let camera = CameraConfig {
            url: camera_file
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            connect_timeout: Duration::from_secs(
                camera_file
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            read_timeout: Duration::from_secs(
                camera_file
                    .read_timeout_secs
                    .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            ),
        };
        let detection = DetectionSettings {
            confidence: detection_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            show_info: detection_file.show_info.unwrap_or(DEFAULT_SHOW_INFO),
        };
        Self { camera, detection }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CAMDASH_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(fps) = std::env::var("CAMDASH_TARGET_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("CAMDASH_TARGET_FPS must be an integer"))?;
            self.camera.target_fps = fps;
        }
        if let Ok(confidence) = std::env::var("CAMDASH_CONFIDENCE") {
            let confidence: f32 = confidence
                .parse()
                .map_err(|_| anyhow!("CAMDASH_CONFIDENCE must be a number in [0, 1]"))?;
            self.detection.confidence = confidence;
        }
        if let Ok(show_info) = std::env::var("CAMDASH_SHOW_INFO") {
            self.detection.show_info = match show_info.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => return Err(anyhow!("CAMDASH_SHOW_INFO must be a boolean, got '{other}'")),
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.confidence) {
            return Err(anyhow!(
                "confidence must be in [0, 1], got {}",
                self.detection.confidence
            ));
        }
        if self.camera.target_fps > 120 {
            return Err(anyhow!(
                "target_fps {} is out of range (max 120)",
                self.camera.target_fps
            ));
        }
        if self.camera.connect_timeout.is_zero() {
            return Err(anyhow!("connect timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DashboardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
