//! Connection helpers for the CLI shell.
//!
//! None of this is part of the pipeline: local-IP discovery, preset URL
//! patterns for common phone webcam apps, and a one-shot connection test
//! used by `camdash test`.

use std::net::UdpSocket;

use anyhow::{Context, Result};

use crate::ingest::{CameraConfig, CameraSource};

/// Best-effort local LAN IP (e.g. 192.168.x.x), for showing the operator
/// which network the dashboard is on. Falls back to loopback.
///
/// The socket is never written to; connecting a UDP socket just selects
/// the outbound interface.
pub fn local_ip() -> String {
    let fallback = "127.0.0.1".to_string();
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0") else {
        return fallback;
    };
    if socket.connect("8.8.8.8:80").is_err() {
        return fallback;
    }
    match socket.local_addr() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => fallback,
    }
}

/// Common URL patterns for phone webcam apps, for a phone at `ip`.
pub fn preset_urls(ip: &str) -> Vec<(String, String)> {
    vec![
        (
            "DroidCam WiFi".to_string(),
            format!("http://{ip}:4747/video"),
        ),
        (
            "DroidCam alternative port".to_string(),
            format!("http://{ip}:4748/video"),
        ),
        ("IP Webcam".to_string(), format!("http://{ip}:8080/video")),
    ]
}

/// Open the camera, read one frame, and close again.
///
/// Returns a short human-readable success message with the frame size;
/// failures come back as errors for the caller to report.
pub fn test_connection(config: CameraConfig) -> Result<String> {
    let url = config.url.clone();
    let mut source = CameraSource::new(config)?;
    source
        .connect()
        .with_context(|| format!("cannot open video stream {url}"))?;
    let frame = source
        .next_frame()
        .context("cannot read frame from stream")?;
    source.close();
    Ok(format!(
        "connection successful - frame size: {}x{}",
        frame.width(),
        frame.height()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_urls_cover_known_apps() {
        let presets = preset_urls("192.168.1.50");
        assert_eq!(presets.len(), 3);
        assert!(presets
            .iter()
            .any(|(_, url)| url == "http://192.168.1.50:4747/video"));
        assert!(presets
            .iter()
            .any(|(_, url)| url == "http://192.168.1.50:8080/video"));
    }

    #[test]
    fn local_ip_is_always_some_address() {
        let ip = local_ip();
        assert!(ip.parse::<std::net::IpAddr>().is_ok());
    }

    #[test]
    fn test_connection_succeeds_against_stub() {
        let message = test_connection(CameraConfig {
            url: "stub://cam".to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        })
        .unwrap();
        assert!(message.contains("640x480"));
    }

    #[test]
    fn test_connection_reports_open_failure() {
        let err = test_connection(CameraConfig {
            url: "stub://cam?connect=fail".to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot open video stream"));
    }
}
