//! Frame ingestion.
//!
//! This module provides `CameraSource`, the single frame source for the
//! pipeline:
//! - Phone IP webcams (DroidCam, IP Webcam) streaming MJPEG over HTTP
//! - Plain JPEG snapshot endpoints (re-fetched per frame)
//! - Synthetic `stub://` sources for tests and demos
//!
//! The ingestion layer is responsible for:
//! - Connecting with a bounded timeout
//! - Decoding JPEG frames in-memory into capture-order (BGR) `Frame`s
//! - Rate limiting / frame decimation to the configured target FPS
//!
//! Frames are handed off by ownership; the source retains nothing.

mod camera;

pub use camera::{CameraConfig, CameraSource, CameraStats};
