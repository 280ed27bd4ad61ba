use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use image::GenericImageView;
use url::Url;

use crate::frame::{ColorOrder, Frame, CHANNELS};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Stream URL. Supported schemes: http(s):// for MJPEG/JPEG,
    /// stub:// for a synthetic source.
    pub url: String,
    /// Target frame rate. The source decimates to this rate; 0 disables
    /// decimation.
    pub target_fps: u32,
    /// Bound on the initial connect, so an unreachable address cannot
    /// block indefinitely.
    pub connect_timeout: Duration,
    /// Bound on a single stream read.
    pub read_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.1.100:4747/video".to_string(),
            target_fps: 30,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Network camera frame source.
///
/// Wraps an MJPEG/JPEG HTTP stream, with a synthetic fallback for
/// `stub://` URLs. `open -> read* -> close`; `close` is idempotent and
/// releases the underlying stream exactly once.
pub struct CameraSource {
    backend: CameraBackend,
    closed: bool,
}

enum CameraBackend {
    Http(HttpCameraSource),
    Synthetic(SyntheticCameraSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse camera url")?;
        let backend = match url.scheme() {
            "http" | "https" => CameraBackend::Http(HttpCameraSource::new(config)),
            "stub" => CameraBackend::Synthetic(SyntheticCameraSource::new(config, &url)?),
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s) or stub",
                    other
                ))
            }
        };
        Ok(Self {
            backend,
            closed: false,
        })
    }

    /// Connect to the camera stream, bounded by the connect timeout.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Http(source) => source.connect(),
            CameraBackend::Synthetic(source) => source.connect(),
        }
    }

    /// Capture the next frame, decoded into capture order (BGR).
    pub fn next_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(anyhow!("camera source is closed"));
        }
        match &mut self.backend {
            CameraBackend::Http(source) => source.next_frame(),
            CameraBackend::Synthetic(source) => source.next_frame(),
        }
    }

    /// Release the stream. Safe to call more than once; only the first
    /// call releases anything.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match &mut self.backend {
            CameraBackend::Http(source) => source.close(),
            CameraBackend::Synthetic(source) => source.close(),
        }
        log::info!("camera source closed ({})", self.stats().url);
    }

    /// Check if the source is healthy (connected and recently producing).
    pub fn is_healthy(&self) -> bool {
        if self.closed {
            return false;
        }
        match &self.backend {
            CameraBackend::Http(source) => source.is_healthy(),
            CameraBackend::Synthetic(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Http(source) => source.stats(),
            CameraBackend::Synthetic(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// HTTP MJPEG / snapshot backend
// ----------------------------------------------------------------------------

struct HttpCameraSource {
    config: CameraConfig,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpCameraSource {
    fn new(config: CameraConfig) -> Self {
        let agent = ureq::builder()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self {
            config,
            agent,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .with_context(|| format!("connect to camera stream {}", self.config.url))?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(reader)));
        } else {
            // Snapshot endpoint: one JPEG per request, re-fetched per frame.
            self.stream = Some(HttpStream::SingleJpeg);
        }
        self.connected_at = Some(Instant::now());
        log::info!("connected to camera stream {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);
        loop {
            let jpeg_bytes = match stream {
                HttpStream::Mjpeg(stream) => stream.read_next_jpeg(),
                HttpStream::SingleJpeg => fetch_single_jpeg(&self.agent, &self.config.url),
            }?;

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let frame = decode_jpeg_bgr(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Ok(frame);
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Scan the multipart stream for the next complete JPEG (SOI..EOI).
    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg_bgr(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let (width, height) = image.dimensions();
    let mut pixels = image.into_rgb8().into_raw();
    // The capture side of the pipeline carries BGR.
    for pixel in pixels.chunks_exact_mut(CHANNELS) {
        pixel.swap(0, 2);
    }
    Frame::new(pixels, width, height, ColorOrder::Bgr)
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut start = None;
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == 0xFF && buffer[i + 1] == 0xD8 {
            start = Some(i);
            break;
        }
        i += 1;
    }
    let start = start?;
    let mut j = start + 2;
    while j + 1 < buffer.len() {
        if buffer[j] == 0xFF && buffer[j + 1] == 0xD9 {
            return Some((start, j + 2));
        }
        j += 1;
    }
    None
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

/// Failure behavior encoded in the stub URL query:
/// `stub://cam?connect=fail` fails connect, `stub://cam?fail_every=N`
/// errors every Nth read, `stub://cam?fail_after=N` errors all reads
/// after the first N.
struct SyntheticCameraSource {
    config: CameraConfig,
    connect_fails: bool,
    fail_every: Option<u64>,
    fail_after: Option<u64>,
    connected: bool,
    frame_count: u64,
    read_count: u64,
}

impl SyntheticCameraSource {
    fn new(config: CameraConfig, url: &Url) -> Result<Self> {
        let mut connect_fails = false;
        let mut fail_every = None;
        let mut fail_after = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect" => connect_fails = value == "fail",
                "fail_every" => {
                    fail_every = Some(value.parse().context("parse fail_every")?);
                }
                "fail_after" => {
                    fail_after = Some(value.parse().context("parse fail_after")?);
                }
                other => return Err(anyhow!("unknown stub camera option '{}'", other)),
            }
        }
        Ok(Self {
            config,
            connect_fails,
            fail_every,
            fail_after,
            connected: false,
            frame_count: 0,
            read_count: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        if self.connect_fails {
            return Err(anyhow!(
                "cannot open camera stream {} (synthetic connect failure)",
                self.config.url
            ));
        }
        self.connected = true;
        log::info!("connected to camera stream {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera source not connected; call connect() first"));
        }
        self.read_count += 1;
        if let Some(after) = self.fail_after {
            if self.read_count > after {
                return Err(anyhow!("no frame available (synthetic stream ended)"));
            }
        }
        if let Some(every) = self.fail_every {
            if every > 0 && self.read_count % every == 0 {
                return Err(anyhow!("no frame available (synthetic dropout)"));
            }
        }

        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, ColorOrder::Bgr)
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = SYNTHETIC_WIDTH as usize * SYNTHETIC_HEIGHT as usize * CHANNELS;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(url: &str) -> CameraConfig {
        CameraConfig {
            url: url.to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn rejects_unsupported_schemes() {
        assert!(CameraSource::new(stub_config("rtsp://camera/stream")).is_err());
        assert!(CameraSource::new(stub_config("not a url")).is_err());
    }

    #[test]
    fn synthetic_source_produces_bgr_frames() {
        let mut source = CameraSource::new(stub_config("stub://cam")).unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), SYNTHETIC_WIDTH);
        assert_eq!(frame.height(), SYNTHETIC_HEIGHT);
        assert_eq!(frame.order(), ColorOrder::Bgr);
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[test]
    fn read_before_connect_fails() {
        let mut source = CameraSource::new(stub_config("stub://cam")).unwrap();
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn synthetic_connect_failure() {
        let mut source = CameraSource::new(stub_config("stub://cam?connect=fail")).unwrap();
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
    }

    #[test]
    fn synthetic_dropout_every_nth_read() {
        let mut source = CameraSource::new(stub_config("stub://cam?fail_every=3")).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());
        assert!(source.next_frame().is_ok());
    }

    #[test]
    fn synthetic_stream_end_after_n_reads() {
        let mut source = CameraSource::new(stub_config("stub://cam?fail_after=2")).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn close_is_idempotent_and_stops_reads() {
        let mut source = CameraSource::new(stub_config("stub://cam")).unwrap();
        source.connect().unwrap();
        source.close();
        source.close();
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
    }

    #[test]
    fn finds_jpeg_bounds_in_multipart_noise() {
        let mut buffer = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        buffer.extend_from_slice(&[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9]);
        buffer.extend_from_slice(b"\r\n--boundary");
        let (start, end) = find_jpeg_bounds(&buffer).unwrap();
        assert_eq!(&buffer[start..start + 2], &[0xFF, 0xD8]);
        assert_eq!(&buffer[end - 2..end], &[0xFF, 0xD9]);
    }

    #[test]
    fn no_bounds_without_terminator() {
        let buffer = [0xFF, 0xD8, 0x01, 0x02];
        assert!(find_jpeg_bounds(&buffer).is_none());
    }
}
