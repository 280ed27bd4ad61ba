//! Capture-and-detect worker.
//!
//! Runs on its own thread: pulls frames from the camera source, runs the
//! detector, converts frames to display order, and pushes results into the
//! bounded channel. Cancellation is cooperative via the shared stop flag,
//! observed once per loop iteration.
//!
//! Lifecycle: the worker receives an already-connected source from the
//! pipeline controller and moves through `Streaming -> Stopped`, with a
//! terminal `Failed` when reads keep failing past the retry bound. The
//! source is released exactly once on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::channel::{FrameSender, PushOutcome, ResultPacket};
use crate::detect::{DetectorBackend, Inference, Summary};
use crate::ingest::CameraSource;
use crate::pipeline::ConfidenceCell;

/// How the worker left its streaming loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stop flag observed, or the consumer went away.
    Stopped,
    /// Warm-up failed or the read retry bound was exhausted.
    Failed,
}

/// Loop bounds for one worker instance. Not user-tunable at runtime.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// Pacing target; ~33ms caps the loop at ~30 FPS.
    pub frame_interval: Duration,
    /// Consecutive read failures tolerated before declaring `Failed`.
    pub max_read_retries: u32,
    /// Pause between read retries.
    pub read_retry_delay: Duration,
    /// Interval between periodic source health/stats log lines.
    pub health_log_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            max_read_retries: 30,
            read_retry_delay: Duration::from_millis(100),
            health_log_interval: Duration::from_secs(10),
        }
    }
}

pub(crate) struct CaptureWorker {
    source: CameraSource,
    backend: Box<dyn DetectorBackend>,
    tx: FrameSender,
    stop: Arc<AtomicBool>,
    confidence: ConfidenceCell,
    settings: WorkerSettings,
    consecutive_read_failures: u32,
    frames_produced: u64,
}

impl CaptureWorker {
    /// Spawn the worker thread. The source must already be connected.
    pub(crate) fn spawn(
        source: CameraSource,
        backend: Box<dyn DetectorBackend>,
        tx: FrameSender,
        stop: Arc<AtomicBool>,
        confidence: ConfidenceCell,
        settings: WorkerSettings,
    ) -> Result<JoinHandle<WorkerExit>> {
        let worker = Self {
            source,
            backend,
            tx,
            stop,
            confidence,
            settings,
            consecutive_read_failures: 0,
            frames_produced: 0,
        };
        let handle = thread::Builder::new()
            .name("camdash-capture".to_string())
            .spawn(move || worker.run())?;
        Ok(handle)
    }

    fn run(mut self) -> WorkerExit {
        let exit = self.stream();
        self.source.close();
        match exit {
            WorkerExit::Stopped => log::info!(
                "capture worker stopped after {} frames ({} dropped to backpressure)",
                self.frames_produced,
                self.tx.dropped()
            ),
            WorkerExit::Failed => log::error!(
                "capture worker failed after {} frames",
                self.frames_produced
            ),
        }
        exit
    }

    fn stream(&mut self) -> WorkerExit {
        if let Err(e) = self.backend.warm_up() {
            log::error!("detector backend '{}' warm-up failed: {e:#}", self.backend.name());
            return WorkerExit::Failed;
        }
        log::info!(
            "streaming from {} through '{}' backend",
            self.source.stats().url,
            self.backend.name()
        );

        let mut last_health_log = Instant::now();
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return WorkerExit::Stopped;
            }
            // Checked at the top of the loop so health still gets reported
            // while a read-failure streak is being retried.
            if last_health_log.elapsed() >= self.settings.health_log_interval {
                self.log_health();
                last_health_log = Instant::now();
            }
            let iteration_start = Instant::now();

            let frame = match self.source.next_frame() {
                Ok(frame) => {
                    self.consecutive_read_failures = 0;
                    frame
                }
                Err(e) => {
                    // Missed frames are transient; retry up to the bound.
                    self.consecutive_read_failures += 1;
                    if self.consecutive_read_failures >= self.settings.max_read_retries {
                        log::error!(
                            "giving up after {} consecutive read failures: {e:#}",
                            self.consecutive_read_failures
                        );
                        return WorkerExit::Failed;
                    }
                    log::debug!(
                        "frame read failed (attempt {}): {e:#}",
                        self.consecutive_read_failures
                    );
                    thread::sleep(self.settings.read_retry_delay);
                    continue;
                }
            };

            // Threshold is sampled every iteration so the operator can
            // adjust it without restarting the worker.
            let confidence = self.confidence.get();
            let packet = match self.backend.infer(frame, confidence) {
                Inference::Detected {
                    frame,
                    detections,
                    summary,
                } => ResultPacket {
                    frame: frame.into_display_order(),
                    detections,
                    summary,
                },
                Inference::Degraded { frame, reason } => {
                    log::warn!("detection degraded, showing raw frame: {reason}");
                    ResultPacket {
                        frame: frame.into_display_order(),
                        detections: Vec::new(),
                        summary: Summary::empty(),
                    }
                }
            };

            match self.tx.push(packet) {
                PushOutcome::Delivered => {}
                PushOutcome::DroppedOldest => {
                    log::debug!("display is behind; dropped oldest queued frame");
                }
                PushOutcome::Disconnected => {
                    log::info!("display endpoint gone, stopping capture");
                    return WorkerExit::Stopped;
                }
            }
            self.frames_produced += 1;

            if let Some(remaining) = self
                .settings
                .frame_interval
                .checked_sub(iteration_start.elapsed())
            {
                thread::sleep(remaining);
            }
        }
    }

    fn log_health(&self) {
        let stats = self.source.stats();
        if self.source.is_healthy() {
            log::info!(
                "camera healthy: {} frames captured from {} ({} dropped to backpressure)",
                stats.frames_captured,
                stats.url,
                self.tx.dropped()
            );
        } else {
            log::warn!("camera unhealthy: no recent frames from {}", stats.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{frame_channel, PopResult};
    use crate::detect::StubBackend;
    use crate::frame::Frame;
    use crate::ingest::CameraConfig;

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn infer(&mut self, frame: Frame, _confidence: f32) -> Inference {
            Inference::Degraded {
                frame,
                reason: "inference blew up".to_string(),
            }
        }
    }

    fn connected_source(url: &str) -> CameraSource {
        let mut source = CameraSource::new(CameraConfig {
            url: url.to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        })
        .unwrap();
        source.connect().unwrap();
        source
    }

    fn fast_settings() -> WorkerSettings {
        WorkerSettings {
            frame_interval: Duration::from_millis(1),
            max_read_retries: 3,
            read_retry_delay: Duration::from_millis(1),
            health_log_interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn produces_display_order_packets_until_stopped() {
        let (tx, rx) = frame_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam"),
            Box::new(StubBackend::new()),
            tx,
            Arc::clone(&stop),
            ConfidenceCell::new(0.0),
            fast_settings(),
        )
        .unwrap();

        let packet = match rx.pop(Duration::from_secs(2)) {
            PopResult::Packet(p) => p,
            other => panic!("expected packet, got {:?}", other),
        };
        assert_eq!(packet.frame.order(), crate::frame::ColorOrder::Rgb);
        assert_eq!(packet.summary, Summary::from_detections(&packet.detections));

        stop.store(true, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), WorkerExit::Stopped);
    }

    #[test]
    fn detector_failure_falls_back_to_raw_frame() {
        let (tx, rx) = frame_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam"),
            Box::new(FailingBackend),
            tx,
            Arc::clone(&stop),
            ConfidenceCell::new(0.5),
            fast_settings(),
        )
        .unwrap();

        for _ in 0..3 {
            match rx.pop(Duration::from_secs(2)) {
                PopResult::Packet(p) => {
                    assert!(p.detections.is_empty());
                    assert_eq!(p.summary, Summary::empty());
                    assert_eq!(p.frame.order(), crate::frame::ColorOrder::Rgb);
                }
                other => panic!("worker stopped on detector failure: {:?}", other),
            }
        }

        stop.store(true, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), WorkerExit::Stopped);
    }

    #[test]
    fn transient_read_failures_are_retried() {
        let (tx, rx) = frame_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam?fail_every=2"),
            Box::new(StubBackend::new()),
            tx,
            Arc::clone(&stop),
            ConfidenceCell::new(0.0),
            fast_settings(),
        )
        .unwrap();

        // Every second read errors; the worker must keep producing anyway.
        for _ in 0..4 {
            assert!(matches!(
                rx.pop(Duration::from_secs(2)),
                PopResult::Packet(_)
            ));
        }

        stop.store(true, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), WorkerExit::Stopped);
    }

    #[test]
    fn exhausted_read_retries_fail_the_worker() {
        let (tx, rx) = frame_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam?fail_after=1"),
            Box::new(StubBackend::new()),
            tx,
            stop,
            ConfidenceCell::new(0.0),
            fast_settings(),
        )
        .unwrap();

        assert!(matches!(
            rx.pop(Duration::from_secs(2)),
            PopResult::Packet(_)
        ));
        assert_eq!(handle.join().unwrap(), WorkerExit::Failed);
        // Producer gone: the receiver observes disconnect, not a hang.
        assert!(matches!(
            rx.pop(Duration::from_secs(1)),
            PopResult::Disconnected
        ));
    }

    #[test]
    fn health_reporting_runs_alongside_streaming() {
        let (tx, rx) = frame_channel(5);
        let stop = Arc::new(AtomicBool::new(false));
        // A tiny interval forces the health path on (nearly) every
        // iteration, including ones spent retrying failed reads.
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam?fail_every=2"),
            Box::new(StubBackend::new()),
            tx,
            Arc::clone(&stop),
            ConfidenceCell::new(0.0),
            WorkerSettings {
                health_log_interval: Duration::from_millis(1),
                ..fast_settings()
            },
        )
        .unwrap();

        for _ in 0..4 {
            assert!(matches!(
                rx.pop(Duration::from_secs(2)),
                PopResult::Packet(_)
            ));
        }

        stop.store(true, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), WorkerExit::Stopped);
    }

    #[test]
    fn worker_exits_when_consumer_drops() {
        let (tx, rx) = frame_channel(2);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CaptureWorker::spawn(
            connected_source("stub://cam"),
            Box::new(StubBackend::new()),
            tx,
            stop,
            ConfidenceCell::new(0.0),
            fast_settings(),
        )
        .unwrap();

        drop(rx);
        assert_eq!(handle.join().unwrap(), WorkerExit::Stopped);
    }
}
