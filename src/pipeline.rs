//! Session lifecycle.
//!
//! `PipelineController` owns the start/stop state machine. Each run gets a
//! fresh stop flag, channel, and confidence cell; nothing is reused across
//! runs, so a flag set by a previous stop can never strand a new worker.
//!
//! `stop` is a bounded join: it signals the worker, waits briefly for the
//! thread to finish, and returns to `Idle` either way. A worker that
//! overruns the window still observes the stop flag and terminates on its
//! own; it is never joined forcibly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::channel::{frame_channel, FrameReceiver, DEFAULT_CAPACITY};
use crate::detect::DetectorBackend;
use crate::ingest::{CameraConfig, CameraSource};
use crate::worker::{CaptureWorker, WorkerExit, WorkerSettings};

/// Pipeline run state. Exactly one instance, owned by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    StopRequested,
}

/// Live-updatable confidence threshold.
///
/// Single writer (controller/UI), single reader (worker). Reads may see a
/// slightly stale value; nothing stronger is needed.
#[derive(Clone, Debug)]
pub struct ConfidenceCell(Arc<AtomicU32>);

impl ConfidenceCell {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.clamp(0.0, 1.0).to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Fixed pipeline constants. The channel contract (capacity, drop policy)
/// is not user-tunable at runtime.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub channel_capacity: usize,
    pub worker: WorkerSettings,
    /// Bound on the wait for worker acknowledgement in `stop`.
    pub join_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CAPACITY,
            worker: WorkerSettings::default(),
            join_timeout: Duration::from_secs(2),
        }
    }
}

struct ActiveRun {
    stop: Arc<AtomicBool>,
    confidence: ConfidenceCell,
    handle: JoinHandle<WorkerExit>,
}

struct Inner {
    state: PipelineState,
    run: Option<ActiveRun>,
}

/// Start/stop coordinator. One worker/channel/stop-flag triple is live per
/// run; starting after a stop always constructs fresh instances.
pub struct PipelineController {
    settings: PipelineSettings,
    inner: Mutex<Inner>,
}

impl PipelineController {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                run: None,
            }),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Start a run: connect to the camera, spawn the capture worker, and
    /// hand back the consumer endpoint for the display loop.
    ///
    /// Rejected without side effects when a run is already active, the
    /// address is blank, or the camera cannot be opened.
    pub fn start(
        &self,
        camera: CameraConfig,
        confidence: f32,
        backend: Box<dyn DetectorBackend>,
    ) -> Result<FrameReceiver> {
        if camera.url.trim().is_empty() {
            return Err(anyhow!("camera address must not be empty"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "confidence threshold must be in [0, 1], got {confidence}"
            ));
        }

        if self.lock().state != PipelineState::Idle {
            return Err(anyhow!("pipeline is already running"));
        }

        // Connect on the caller's context so an unreachable address fails
        // here, bounded by the connect timeout, with no thread spawned. The
        // lock is not held across the connect: `stop()` and `state()` must
        // stay responsive while a slow address times out.
        let mut source = CameraSource::new(camera)?;
        if let Err(e) = source.connect() {
            return Err(e).context("cannot open camera stream");
        }

        let mut inner = self.lock();
        // Re-check: another start may have won the race while connecting.
        if inner.state != PipelineState::Idle {
            source.close();
            return Err(anyhow!("pipeline is already running"));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let cell = ConfidenceCell::new(confidence);
        let (tx, rx) = frame_channel(self.settings.channel_capacity);
        let handle = match CaptureWorker::spawn(
            source,
            backend,
            tx,
            Arc::clone(&stop),
            cell.clone(),
            self.settings.worker.clone(),
        ) {
            Ok(handle) => handle,
            Err(e) => return Err(e).context("spawn capture worker"),
        };

        inner.run = Some(ActiveRun {
            stop,
            confidence: cell,
            handle,
        });
        inner.state = PipelineState::Running;
        log::info!("pipeline started");
        Ok(rx)
    }

    /// Signal the worker to stop and wait (bounded) for it to finish.
    /// No-op when no run is active. Always leaves the state `Idle`.
    pub fn stop(&self) {
        let run = {
            let mut inner = self.lock();
            match inner.run.take() {
                Some(run) => {
                    run.stop.store(true, Ordering::Relaxed);
                    inner.state = PipelineState::StopRequested;
                    run
                }
                None => return,
            }
        };

        let deadline = Instant::now() + self.settings.join_timeout;
        while !run.handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        if run.handle.is_finished() {
            match run.handle.join() {
                Ok(exit) => log::info!("pipeline stopped ({exit:?})"),
                Err(_) => log::error!("capture worker panicked"),
            }
        } else {
            // Best effort only. The leaked worker holds the stop flag and
            // will terminate within one loop iteration.
            log::warn!(
                "capture worker did not stop within {:?}; detaching",
                self.settings.join_timeout
            );
        }

        self.lock().state = PipelineState::Idle;
    }

    /// Update the confidence threshold of the active run, if any. The
    /// worker picks the new value up on its next iteration.
    pub fn set_confidence(&self, value: f32) {
        let inner = self.lock();
        match &inner.run {
            Some(run) => run.confidence.set(value),
            None => log::debug!("set_confidence with no active run"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_cell_round_trips_and_clamps() {
        let cell = ConfidenceCell::new(0.5);
        assert_eq!(cell.get(), 0.5);
        cell.set(0.85);
        assert_eq!(cell.get(), 0.85);
        cell.set(1.5);
        assert_eq!(cell.get(), 1.0);
        cell.set(-0.1);
        assert_eq!(cell.get(), 0.0);
    }

    #[test]
    fn shared_cell_is_visible_across_clones() {
        let writer = ConfidenceCell::new(0.2);
        let reader = writer.clone();
        writer.set(0.7);
        assert_eq!(reader.get(), 0.7);
    }

    #[test]
    fn stop_without_a_run_is_a_noop() {
        let controller = PipelineController::new(PipelineSettings::default());
        controller.stop();
        assert_eq!(controller.state(), PipelineState::Idle);
    }
}
