//! Display loop.
//!
//! Runs on the controlling thread, polling the frame channel with a short
//! timeout so it can keep reacting to user commands. Rendering goes
//! through the `DisplaySink` trait; the loop itself knows nothing about
//! the widget toolkit behind it.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::channel::{FrameReceiver, PopResult};
use crate::detect::Summary;
use crate::frame::Frame;
use crate::pipeline::{PipelineController, PipelineState};

/// Where rendered output goes. Implementations are expected to return
/// quickly; a render error ends the display loop (not the worker).
pub trait DisplaySink {
    fn render_frame(&mut self, frame: &Frame) -> Result<()>;
    fn render_status(&mut self, status: &str);
    fn render_summary(&mut self, summary: &Summary) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct DisplayOptions {
    /// Bound on each channel poll; keeps the loop live while the producer
    /// is slow or reconnecting.
    pub pop_timeout: Duration,
    /// Short sleep after each rendered frame to yield control.
    pub yield_interval: Duration,
    /// Render per-frame detection summaries.
    pub show_info: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(1),
            yield_interval: Duration::from_millis(10),
            show_info: true,
        }
    }
}

/// Rolling frames-per-second estimate over ~1s windows.
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Record one rendered frame. Returns the rate and resets when the
    /// current window has lasted at least a second.
    pub fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the channel and render until the run stops.
///
/// Returns `Ok` when the pipeline leaves `Running` (normal stop) or the
/// producer disconnects; returns the sink error when rendering fails. In
/// both cases the caller is responsible for tearing the run down through
/// the controller.
pub fn run_display_loop(
    controller: &PipelineController,
    frames: &FrameReceiver,
    sink: &mut dyn DisplaySink,
    options: &DisplayOptions,
) -> Result<()> {
    let mut fps = FpsCounter::new();

    while controller.state() == PipelineState::Running {
        match frames.pop(options.pop_timeout) {
            PopResult::Packet(packet) => {
                if let Err(e) = sink.render_frame(&packet.frame) {
                    sink.render_status("display error, stopping preview");
                    return Err(e).context("render frame");
                }
                if let Some(rate) = fps.tick() {
                    sink.render_status(&format!("live - {rate:.1} fps"));
                }
                if options.show_info {
                    if let Err(e) = sink.render_summary(&packet.summary) {
                        sink.render_status("display error, stopping preview");
                        return Err(e).context("render summary");
                    }
                }
                thread::sleep(options.yield_interval);
            }
            PopResult::Empty => {
                sink.render_status("waiting for frames...");
            }
            PopResult::Disconnected => {
                sink.render_status("camera stream ended");
                return Ok(());
            }
        }
    }

    Ok(())
}
