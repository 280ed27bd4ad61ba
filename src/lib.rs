//! camdash - live object-detection dashboard for phone IP webcams.
//!
//! Streams frames from a network camera (DroidCam / IP Webcam style MJPEG
//! over HTTP), runs each frame through a detection backend, and feeds
//! annotated results plus summary statistics to a display sink.
//!
//! # Architecture
//!
//! One run is a producer/consumer pair around a bounded channel:
//!
//! - the capture worker (own thread) reads frames, runs the detector, and
//!   pushes `ResultPacket`s; when the display falls behind, the channel
//!   drops its oldest packet so the preview stays current
//! - the display loop (controlling thread) polls with a timeout and
//!   renders through the `DisplaySink` trait
//! - the `PipelineController` owns start/stop and creates a fresh
//!   worker/channel/stop-flag triple per run
//!
//! # Module Structure
//!
//! - `frame`: frame buffer + color-order tracking (BGR capture, RGB display)
//! - `ingest`: camera sources (MJPEG over HTTP, synthetic `stub://`)
//! - `detect`: detector backend trait and detection results
//! - `channel`: bounded frame channel with drop-oldest backpressure
//! - `worker`: capture-and-detect worker thread
//! - `display`: display loop, display sink trait, FPS counter
//! - `pipeline`: lifecycle controller and run state
//! - `config`, `net`, `ui`: dashboard shell (config file/env, connection
//!   helpers, terminal sink)

pub mod channel;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod net;
pub mod pipeline;
pub mod ui;
pub mod worker;

pub use channel::{frame_channel, FrameReceiver, FrameSender, PopResult, PushOutcome, ResultPacket};
pub use config::{DashboardConfig, DetectionSettings};
pub use detect::{Detection, DetectorBackend, Inference, StubBackend, Summary};
pub use display::{run_display_loop, DisplayOptions, DisplaySink, FpsCounter};
pub use frame::{ColorOrder, Frame};
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use pipeline::{ConfidenceCell, PipelineController, PipelineSettings, PipelineState};
pub use ui::TerminalSink;
pub use worker::{WorkerExit, WorkerSettings};
