use anyhow::Result;

use crate::detect::result::{Detection, Summary};
use crate::frame::Frame;

/// Outcome of one inference call.
///
/// Inference fails closed: when the model errors out, the backend hands the
/// raw frame back instead of propagating, so per-frame failures never use
/// error returns as control flow on the hot path.
#[derive(Debug)]
pub enum Inference {
    /// The model ran; the frame carries its annotations.
    Detected {
        frame: Frame,
        detections: Vec<Detection>,
        summary: Summary,
    },
    /// The model failed on this frame; the raw frame is returned untouched.
    Degraded { frame: Frame, reason: String },
}

/// Detector backend trait.
///
/// The backend is the only stateful part of inference: it owns the loaded
/// model and nothing else. It must not hold frame data across calls.
///
/// The confidence threshold is passed per call, not fixed at construction,
/// so the operator can adjust it while the pipeline is running.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame at the given confidence threshold.
    ///
    /// Takes ownership of the frame and returns it (annotated or raw)
    /// inside the `Inference`; frames are never copied across this seam.
    fn infer(&mut self, frame: Frame, confidence: f32) -> Inference;

    /// Optional warm-up hook, called once before streaming starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
