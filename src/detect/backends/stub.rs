use crate::detect::backend::{DetectorBackend, Inference};
use crate::detect::result::{Detection, Summary};
use crate::frame::Frame;

const STUB_CLASSES: &[&str] = &["person", "car", "dog", "bicycle"];

/// One annotation color per stub class, given in RGB.
const STUB_COLORS: &[[u8; 3]] = &[
    [0, 200, 0],
    [220, 60, 60],
    [60, 120, 220],
    [220, 180, 40],
];

/// Deterministic stand-in for a real detection model.
///
/// Produces a rotating set of synthetic detections derived from a frame
/// counter, draws their boxes on the frame, and honors the confidence
/// threshold like a real backend would. Used by tests and the demo run
/// mode; a real model backend implements the same trait.
pub struct StubBackend {
    frame_count: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }

    fn candidates(&self, width: u32, height: u32) -> Vec<Detection> {
        let count = (self.frame_count % 4) as u32;
        let mut detections = Vec::new();
        for i in 0..count {
            let class_index = ((self.frame_count + i as u64) % STUB_CLASSES.len() as u64) as usize;
            // Cycles 0.5, 0.6, 0.7, 0.8, 0.9.
            let confidence = 0.5 + 0.1 * ((self.frame_count + i as u64) % 5) as f32;
            let x1 = (i + 1) * width / 8;
            let y1 = (i + 1) * height / 8;
            let x2 = x1 + width / 4;
            let y2 = y1 + height / 4;
            if x1 >= x2 || y1 >= y2 {
                continue;
            }
            detections.push(Detection {
                x1,
                y1,
                x2: x2.min(width - 1),
                y2: y2.min(height - 1),
                confidence,
                class_id: class_index as u32,
                class_name: STUB_CLASSES[class_index].to_string(),
            });
        }
        detections
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, mut frame: Frame, confidence: f32) -> Inference {
        self.frame_count += 1;

        let detections: Vec<Detection> = self
            .candidates(frame.width(), frame.height())
            .into_iter()
            .filter(|d| d.confidence >= confidence)
            .collect();

        for detection in &detections {
            let color = STUB_COLORS[detection.class_id as usize % STUB_COLORS.len()];
            frame.draw_box(detection.x1, detection.y1, detection.x2, detection.y2, color);
        }

        let summary = Summary::from_detections(&detections);
        Inference::Detected {
            frame,
            detections,
            summary,
        }
    }
}
