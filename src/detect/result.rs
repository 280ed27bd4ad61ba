use std::collections::BTreeMap;

/// One recognized object instance. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Bounding box in pixel coordinates, x1 < x2 and y1 < y2.
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    /// Confidence score in [0, 1].
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
}

/// Per-frame aggregate over a detection list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub total_objects: usize,
    /// Class name -> number of instances in this frame.
    pub classes: BTreeMap<String, usize>,
    /// Arithmetic mean of detection confidences; `None` when no objects.
    pub avg_confidence: Option<f32>,
}

impl Summary {
    /// Summary with no detections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive the aggregate for one frame's detection list.
    pub fn from_detections(detections: &[Detection]) -> Self {
        if detections.is_empty() {
            return Self::empty();
        }

        let mut classes: BTreeMap<String, usize> = BTreeMap::new();
        let mut confidence_sum = 0.0f32;
        for detection in detections {
            *classes.entry(detection.class_name.clone()).or_insert(0) += 1;
            confidence_sum += detection.confidence;
        }

        Self {
            total_objects: detections.len(),
            classes,
            avg_confidence: Some(confidence_sum / detections.len() as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_name: &str, confidence: f32) -> Detection {
        Detection {
            x1: 0,
            y1: 0,
            x2: 10,
            y2: 10,
            confidence,
            class_id: 0,
            class_name: class_name.to_string(),
        }
    }

    #[test]
    fn empty_detection_list_has_no_mean_confidence() {
        let summary = Summary::from_detections(&[]);
        assert_eq!(summary.total_objects, 0);
        assert!(summary.classes.is_empty());
        assert_eq!(summary.avg_confidence, None);
    }

    #[test]
    fn summary_matches_person_and_car_scenario() {
        let detections = vec![detection("person", 0.6), detection("car", 0.8)];
        let summary = Summary::from_detections(&detections);

        assert_eq!(summary.total_objects, 2);
        assert_eq!(summary.classes.get("person"), Some(&1));
        assert_eq!(summary.classes.get("car"), Some(&1));
        let avg = summary.avg_confidence.unwrap();
        assert!((avg - 0.7).abs() < 1e-6);
    }

    #[test]
    fn class_counts_sum_to_total() {
        let detections = vec![
            detection("person", 0.9),
            detection("person", 0.5),
            detection("dog", 0.7),
            detection("person", 0.6),
        ];
        let summary = Summary::from_detections(&detections);

        assert_eq!(summary.total_objects, detections.len());
        assert_eq!(
            summary.classes.values().sum::<usize>(),
            summary.total_objects
        );
        assert_eq!(summary.classes.get("person"), Some(&3));
        assert_eq!(summary.classes.get("dog"), Some(&1));
    }

    #[test]
    fn mean_confidence_is_arithmetic_mean() {
        let detections = vec![
            detection("person", 0.2),
            detection("car", 0.4),
            detection("dog", 0.9),
        ];
        let summary = Summary::from_detections(&detections);
        let avg = summary.avg_confidence.unwrap();
        assert!((avg - 0.5).abs() < 1e-6);
    }
}
