//! Vision module
//!
//! Turns detector output for a captured frame into a target observation.
//! The detector itself (an object-detection model) sits behind
//! [`TargetDetector`]; this module only picks its boxes and reads the HP bar.

pub mod hp_bar;

use image::{ImageBuffer, RgbImage};

use crate::controller::TargetPresenceState;

pub use hp_bar::measure_fill;

/// Detector class id of the target window
pub const CLASS_TARGET_WINDOW: u32 = 0;
/// Detector class id of the target's HP bar
pub const CLASS_HP_BAR: u32 = 1;
/// Boxes at or below this confidence are ignored
pub const MIN_CONFIDENCE: f32 = 0.25;
/// HP below this percent reads as a dead target
pub const DEAD_HP_PERCENT: f64 = 1.5;

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer pixel bounds clipped to a `width` x `height` frame
    ///
    /// Returns `None` when nothing of the box remains.
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| (v as i64).clamp(0, i64::from(max)) as u32;
        let (x1, x2) = (clamp(self.x1, width), clamp(self.x2, width));
        let (y1, y2) = (clamp(self.y1, height), clamp(self.y2, height));
        (x1 < x2 && y1 < y2).then_some((x1, y1, x2, y2))
    }
}

/// One detector box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub score: f32,
    pub rect: Rect,
}

/// Object detector run on every captured frame
pub trait TargetDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, VisionError>;
}

/// Result of analysing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct TargetObservation {
    pub state: TargetPresenceState,
    pub health_percent: f64,
    pub window: Option<Rect>,
    pub hp_bar: Option<Rect>,
}

impl TargetObservation {
    fn no_target(window: Option<Rect>, hp_bar: Option<Rect>) -> Self {
        Self {
            state: TargetPresenceState::NoTarget,
            health_percent: 0.0,
            window,
            hp_bar,
        }
    }
}

/// Pick the target window and HP bar boxes
///
/// A later qualifying box of the same class replaces an earlier one.
pub fn pick_boxes(detections: &[Detection]) -> (Option<Rect>, Option<Rect>) {
    let mut window = None;
    let mut hp_bar = None;
    for det in detections.iter().filter(|d| d.score > MIN_CONFIDENCE) {
        match det.class_id {
            CLASS_TARGET_WINDOW => window = Some(det.rect),
            CLASS_HP_BAR => hp_bar = Some(det.rect),
            _ => {}
        }
    }
    (window, hp_bar)
}

/// Build an observation from a frame and its detections
pub fn analyze(frame: &RgbImage, detections: &[Detection]) -> TargetObservation {
    let (window, hp_bar) = pick_boxes(detections);
    let (Some(_), Some(bar)) = (window, hp_bar) else {
        return TargetObservation::no_target(window, hp_bar);
    };

    let health_percent = measure_fill(frame, bar);
    let state = if health_percent < DEAD_HP_PERCENT {
        TargetPresenceState::DeadTarget
    } else {
        TargetPresenceState::AliveTarget
    };

    TargetObservation {
        state,
        health_percent,
        window,
        hp_bar,
    }
}

/// Detector plus HP bar reading for a stream of frames
pub struct Perception<D> {
    detector: D,
    frame_count: u64,
}

impl<D: TargetDetector> Perception<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            frame_count: 0,
        }
    }

    /// Analyse one frame
    pub fn observe(&mut self, frame: &RgbImage) -> Result<TargetObservation, VisionError> {
        let detections = self.detector.detect(frame)?;
        self.frame_count += 1;
        let observation = analyze(frame, &detections);
        log::debug!(
            "Frame {}: {} hp={:.2}",
            self.frame_count,
            observation.state,
            observation.health_percent
        );
        Ok(observation)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Convert a raw BGRA screen grab into an RGB frame
pub fn frame_from_bgra(data: &[u8], width: u32, height: u32) -> Result<RgbImage, VisionError> {
    let expected = width as usize * height as usize * 4;
    if data.len() != expected {
        return Err(VisionError::InvalidFrameData);
    }

    let rgb: Vec<u8> = data
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    ImageBuffer::from_raw(width, height, rgb).ok_or(VisionError::InvalidFrameData)
}

/// Vision system errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Invalid frame data")]
    InvalidFrameData,
    #[error("Detection failed: {0}")]
    DetectionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct FixedDetector(Vec<Detection>);

    impl TargetDetector for FixedDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, VisionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl TargetDetector for FailingDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, VisionError> {
            Err(VisionError::DetectionError("model not loaded".into()))
        }
    }

    fn det(class_id: u32, score: f32, rect: Rect) -> Detection {
        Detection {
            class_id,
            score,
            rect,
        }
    }

    /// 100x20 frame with the bar in rows 10..14, red up to `filled`
    fn frame(filled: u32) -> RgbImage {
        RgbImage::from_fn(100, 20, |x, y| {
            if (10..14).contains(&y) && x < filled {
                Rgb([220, 30, 30])
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    fn window() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 20.0)
    }

    fn bar() -> Rect {
        Rect::new(0.0, 10.0, 100.0, 14.0)
    }

    #[test]
    fn test_pick_boxes_filters_confidence() {
        let detections = [
            det(CLASS_TARGET_WINDOW, 0.9, window()),
            det(CLASS_HP_BAR, 0.25, bar()),
            det(7, 0.99, bar()),
        ];
        assert_eq!(pick_boxes(&detections), (Some(window()), None));
    }

    #[test]
    fn test_pick_boxes_last_wins() {
        let other = Rect::new(1.0, 1.0, 2.0, 2.0);
        let detections = [det(CLASS_HP_BAR, 0.5, bar()), det(CLASS_HP_BAR, 0.3, other)];
        assert_eq!(pick_boxes(&detections).1, Some(other));
    }

    #[test]
    fn test_analyze_alive_and_dead() {
        let detections = [
            det(CLASS_TARGET_WINDOW, 0.8, window()),
            det(CLASS_HP_BAR, 0.8, bar()),
        ];

        let alive = analyze(&frame(64), &detections);
        assert_eq!(alive.state, TargetPresenceState::AliveTarget);
        assert!((alive.health_percent - 64.0).abs() < 1e-9);

        let dead = analyze(&frame(1), &detections);
        assert_eq!(dead.state, TargetPresenceState::DeadTarget);
    }

    #[test]
    fn test_analyze_missing_box_is_no_target() {
        let obs = analyze(&frame(50), &[det(CLASS_HP_BAR, 0.8, bar())]);
        assert_eq!(obs.state, TargetPresenceState::NoTarget);
        assert_eq!(obs.health_percent, 0.0);
        assert_eq!(obs.hp_bar, Some(bar()));
    }

    #[test]
    fn test_perception_counts_frames() {
        let mut perception = Perception::new(FixedDetector(vec![
            det(CLASS_TARGET_WINDOW, 0.8, window()),
            det(CLASS_HP_BAR, 0.8, bar()),
        ]));
        let obs = perception.observe(&frame(100)).unwrap();
        assert_eq!(obs.health_percent, 100.0);
        assert_eq!(perception.frame_count(), 1);

        let mut failing = Perception::new(FailingDetector);
        assert!(failing.observe(&frame(100)).is_err());
        assert_eq!(failing.frame_count(), 0);
    }

    #[test]
    fn test_frame_from_bgra() {
        let data = [10, 20, 30, 255, 1, 2, 3, 255];
        let img = frame_from_bgra(&data, 2, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([30, 20, 10]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([3, 2, 1]));

        assert!(matches!(
            frame_from_bgra(&data, 3, 1),
            Err(VisionError::InvalidFrameData)
        ));
    }

    #[test]
    fn test_rect_clip() {
        assert_eq!(
            Rect::new(-5.0, 2.5, 500.0, 9.9).clip(100, 20),
            Some((0, 2, 100, 9))
        );
        assert_eq!(Rect::new(5.0, 5.0, 5.0, 9.0).clip(100, 20), None);
    }
}
