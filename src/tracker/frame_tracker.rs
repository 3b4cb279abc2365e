//! Per-frame motion tracking state machine.

use tracing::debug;

use super::features::{detect_features, match_features, DetectorParams, MatchParams, Point2};
use super::models::{fit_motion, MotionModel, RansacParams};
use crate::frame::{Frame, PixelFormat};
use crate::homography::Homography;
use crate::utils::clamp;

/// Estimates inter-frame camera motion from consecutive frames.
///
/// `track` never fails: a cold start, an empty frame, or degraded tracking
/// all yield identity motion with stability 0, which downstream suppression
/// treats as "no reliable signal".
pub struct FrameTracker {
    model: MotionModel,
    detector: DetectorParams,
    matcher: MatchParams,
    ransac: RansacParams,

    previous: Option<Frame>,
    stability: f32,
    points: Vec<Point2>,
}

impl FrameTracker {
    pub fn new(model: MotionModel) -> Self {
        Self {
            model,
            detector: DetectorParams::default(),
            matcher: MatchParams::default(),
            ransac: RansacParams::default(),
            previous: None,
            stability: 0.0,
            points: Vec::new(),
        }
    }

    /// Track camera motion from the previously seen frame onto `frame`.
    ///
    /// Returns the motion transform and the stability of the estimate. The
    /// first call after construction or [`restart`](Self::restart), and any
    /// call where tracking fails, returns `(identity, 0.0)`.
    pub fn track(&mut self, frame: &Frame) -> (Homography, f32) {
        if frame.is_empty() {
            self.stability = 0.0;
            self.points.clear();
            return (Homography::identity(), 0.0);
        }

        let current = if frame.format() == PixelFormat::Gray8 {
            frame.clone()
        } else {
            frame.extract_channel(0)
        };

        let Some(previous) = self.previous.take() else {
            // Cold start: no prior frame, no motion signal yet
            self.previous = Some(current);
            self.stability = 0.0;
            self.points.clear();
            return (Homography::identity(), 0.0);
        };

        let features = detect_features(&previous, &self.detector);
        let (prev_pts, curr_pts) = match_features(&previous, &current, &features, &self.matcher);
        self.previous = Some(current);
        self.points = curr_pts.clone();

        let fit = fit_motion(self.model, &prev_pts, &curr_pts, &self.ransac);
        debug!(
            features = features.len(),
            matches = prev_pts.len(),
            fitted = fit.is_some(),
            "tracked frame"
        );

        match fit {
            Some((motion, inlier_fraction)) => {
                self.stability = clamp(inlier_fraction, 0.0, 1.0);
                (motion, self.stability)
            }
            None => {
                self.stability = 0.0;
                (Homography::identity(), 0.0)
            }
        }
    }

    /// The matched feature set of the most recent `track` call, for
    /// diagnostic overlay. Regenerated every call.
    pub fn tracking_points(&self) -> &[Point2] {
        &self.points
    }

    /// Switch the motion model for subsequent calls.
    pub fn set_model(&mut self, model: MotionModel) {
        self.model = model;
    }

    pub fn model(&self) -> MotionModel {
        self.model
    }

    /// The most recently computed stability value, 0 before the first track.
    pub fn stability(&self) -> f32 {
        self.stability
    }

    /// Clear the previous-frame state; the next `track` is a cold start.
    pub fn restart(&mut self) {
        self.previous = None;
        self.stability = 0.0;
        self.points.clear();
    }
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self::new(MotionModel::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn noise_frame(width: u32, height: u32, shift_x: i64, shift_y: i64) -> Frame {
        let mut frame = Frame::new(width, height, PixelFormat::Gray8);
        for y in 0..height {
            for x in 0..width {
                let sx = (x as i64 + shift_x) as u64;
                let sy = (y as i64 + shift_y) as u64;
                let v = sx
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(sy.wrapping_mul(1442695040888963407));
                frame.set_pixel(x, y, 0, (v >> 32) as u8);
            }
        }
        frame
    }

    #[test]
    fn test_first_call_is_cold_start() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let (motion, stability) = tracker.track(&noise_frame(96, 96, 0, 0));

        assert!(motion.is_identity(1e-12));
        assert_eq!(stability, 0.0);
        assert_eq!(tracker.stability(), 0.0);
        assert!(tracker.tracking_points().is_empty());
    }

    #[test]
    fn test_identical_frames_full_stability() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let frame = noise_frame(96, 96, 0, 0);

        tracker.track(&frame);
        let (motion, stability) = tracker.track(&frame);

        assert_relative_eq!(stability, 1.0);
        assert!(motion.is_identity(1e-3));
        assert!(!tracker.tracking_points().is_empty());
    }

    #[test]
    fn test_translation_recovered() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);

        tracker.track(&noise_frame(96, 96, 0, 0));
        let (motion, stability) = tracker.track(&noise_frame(96, 96, 3, 2));

        // Content shifted by (-3, -2) between the frames
        assert!(stability > 0.9, "stability was {stability}");
        assert_relative_eq!(motion.matrix()[(0, 2)], -3.0, epsilon = 0.5);
        assert_relative_eq!(motion.matrix()[(1, 2)], -2.0, epsilon = 0.5);
    }

    #[test]
    fn test_flat_frames_degrade_gracefully() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let flat = Frame::new(96, 96, PixelFormat::Gray8);

        tracker.track(&flat);
        let (motion, stability) = tracker.track(&flat);

        // No features, no signal; never an error
        assert!(motion.is_identity(1e-12));
        assert_eq!(stability, 0.0);
    }

    #[test]
    fn test_empty_frame_is_not_an_error() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let (motion, stability) = tracker.track(&Frame::empty());
        assert!(motion.is_identity(1e-12));
        assert_eq!(stability, 0.0);
    }

    #[test]
    fn test_restart_forces_cold_start() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let frame = noise_frame(96, 96, 0, 0);

        tracker.track(&frame);
        tracker.track(&frame);
        assert!(tracker.stability() > 0.0);

        tracker.restart();
        assert_eq!(tracker.stability(), 0.0);

        let (motion, stability) = tracker.track(&frame);
        assert!(motion.is_identity(1e-12));
        assert_eq!(stability, 0.0);
    }

    #[test]
    fn test_set_model_applies_to_next_call() {
        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        let a = noise_frame(96, 96, 0, 0);
        let b = noise_frame(96, 96, 4, 0);

        tracker.track(&a);
        tracker.set_model(MotionModel::Static);
        let (motion, stability) = tracker.track(&b);

        // Static model pins the transform to identity; the moved scene
        // shows up as reduced stability instead
        assert!(motion.is_identity(1e-12));
        assert!(stability < 0.5, "stability was {stability}");
    }

    #[test]
    fn test_multichannel_input_uses_first_channel() {
        let gray = noise_frame(96, 96, 0, 0);
        let mut rgb = Frame::new(96, 96, PixelFormat::Rgb8);
        for y in 0..96 {
            for x in 0..96 {
                rgb.set_pixel(x, y, 0, gray.pixel(x, y, 0));
            }
        }

        let mut tracker = FrameTracker::new(MotionModel::Dynamic);
        tracker.track(&rgb);
        let (_, stability) = tracker.track(&rgb);
        assert_relative_eq!(stability, 1.0);
    }
}
