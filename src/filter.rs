//! The stabilization filter: per-frame orchestration of tracking,
//! suppression and path smoothing.

use tracing::debug;

use crate::frame::{Frame, Rect};
use crate::stabilizer::{PathSettings, PathStabilizer};
use crate::suppression::{SuppressionController, SuppressionSettings};
use crate::tracker::{FrameTracker, MotionModel, Point2};
use crate::{Error, Result};

/// Complete filter configuration.
///
/// An immutable value validated as a whole before it is applied; the filter
/// never holds a partially-applied configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizationSettings {
    /// Size of the trajectory smoothing window in frames.
    pub smoothing_frames: usize,

    /// Master switch. When false the filter passes frames through and the
    /// tracker is left untouched.
    pub stabilize_output: bool,

    /// Whether emitted frames are cropped to the stable region.
    pub crop_output: bool,

    /// Proportion of the frame reserved as correction margin, in [0, 1).
    pub crop_proportion: f32,

    /// Adaptive suppression of low-confidence corrections.
    pub suppression: SuppressionSettings,

    /// Motion model the tracker is permitted to fit.
    pub motion_model: MotionModel,
}

impl Default for StabilizationSettings {
    fn default() -> Self {
        Self {
            smoothing_frames: 10,
            stabilize_output: true,
            crop_output: false,
            crop_proportion: 0.05,
            suppression: SuppressionSettings::default(),
            motion_model: MotionModel::Dynamic,
        }
    }
}

impl StabilizationSettings {
    /// Validate the whole configuration. Invalid settings are programmer or
    /// config errors, rejected before they can take effect.
    pub fn validate(&self) -> Result<()> {
        self.path_settings().validate()?;
        self.suppression.validate()
    }

    fn path_settings(&self) -> PathSettings {
        PathSettings {
            correction_margin: self.crop_proportion,
            smoothing_frames: self.smoothing_frames,
            crop_to_margins: self.crop_output,
        }
    }
}

/// Real-time video stabilization filter.
///
/// Call [`process`](Self::process) once per input frame; output frames lag
/// the input by [`frame_delay`](Self::frame_delay) frames while the
/// smoothing window fills. Not safe for concurrent invocation: callers
/// serialize frames, one fully processed before the next.
pub struct StabilizationFilter {
    settings: StabilizationSettings,
    tracker: FrameTracker,
    suppressor: SuppressionController,
    stabilizer: PathStabilizer,
}

impl StabilizationFilter {
    pub fn new(settings: StabilizationSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            tracker: FrameTracker::new(settings.motion_model),
            suppressor: SuppressionController::new(),
            stabilizer: PathStabilizer::new(settings.path_settings())?,
            settings,
        })
    }

    /// Process one input frame.
    ///
    /// Returns `Ok(None)` while the look-ahead buffer is warming up,
    /// otherwise one stabilized frame delayed by `frame_delay()` frames.
    /// With `stabilize_output` disabled, the input passes through unchanged
    /// and undelayed. An empty input frame is a precondition violation.
    pub fn process(&mut self, input: &Frame) -> Result<Option<Frame>> {
        if input.is_empty() {
            return Err(Error::EmptyFrame);
        }

        if !self.settings.stabilize_output {
            return Ok(Some(input.clone()));
        }

        let tracking = input.extract_channel(0);
        let (motion, stability) = self.tracker.track(&tracking);
        let corrected = self
            .suppressor
            .suppress(motion, stability, &self.settings.suppression);

        debug!(
            stability,
            suppression = self.suppressor.factor(),
            ready = self.stabilizer.ready(),
            "processing frame"
        );

        Ok(self.stabilizer.stabilize(input.clone(), corrected))
    }

    /// Atomically replace the configuration.
    ///
    /// The new settings are validated before anything is touched; on error
    /// the previous configuration stays fully in force. Disabling
    /// stabilization, or changing the smoothing window, resets the tracking
    /// context so resumption starts cold instead of replaying stale motion.
    pub fn configure(&mut self, settings: StabilizationSettings) -> Result<()> {
        settings.validate()?;

        if self.settings.stabilize_output && !settings.stabilize_output {
            self.reset_context();
        }

        self.tracker.set_model(settings.motion_model);
        self.stabilizer.reconfigure(settings.path_settings())?;
        if settings.smoothing_frames != self.settings.smoothing_frames {
            self.reset_context();
        }

        self.settings = settings;
        Ok(())
    }

    pub fn settings(&self) -> &StabilizationSettings {
        &self.settings
    }

    /// True once enough frames are buffered to emit stabilized output.
    pub fn ready(&self) -> bool {
        self.stabilizer.ready()
    }

    /// Stability of the most recent motion estimate, in [0, 1].
    pub fn stability(&self) -> f32 {
        self.tracker.stability()
    }

    /// Current suppression factor, in [0, 1].
    pub fn suppression_factor(&self) -> f32 {
        self.suppressor.factor()
    }

    /// Fixed output delay in frames.
    pub fn frame_delay(&self) -> usize {
        self.stabilizer.frame_delay()
    }

    /// The stable crop region for the current resolution.
    pub fn crop_region(&self) -> Rect {
        self.stabilizer.stable_region()
    }

    /// Tracking points of the most recent frame, for diagnostic overlay.
    pub fn tracking_points(&self) -> &[Point2] {
        self.tracker.tracking_points()
    }

    /// Drop all buffered frames and tracking history. The next frames warm
    /// up exactly as after construction.
    pub fn restart(&mut self) {
        self.stabilizer.restart();
        self.reset_context();
    }

    /// Clear tracker history and suppression state, avoiding a stale-motion
    /// discontinuity when stabilization resumes.
    fn reset_context(&mut self) {
        self.tracker.restart();
        self.suppressor.reset();
        self.stabilizer.restart();
    }
}
