//! Delayed sliding-window path smoothing and cropping.
//!
//! The stabilizer accumulates the camera's motion path, buffers frames so
//! each one can be corrected with look-ahead as well as history, and emits
//! every frame warped onto a smoothed trajectory with a fixed delay of half
//! the smoothing window.

use std::collections::VecDeque;

use nalgebra::Matrix3;
use tracing::{debug, warn};

use crate::frame::{Frame, Rect};
use crate::homography::Homography;
use crate::{Error, Result};

/// Path-stabilizer configuration. Validated eagerly, never per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSettings {
    /// Proportion of the frame reserved as correction margin, in [0, 1).
    /// The stable region excludes this proportion split across both sides
    /// of each axis.
    pub correction_margin: f32,

    /// Size of the smoothing window in frames. The output delay is half of
    /// this value.
    pub smoothing_frames: usize,

    /// Whether emitted frames are cropped to the stable region.
    pub crop_to_margins: bool,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            correction_margin: 0.05,
            smoothing_frames: 10,
            crop_to_margins: false,
        }
    }
}

impl PathSettings {
    pub fn validate(&self) -> Result<()> {
        if self.smoothing_frames == 0 {
            return Err(Error::InvalidConfig(
                "smoothing_frames must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.correction_margin) {
            return Err(Error::InvalidConfig(format!(
                "correction_margin must be in [0, 1), got {}",
                self.correction_margin
            )));
        }
        Ok(())
    }
}

/// Smooths the corrected motion path and emits cropped, stabilized frames
/// with a fixed delay.
pub struct PathStabilizer {
    settings: PathSettings,

    /// Accumulated path positions, oldest first. Holds one entry per seen
    /// frame up to `smoothing_frames + 1`: the full window around the frame
    /// about to be emitted.
    path: VecDeque<Homography>,

    /// Frames awaiting emission, oldest first. Holds up to `frame_delay()`
    /// frames between calls.
    frames: VecDeque<Frame>,

    /// Dimensions of the most recent input, for the stable region.
    frame_size: Option<(u32, u32)>,
    stable_region: Rect,
}

impl PathStabilizer {
    pub fn new(settings: PathSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            path: VecDeque::new(),
            frames: VecDeque::new(),
            frame_size: None,
            stable_region: Rect::default(),
        })
    }

    /// The fixed output delay in frames: half the smoothing window, the
    /// look-ahead needed for centered smoothing.
    pub fn frame_delay(&self) -> usize {
        self.settings.smoothing_frames / 2
    }

    /// True once the delay buffer has accumulated `frame_delay()` frames.
    /// While false, `stabilize` emits nothing.
    pub fn ready(&self) -> bool {
        self.frames.len() >= self.frame_delay()
    }

    /// The stable sub-rectangle guaranteed free of correction artifacts,
    /// recomputed whenever the margin or the input resolution changes.
    /// Zero-sized before the first frame is seen.
    pub fn stable_region(&self) -> Rect {
        self.stable_region
    }

    pub fn settings(&self) -> &PathSettings {
        &self.settings
    }

    /// Append a frame and its corrected motion; emit the oldest buffered
    /// frame warped onto the smoothed trajectory once enough look-ahead
    /// exists, or `None` while warming up.
    pub fn stabilize(&mut self, frame: Frame, motion: Homography) -> Option<Frame> {
        if frame.is_empty() {
            return None;
        }

        let size = (frame.width(), frame.height());
        if self.frame_size != Some(size) {
            self.frame_size = Some(size);
            self.stable_region = Self::margin_region(size, self.settings.correction_margin);
        }

        // Extend the path: each position is the previous one advanced by
        // this frame's corrected motion.
        let position = match self.path.back() {
            Some(previous) => previous.compose(&motion),
            None => motion,
        };
        self.path.push_back(position);
        if self.path.len() > self.settings.smoothing_frames + 1 {
            self.path.pop_front();
        }

        self.frames.push_back(frame);
        if self.frames.len() <= self.frame_delay() {
            debug!(
                buffered = self.frames.len(),
                delay = self.frame_delay(),
                "warming up"
            );
            return None;
        }

        let frame = self.frames.pop_front()?;

        // The emitted frame sits frame_delay() entries before the newest
        // path position, i.e. at the centre of a full window.
        let center = self.path.len() - 1 - self.frame_delay();
        let smoothed = self.smoothed_position(center);

        let correction = match self.path[center].try_inverse() {
            Some(inverse) => smoothed.compose(&inverse),
            None => {
                warn!("degenerate path position, emitting frame uncorrected");
                Homography::identity()
            }
        };

        let mut output = frame.warp(&correction);
        if self.settings.crop_to_margins {
            output = output.crop(self.stable_region);
        }
        Some(output)
    }

    /// Gaussian-weighted entrywise average of the path window, centred on
    /// `center`. The window is kept symmetric around the centre (its radius
    /// limited by the available history) so a steady trajectory smooths to
    /// itself; each position is renormalized before weighting so the
    /// perspective rows average consistently.
    fn smoothed_position(&self, center: usize) -> Homography {
        let radius = center.min(self.path.len() - 1 - center);
        let sigma = self.settings.smoothing_frames as f64 / 4.0;

        let mut total = Matrix3::<f64>::zeros();
        let mut weight_sum = 0.0;
        for i in (center - radius)..=(center + radius) {
            let offset = (i as f64 - center as f64) / sigma;
            let weight = (-0.5 * offset * offset).exp();

            let mut m = *self.path[i].matrix();
            let w = m[(2, 2)];
            if w != 0.0 {
                m /= w;
            }
            total += m * weight;
            weight_sum += weight;
        }

        Homography::from_matrix(total / weight_sum)
    }

    /// Replace the configuration. A changed smoothing window clears both
    /// buffers and forces a fresh warm-up; the buffers are never left
    /// inconsistent with the window size.
    pub fn reconfigure(&mut self, settings: PathSettings) -> Result<()> {
        settings.validate()?;

        if settings.smoothing_frames != self.settings.smoothing_frames {
            self.restart();
        }
        if let Some(size) = self.frame_size {
            self.stable_region = Self::margin_region(size, settings.correction_margin);
        }
        self.settings = settings;
        Ok(())
    }

    /// Clear both buffers; subsequent frames warm up exactly as after
    /// construction.
    pub fn restart(&mut self) {
        self.path.clear();
        self.frames.clear();
    }

    fn margin_region((width, height): (u32, u32), margin: f32) -> Rect {
        let x = ((width as f64 * margin as f64) / 2.0).round() as u32;
        let y = ((height as f64 * margin as f64) / 2.0).round() as u32;
        Rect::new(x, y, width.saturating_sub(2 * x), height.saturating_sub(2 * y))
    }
}

impl Default for PathStabilizer {
    fn default() -> Self {
        Self::new(PathSettings::default()).expect("default settings are valid")
    }
}
