//! Adaptive suppression of unreliable motion estimates.
//!
//! When tracking confidence drops, applying the raw correction amplifies
//! estimation noise into visible judder. The controller fades the correction
//! toward identity instead, ramping smoothly so stability flicker never
//! snaps the output.

use crate::homography::Homography;
use crate::utils::step;
use crate::{Error, Result};

/// Suppression configuration. Validated eagerly, never per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionSettings {
    /// Master switch; when false, motions pass through untouched.
    pub auto_suppression: bool,

    /// Stability at or above which no suppression is applied.
    pub threshold: f32,

    /// Stability at or below which suppression saturates at full strength.
    /// Must be strictly below `threshold`.
    pub saturation_limit: f32,

    /// Maximum change of the suppression factor per frame.
    pub smoothing_rate: f32,
}

impl Default for SuppressionSettings {
    fn default() -> Self {
        Self {
            auto_suppression: true,
            threshold: 0.9,
            saturation_limit: 0.7,
            smoothing_rate: 0.05,
        }
    }
}

impl SuppressionSettings {
    /// Validate threshold ordering and rate positivity.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) || self.threshold <= self.saturation_limit {
            return Err(Error::InvalidConfig(format!(
                "suppression threshold must be in (saturation_limit, 1], got {} with saturation_limit {}",
                self.threshold, self.saturation_limit
            )));
        }
        if self.saturation_limit < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "suppression saturation_limit must be non-negative, got {}",
                self.saturation_limit
            )));
        }
        if self.smoothing_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "suppression smoothing_rate must be positive, got {}",
                self.smoothing_rate
            )));
        }
        Ok(())
    }
}

/// Owns the persistent suppression factor and applies the control law.
#[derive(Debug, Default)]
pub struct SuppressionController {
    factor: f32,
}

impl SuppressionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a raw motion estimate into the corrected motion.
    ///
    /// With suppression disabled the factor is forced to 0 and the motion
    /// passes through unchanged. Otherwise the target level is derived from
    /// `stability` against the configured thresholds and the persistent
    /// factor moves toward it by at most `smoothing_rate`, then the motion
    /// is blended toward identity by the factor.
    pub fn suppress(
        &mut self,
        motion: Homography,
        stability: f32,
        settings: &SuppressionSettings,
    ) -> Homography {
        if !settings.auto_suppression {
            self.factor = 0.0;
            return motion;
        }

        let target = if stability <= settings.saturation_limit {
            1.0
        } else if stability >= settings.threshold {
            0.0
        } else {
            let span = settings.threshold - settings.saturation_limit;
            1.0 - (stability - settings.saturation_limit) / span
        };

        self.factor = step(self.factor, target, settings.smoothing_rate);

        motion.blend(&Homography::identity(), self.factor as f64)
    }

    /// The current suppression factor in [0, 1].
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Reset the factor to 0 (stabilization disabled or context reset).
    pub fn reset(&mut self) {
        self.factor = 0.0;
    }
}
