//! Inter-frame camera motion estimation.
//!
//! The tracker estimates the camera motion between consecutive frames as a
//! projective transform, together with a stability score describing how much
//! the estimate can be trusted:
//!
//! - Grid-based corner detection and patch matching ([`features`])
//! - Motion-model fitting with consensus-based outlier rejection ([`models`])
//! - The per-frame tracking state machine ([`frame_tracker`])

mod features;
mod frame_tracker;
mod models;

pub use features::{detect_features, match_features, DetectorParams, MatchParams, Point2};
pub use frame_tracker::FrameTracker;
pub use models::{fit_motion, MotionModel, RansacParams};
