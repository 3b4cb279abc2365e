//! # Steadycam - Real-Time Video Stabilization
//!
//! Steadycam stabilizes a live video stream by estimating inter-frame camera
//! motion, smoothing the accumulated motion path over a sliding window, and
//! warping each frame by the corrective transform before display.
//!
//! ## Pipeline
//!
//! - [`FrameTracker`]: feature-based motion estimation between consecutive
//!   frames, reporting a transform and a stability score
//! - [`SuppressionController`]: fades correction toward identity when
//!   tracking confidence is poor
//! - [`PathStabilizer`]: delayed sliding-window trajectory smoothing with
//!   optional cropping
//! - [`StabilizationFilter`]: wires the stages together per input frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadycam_rs::{StabilizationFilter, StabilizationSettings};
//!
//! let mut filter = StabilizationFilter::new(StabilizationSettings::default()).unwrap();
//!
//! // Returns None while the look-ahead buffer is warming up,
//! // then one delayed stabilized frame per input frame.
//! while let Some(input) = next_frame() {
//!     if let Some(output) = filter.process(&input).unwrap() {
//!         present(output);
//!     }
//! }
//! ```

pub mod frame;
pub mod homography;
pub mod tracker;
pub mod suppression;
pub mod stabilizer;
pub mod filter;
pub mod drawing;
pub mod utils;

// Re-exports for convenience
pub use frame::{Frame, PixelFormat, Rect};
pub use homography::Homography;
pub use tracker::{FrameTracker, MotionModel, Point2};
pub use suppression::{SuppressionController, SuppressionSettings};
pub use stabilizer::{PathSettings, PathStabilizer};
pub use filter::{StabilizationFilter, StabilizationSettings};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the steadycam library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Frame is empty")]
        EmptyFrame,

        #[error("Frame buffer size mismatch: expected {expected} bytes, got {got}")]
        FrameSizeMismatch { expected: usize, got: usize },

        #[error("Transform error: {0}")]
        TransformError(String),
    }

    /// Result type for steadycam operations
    pub type Result<T> = std::result::Result<T, Error>;
}
