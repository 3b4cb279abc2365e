//! Diagnostic overlay drawing.
//!
//! A side channel for visual debugging: cross markers at the tracking
//! points, colored by how suppressed the correction currently is. Drawing
//! mutates a display copy of the frame and never feeds back into the
//! stabilization result.

use crate::frame::Frame;
use crate::tracker::Point2;
use crate::utils::lerp;

/// Green in YUV, used for fully-trusted tracking.
pub const YUV_GREEN: [u8; 3] = [149, 43, 21];

/// Red in YUV, used for fully-suppressed tracking.
pub const YUV_RED: [u8; 3] = [76, 84, 255];

/// Channelwise linear interpolation between two colors.
pub fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    [
        lerp(a[0] as f32, b[0] as f32, t).round() as u8,
        lerp(a[1] as f32, b[1] as f32, t).round() as u8,
        lerp(a[2] as f32, b[2] as f32, t).round() as u8,
    ]
}

/// Draw cross markers at each point, clipped to the frame bounds.
pub fn plot_markers(frame: &mut Frame, points: &[Point2], color: [u8; 3], size: u32) {
    if frame.is_empty() {
        return;
    }

    let half = size as i64 / 2;
    let channels = frame.channels().min(3);

    for point in points {
        let cx = point[0].round() as i64;
        let cy = point[1].round() as i64;

        for d in -half..=half {
            set_clipped(frame, cx + d, cy, &color[..channels]);
            set_clipped(frame, cx, cy + d, &color[..channels]);
        }
    }
}

fn set_clipped(frame: &mut Frame, x: i64, y: i64, color: &[u8]) {
    if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
        return;
    }
    for (c, &value) in color.iter().enumerate() {
        frame.set_pixel(x as u32, y as u32, c, value);
    }
}
