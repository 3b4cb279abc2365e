//! Feature detection and matching on single-channel frames.
//!
//! Detection partitions the frame into a fixed grid and keeps the strongest
//! corner per cell, so features stay evenly spread even when one region of
//! the scene dominates. Matching runs a bounded local block search per
//! feature, which is cheap enough for the per-frame real-time budget.

use crate::frame::Frame;

/// A 2D feature location in pixel coordinates.
pub type Point2 = [f64; 2];

/// Parameters for grid-based corner detection.
#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    /// Side length of each grid cell in pixels.
    pub cell_size: u32,

    /// Minimum Shi-Tomasi response for a cell's best pixel to count.
    pub min_response: f64,

    /// Border margin excluded from detection, in pixels.
    pub margin: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            cell_size: 16,
            min_response: 100.0,
            margin: 10,
        }
    }
}

/// Parameters for patch-based feature matching.
#[derive(Debug, Clone, Copy)]
pub struct MatchParams {
    /// Half-size of the comparison patch (patch side = 2r + 1).
    pub patch_radius: u32,

    /// Maximum displacement searched per axis, in pixels.
    pub search_radius: u32,

    /// Maximum mean absolute difference per pixel for an accepted match.
    pub max_error: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            patch_radius: 3,
            search_radius: 8,
            max_error: 20.0,
        }
    }
}

/// Shi-Tomasi minimum-eigenvalue response over a 3x3 gradient window.
fn corner_response(frame: &Frame, x: u32, y: u32) -> f64 {
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;

    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            let px = (x as i64 + dx) as u32;
            let py = (y as i64 + dy) as u32;

            let ix = (frame.pixel(px + 1, py, 0) as f64 - frame.pixel(px - 1, py, 0) as f64) / 2.0;
            let iy = (frame.pixel(px, py + 1, 0) as f64 - frame.pixel(px, py - 1, 0) as f64) / 2.0;

            sxx += ix * ix;
            syy += iy * iy;
            sxy += ix * iy;
        }
    }

    let trace = sxx + syy;
    let diff = sxx - syy;
    (trace - (diff * diff + 4.0 * sxy * sxy).sqrt()) / 2.0
}

/// Detect corner features on a single-channel frame.
///
/// The frame is partitioned into `cell_size` cells; each cell contributes at
/// most one feature, its strongest corner, provided the response clears
/// `min_response`. Returns an ordered point set, regenerated per call.
pub fn detect_features(frame: &Frame, params: &DetectorParams) -> Vec<Point2> {
    let margin = params.margin.max(2);
    if frame.is_empty() || frame.width() <= 2 * margin || frame.height() <= 2 * margin {
        return Vec::new();
    }

    let mut features = Vec::new();
    let mut cell_y = margin;
    while cell_y < frame.height() - margin {
        let mut cell_x = margin;
        while cell_x < frame.width() - margin {
            let x_end = (cell_x + params.cell_size).min(frame.width() - margin);
            let y_end = (cell_y + params.cell_size).min(frame.height() - margin);

            let mut best: Option<(f64, Point2)> = None;
            for y in cell_y..y_end {
                for x in cell_x..x_end {
                    let response = corner_response(frame, x, y);
                    if response >= params.min_response
                        && best.map_or(true, |(r, _)| response > r)
                    {
                        best = Some((response, [x as f64, y as f64]));
                    }
                }
            }
            if let Some((_, point)) = best {
                features.push(point);
            }

            cell_x = x_end;
        }
        cell_y = (cell_y + params.cell_size).min(frame.height() - margin);
    }

    features
}

/// Sum of absolute differences between a patch in `prev` centred at
/// `(px, py)` and a patch in `curr` centred at `(cx, cy)`.
fn patch_sad(prev: &Frame, curr: &Frame, px: u32, py: u32, cx: u32, cy: u32, radius: u32) -> f64 {
    let mut sad = 0.0;
    for dy in -(radius as i64)..=radius as i64 {
        for dx in -(radius as i64)..=radius as i64 {
            let a = prev.pixel((px as i64 + dx) as u32, (py as i64 + dy) as u32, 0) as f64;
            let b = curr.pixel((cx as i64 + dx) as u32, (cy as i64 + dy) as u32, 0) as f64;
            sad += (a - b).abs();
        }
    }
    sad
}

/// Match previous-frame features into the current frame by local block
/// search.
///
/// Returns parallel vectors of matched previous/current positions. Features
/// whose search window leaves the frame, or whose best score exceeds
/// `max_error`, are dropped rather than matched badly.
pub fn match_features(
    prev: &Frame,
    curr: &Frame,
    features: &[Point2],
    params: &MatchParams,
) -> (Vec<Point2>, Vec<Point2>) {
    let mut prev_pts = Vec::with_capacity(features.len());
    let mut curr_pts = Vec::with_capacity(features.len());

    if prev.is_empty() || curr.is_empty() || prev.width() != curr.width()
        || prev.height() != curr.height()
    {
        return (prev_pts, curr_pts);
    }

    let reach = (params.patch_radius + params.search_radius) as i64;
    let patch_area = {
        let side = 2 * params.patch_radius + 1;
        (side * side) as f64
    };

    for &point in features {
        let px = point[0].round() as i64;
        let py = point[1].round() as i64;

        // The full search window must stay inside both frames
        if px - reach < 0
            || py - reach < 0
            || px + reach >= prev.width() as i64
            || py + reach >= prev.height() as i64
        {
            continue;
        }

        let mut best_sad = f64::INFINITY;
        let mut best_offset = [0i64, 0i64];
        let r = params.search_radius as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                let sad = patch_sad(
                    prev,
                    curr,
                    px as u32,
                    py as u32,
                    (px + dx) as u32,
                    (py + dy) as u32,
                    params.patch_radius,
                );
                if sad < best_sad {
                    best_sad = sad;
                    best_offset = [dx, dy];
                }
            }
        }

        if best_sad / patch_area <= params.max_error {
            prev_pts.push([px as f64, py as f64]);
            curr_pts.push([(px + best_offset[0]) as f64, (py + best_offset[1]) as f64]);
        }
    }

    (prev_pts, curr_pts)
}
