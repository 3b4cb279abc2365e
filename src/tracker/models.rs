//! Motion-model fitting with consensus-based outlier rejection.
//!
//! The model is a tagged variant selecting the fitting algorithm; dispatch
//! is a plain `match`, no vtables on the per-frame path.

use nalgebra::{DMatrix, DVector, Matrix3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::features::Point2;
use crate::homography::Homography;

/// The class of transform the tracker is permitted to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionModel {
    /// No motion: the fit is always identity, stability measures how much
    /// of the scene actually stayed put.
    Static,
    /// 6-parameter affine transform.
    Affine,
    /// Full 8-parameter projective transform.
    #[default]
    Dynamic,
}

impl MotionModel {
    /// Size of the minimal sample for a consensus iteration.
    fn minimal_samples(&self) -> usize {
        match self {
            MotionModel::Static => 0,
            MotionModel::Affine => 3,
            MotionModel::Dynamic => 4,
        }
    }
}

/// Consensus-loop parameters.
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    /// Maximum sampling iterations per fit.
    pub max_iterations: usize,

    /// Maximum reprojection error, in pixels, for an inlier.
    pub inlier_threshold: f64,

    /// Minimum number of matched pairs required to attempt a fit.
    pub min_matches: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            inlier_threshold: 2.0,
            min_matches: 8,
        }
    }
}

// Fixed seed: fits must be reproducible so a restarted pipeline replays
// bit-identically.
const SAMPLING_SEED: u64 = 0x5f3759df;

/// Fit a motion transform mapping `prev` points onto `curr` points.
///
/// Returns the transform and the inlier fraction of the consensus fit, or
/// `None` when the geometry is degenerate or there are too few matches.
/// Degenerate input is a normal condition here, never an error.
pub fn fit_motion(
    model: MotionModel,
    prev: &[Point2],
    curr: &[Point2],
    params: &RansacParams,
) -> Option<(Homography, f32)> {
    let n = prev.len();
    if n != curr.len() || n < params.min_matches.max(model.minimal_samples()) {
        return None;
    }

    if model == MotionModel::Static {
        // Identity by definition; consensus is the share of points that
        // did not move beyond the inlier threshold.
        let identity = Homography::identity();
        let inliers = count_inliers(&identity, prev, curr, params.inlier_threshold);
        return Some((identity, inliers as f32 / n as f32));
    }

    let k = model.minimal_samples();
    let mut rng = StdRng::seed_from_u64(SAMPLING_SEED);

    let mut best_inliers: Vec<usize> = Vec::new();
    for _ in 0..params.max_iterations {
        let sample = sample_indices(&mut rng, n, k);
        let sample_prev: Vec<Point2> = sample.iter().map(|&i| prev[i]).collect();
        let sample_curr: Vec<Point2> = sample.iter().map(|&i| curr[i]).collect();

        let Some(candidate) = fit_exact(model, &sample_prev, &sample_curr) else {
            continue;
        };

        let inliers = inlier_indices(&candidate, prev, curr, params.inlier_threshold);
        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
            if best_inliers.len() == n {
                break;
            }
        }
    }

    if best_inliers.len() <= k {
        return None;
    }

    // Refit on the full consensus set for the final estimate
    let inlier_prev: Vec<Point2> = best_inliers.iter().map(|&i| prev[i]).collect();
    let inlier_curr: Vec<Point2> = best_inliers.iter().map(|&i| curr[i]).collect();
    let refit = fit_exact(model, &inlier_prev, &inlier_curr)?;

    Some((refit, best_inliers.len() as f32 / n as f32))
}

/// Draw `k` distinct indices from `0..n`.
fn sample_indices(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let idx = rng.gen_range(0..n);
        if !picked.contains(&idx) {
            picked.push(idx);
        }
    }
    picked
}

fn reprojection_error(h: &Homography, from: Point2, to: Point2) -> f64 {
    let mapped = h.apply(from);
    let dx = mapped[0] - to[0];
    let dy = mapped[1] - to[1];
    (dx * dx + dy * dy).sqrt()
}

fn inlier_indices(h: &Homography, prev: &[Point2], curr: &[Point2], threshold: f64) -> Vec<usize> {
    let mut indices = Vec::new();
    for (i, (p, c)) in prev.iter().zip(curr.iter()).enumerate() {
        if reprojection_error(h, *p, *c) <= threshold {
            indices.push(i);
        }
    }
    indices
}

fn count_inliers(h: &Homography, prev: &[Point2], curr: &[Point2], threshold: f64) -> usize {
    inlier_indices(h, prev, curr, threshold).len()
}

/// Fit the selected model on all given pairs (no outlier handling).
fn fit_exact(model: MotionModel, prev: &[Point2], curr: &[Point2]) -> Option<Homography> {
    match model {
        MotionModel::Static => Some(Homography::identity()),
        MotionModel::Affine => fit_affine(prev, curr),
        MotionModel::Dynamic => fit_projective(prev, curr),
    }
}

/// Least-squares 6-parameter affine fit embedded in a homography.
fn fit_affine(prev: &[Point2], curr: &[Point2]) -> Option<Homography> {
    let n = prev.len();
    if n < 3 {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(2 * n, 6);
    let mut rhs = DVector::<f64>::zeros(2 * n);
    for (i, (p, c)) in prev.iter().zip(curr.iter()).enumerate() {
        let r0 = 2 * i;
        let r1 = 2 * i + 1;
        design[(r0, 0)] = p[0];
        design[(r0, 1)] = p[1];
        design[(r0, 2)] = 1.0;
        design[(r1, 3)] = p[0];
        design[(r1, 4)] = p[1];
        design[(r1, 5)] = 1.0;
        rhs[r0] = c[0];
        rhs[r1] = c[1];
    }

    let svd = design.svd(true, true);
    let solution = svd.solve(&rhs, 1e-12).ok()?;

    Some(Homography::from_matrix(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        0.0,
        0.0,
        1.0,
    )))
}

/// Full projective fit via the normalized direct linear transform.
///
/// Hartley-style normalization (zero mean, average distance sqrt(2)) on both
/// point sets, then the null vector of the 2n x 9 design matrix via SVD,
/// de-normalized back to pixel coordinates.
fn fit_projective(prev: &[Point2], curr: &[Point2]) -> Option<Homography> {
    let n = prev.len();
    if n < 4 {
        return None;
    }

    let (prev_n, t_prev) = normalize_points(prev)?;
    let (curr_n, t_curr) = normalize_points(curr)?;

    let mut design = DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (i, (p, c)) in prev_n.iter().zip(curr_n.iter()).enumerate() {
        let (x, y) = (p[0], p[1]);
        let (u, v) = (c[0], c[1]);
        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        design[(r0, 0)] = -x;
        design[(r0, 1)] = -y;
        design[(r0, 2)] = -1.0;
        design[(r0, 6)] = u * x;
        design[(r0, 7)] = u * y;
        design[(r0, 8)] = u;

        design[(r1, 3)] = -x;
        design[(r1, 4)] = -y;
        design[(r1, 5)] = -1.0;
        design[(r1, 6)] = v * x;
        design[(r1, 7)] = v * y;
        design[(r1, 8)] = v;
    }

    let svd = design.svd(true, true);
    let v_t = svd.v_t?;

    // Null vector: the right singular vector of the smallest singular value
    let mut min_idx = 0;
    for (i, &s) in svd.singular_values.iter().enumerate() {
        if s < svd.singular_values[min_idx] {
            min_idx = i;
        }
    }
    let h_vec = v_t.row(min_idx);

    let h_norm = Matrix3::new(
        h_vec[0], h_vec[1], h_vec[2], h_vec[3], h_vec[4], h_vec[5], h_vec[6], h_vec[7], h_vec[8],
    );

    let h = t_curr.try_inverse()? * h_norm * t_prev;
    if h[(2, 2)].abs() < 1e-12 {
        return None;
    }
    Some(Homography::from_matrix(h))
}

/// Hartley normalization: translate to zero mean, scale the average
/// distance from the origin to sqrt(2). Returns the transformed points and
/// the similarity applied. `None` for degenerate (coincident) point sets.
fn normalize_points(points: &[Point2]) -> Option<(Vec<Point2>, Matrix3<f64>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-9 {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let transformed = points
        .iter()
        .map(|p| [(p[0] - cx) * scale, (p[1] - cy) * scale])
        .collect();

    let t = Matrix3::new(scale, 0.0, -scale * cx, 0.0, scale, -scale * cy, 0.0, 0.0, 1.0);
    Some((transformed, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points() -> Vec<Point2> {
        let mut points = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                points.push([20.0 + 15.0 * x as f64, 10.0 + 15.0 * y as f64]);
            }
        }
        points
    }

    fn map_all(h: &Homography, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|&p| h.apply(p)).collect()
    }

    #[test]
    fn test_static_model_is_identity() {
        let prev = grid_points();
        let curr = grid_points();

        let (h, stability) =
            fit_motion(MotionModel::Static, &prev, &curr, &RansacParams::default()).unwrap();
        assert!(h.is_identity(1e-12));
        assert_relative_eq!(stability, 1.0);
    }

    #[test]
    fn test_static_model_stability_drops_under_motion() {
        let prev = grid_points();
        let shift = Homography::translation(10.0, 0.0);
        let curr = map_all(&shift, &prev);

        let (h, stability) =
            fit_motion(MotionModel::Static, &prev, &curr, &RansacParams::default()).unwrap();
        assert!(h.is_identity(1e-12));
        assert_relative_eq!(stability, 0.0);
    }

    #[test]
    fn test_affine_recovers_translation() {
        let prev = grid_points();
        let truth = Homography::translation(7.0, -3.0);
        let curr = map_all(&truth, &prev);

        let (h, stability) =
            fit_motion(MotionModel::Affine, &prev, &curr, &RansacParams::default()).unwrap();
        assert_relative_eq!(stability, 1.0);
        assert_relative_eq!(h.matrix()[(0, 2)], 7.0, epsilon = 1e-6);
        assert_relative_eq!(h.matrix()[(1, 2)], -3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_affine_recovers_rotation_scale() {
        let prev = grid_points();
        let angle: f64 = 0.1;
        let scale = 1.05;
        let truth = Homography::from_matrix(Matrix3::new(
            scale * angle.cos(),
            -scale * angle.sin(),
            4.0,
            scale * angle.sin(),
            scale * angle.cos(),
            -2.0,
            0.0,
            0.0,
            1.0,
        ));
        let curr = map_all(&truth, &prev);

        let (h, stability) =
            fit_motion(MotionModel::Affine, &prev, &curr, &RansacParams::default()).unwrap();
        assert_relative_eq!(stability, 1.0);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(h.matrix()[(i, j)], truth.matrix()[(i, j)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_projective_recovers_homography() {
        let prev = grid_points();
        let truth = Homography::from_matrix(Matrix3::new(
            1.02, 0.01, 5.0, -0.015, 0.98, 2.5, 1e-4, -5e-5, 1.0,
        ));
        let curr = map_all(&truth, &prev);

        let (h, stability) =
            fit_motion(MotionModel::Dynamic, &prev, &curr, &RansacParams::default()).unwrap();
        assert_relative_eq!(stability, 1.0);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(h.matrix()[(i, j)], truth.matrix()[(i, j)], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_consensus_rejects_outliers() {
        let prev = grid_points();
        let truth = Homography::translation(6.0, 4.0);
        let mut curr = map_all(&truth, &prev);

        // Corrupt a fifth of the matches
        for i in 0..5 {
            curr[i * 5][0] += 40.0 + i as f64 * 11.0;
            curr[i * 5][1] -= 25.0;
        }

        let (h, stability) =
            fit_motion(MotionModel::Dynamic, &prev, &curr, &RansacParams::default()).unwrap();

        assert_relative_eq!(stability, 0.8, epsilon = 1e-6);
        assert_relative_eq!(h.matrix()[(0, 2)], 6.0, epsilon = 1e-3);
        assert_relative_eq!(h.matrix()[(1, 2)], 4.0, epsilon = 1e-3);
    }

    #[test]
    fn test_too_few_matches() {
        let prev = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let curr = prev.clone();
        assert!(fit_motion(MotionModel::Dynamic, &prev, &curr, &RansacParams::default()).is_none());
    }

    #[test]
    fn test_degenerate_coincident_points() {
        let prev = vec![[5.0, 5.0]; 12];
        let curr = vec![[6.0, 6.0]; 12];
        assert!(fit_motion(MotionModel::Dynamic, &prev, &curr, &RansacParams::default()).is_none());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let prev = grid_points();
        let truth = Homography::translation(3.0, 1.0);
        let mut curr = map_all(&truth, &prev);
        curr[3][0] += 30.0;

        let a = fit_motion(MotionModel::Affine, &prev, &curr, &RansacParams::default()).unwrap();
        let b = fit_motion(MotionModel::Affine, &prev, &curr, &RansacParams::default()).unwrap();
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }
}
