//! Exact Euclidean distance transform with anisotropic spacing.
//!
//! Uses the Felzenszwalb & Huttenlocher lower envelope of parabolas, applied separably along
//! each axis. Sample positions along an axis are `index * spacing`, so the result is in
//! physical units. Lines along an axis are independent and processed in parallel.
use ndarray::{Array3, Axis, Zip};

use crate::distance::{validate_mask, DistanceError};
use crate::field::ScalarField;
use crate::metadata::Spacing;

/// Squared distance assigned to voxels with no feature on the lines processed so far
const FAR: f64 = 1e18;

/// 1D squared distance transform of `f` sampled every `step` units.
fn transform_line(f: &[f64], step: f64) -> Vec<f64> {
    let n = f.len();
    if n == 0 {
        return vec![];
    }
    let position = |i: usize| i as f64 * step;

    let mut d = vec![0.0f64; n];
    // Locations of parabolas in the lower envelope and the boundaries between them
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;

    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    for q in 1..n {
        let pq = position(q);
        loop {
            let pv = position(v[k]);
            let s = ((f[q] + pq * pq) - (f[v[k]] + pv * pv)) / (2.0 * (pq - pv));
            if s > z[k] {
                k += 1;
                v[k] = q;
                z[k] = s;
                z[k + 1] = f64::INFINITY;
                break;
            }
            if k == 0 {
                v[0] = q;
                z[0] = f64::NEG_INFINITY;
                z[1] = f64::INFINITY;
                break;
            }
            k -= 1;
        }
    }

    k = 0;
    for (q, d_val) in d.iter_mut().enumerate() {
        let pq = position(q);
        while z[k + 1] < pq {
            k += 1;
        }
        let diff = pq - position(v[k]);
        *d_val = diff * diff + f[v[k]];
    }
    d
}

/// Physical distance from every voxel to its nearest feature (`true`) voxel.
///
/// `spacing` weights the `(x, y, z)` axes, which map to array axes 2, 1 and 0.
pub fn parabolic_distance_map(
    mask: &Array3<bool>,
    spacing: &Spacing,
) -> Result<ScalarField, DistanceError> {
    validate_mask(mask)?;
    let mut squared = mask.map(|&is_feature| if is_feature { 0.0 } else { FAR });

    for (axis, step) in [(0, spacing.z), (1, spacing.y), (2, spacing.x)] {
        Zip::from(squared.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let line = lane.to_vec();
            for (out, value) in lane.iter_mut().zip(transform_line(&line, step)) {
                *out = value;
            }
        });
    }

    Ok(ScalarField::new(squared.mapv(|d| d.sqrt() as f32)))
}
