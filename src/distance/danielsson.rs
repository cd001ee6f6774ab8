//! Vector propagation distance transform after Danielsson (1980), in grid units.
//!
//! Every voxel carries the integer displacement to its closest known feature voxel. Forward
//! and backward raster sweeps over the 26-neighbourhood offer each voxel the vectors of its
//! already visited neighbours, shifted by the neighbour offset. Sweeps repeat until no vector
//! changes. Voxel spacing is ignored: vectors are compared by their grid-unit length.
use itertools::iproduct;
use ndarray::{Array3, Array4};
use snafu::ResultExt;
use tracing::debug;

use crate::distance::{validate_mask, DistanceError, MagnitudeSnafu};
use crate::field::{ScalarField, ScaleVector, VectorField, DIMENSION};
use crate::scale::scale_vector_field;

/// Marks voxels that have not been reached by any feature yet
const UNSET: i32 = i32::MAX;

type Offset = (isize, isize, isize);

/// Displacement in `(x, y, z)` order
type Displacement = [i32; DIMENSION];

fn norm_squared(v: &Displacement) -> i64 {
    v.iter().map(|&c| c as i64 * c as i64).sum()
}

/// Neighbour offsets `(dz, dy, dx)` visited before (`forward`) or after a voxel in raster order
fn neighbour_offsets(forward: bool) -> Vec<Offset> {
    iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
        .filter(|&offset| match forward {
            true => offset < (0, 0, 0),
            false => offset > (0, 0, 0),
        })
        .collect()
}

struct Grid {
    depth: usize,
    height: usize,
    width: usize,
}

impl Grid {
    fn len(&self) -> usize {
        self.depth * self.height * self.width
    }

    fn coords(&self, index: usize) -> (usize, usize, usize) {
        let x = index % self.width;
        let y = (index / self.width) % self.height;
        let z = index / (self.width * self.height);
        (z, y, x)
    }

    fn neighbour(&self, (z, y, x): (usize, usize, usize), (dz, dy, dx): Offset) -> Option<usize> {
        let nz = z.checked_add_signed(dz).filter(|&v| v < self.depth)?;
        let ny = y.checked_add_signed(dy).filter(|&v| v < self.height)?;
        let nx = x.checked_add_signed(dx).filter(|&v| v < self.width)?;
        Some((nz * self.height + ny) * self.width + nx)
    }
}

/// Single raster sweep, returns the number of voxels whose vector changed
fn sweep(grid: &Grid, vectors: &mut [Displacement], offsets: &[Offset], forward: bool) -> usize {
    let indices: Box<dyn Iterator<Item = usize>> = match forward {
        true => Box::new(0..grid.len()),
        false => Box::new((0..grid.len()).rev()),
    };

    let mut changed = 0;
    for index in indices {
        let coords = grid.coords(index);
        let current = vectors[index];
        let mut best = current;
        let mut best_norm = match current[0] {
            UNSET => i64::MAX,
            _ => norm_squared(&current),
        };

        for &offset in offsets {
            let Some(neighbour) = grid.neighbour(coords, offset) else {
                continue;
            };
            let nv = vectors[neighbour];
            if nv[0] == UNSET {
                continue;
            }
            let (dz, dy, dx) = offset;
            let candidate = [nv[0] + dx as i32, nv[1] + dy as i32, nv[2] + dz as i32];
            let candidate_norm = norm_squared(&candidate);
            if candidate_norm < best_norm {
                best = candidate;
                best_norm = candidate_norm;
            }
        }

        if best != current {
            vectors[index] = best;
            changed += 1;
        }
    }
    changed
}

/// Compute the displacement from every voxel to its nearest feature (`true`) voxel.
///
/// Components are ordered `(x, y, z)` and expressed in voxels. Feature voxels hold the
/// zero vector.
pub fn danielsson_vector_map(mask: &Array3<bool>) -> Result<VectorField, DistanceError> {
    validate_mask(mask)?;
    let (depth, height, width) = mask.dim();
    let grid = Grid {
        depth,
        height,
        width,
    };

    let mut vectors: Vec<Displacement> = mask
        .iter()
        .map(|&is_feature| match is_feature {
            true => [0; DIMENSION],
            false => [UNSET; DIMENSION],
        })
        .collect();

    let forward = neighbour_offsets(true);
    let backward = neighbour_offsets(false);
    let mut sweeps = 0;
    loop {
        let changed = sweep(&grid, &mut vectors, &forward, true)
            + sweep(&grid, &mut vectors, &backward, false);
        sweeps += 1;
        debug!("Danielsson sweep {}: {} vectors updated", sweeps, changed);
        if changed == 0 {
            break;
        }
    }

    let data = Array4::from_shape_fn((depth, height, width, DIMENSION), |(z, y, x, c)| {
        vectors[(z * height + y) * width + x][c] as f32
    });
    Ok(VectorField::new(data))
}

/// Distance in voxels from every voxel to its nearest feature voxel
pub fn danielsson_distance_map(mask: &Array3<bool>) -> Result<ScalarField, DistanceError> {
    let vectors = danielsson_vector_map(mask)?;
    scale_vector_field(&vectors, &ScaleVector::identity(DIMENSION)).context(MagnitudeSnafu)
}
